use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::core::distance::bounding_box;
use crate::models::{
    Game, Group, GroupId, MatchCriteria, MatchIntent, Player, Sport, UserId, UserStatus,
};
use crate::services::gateway::{GroupAdministration, PersistenceGateway, StorageError};

/// PostgreSQL persistence gateway.
///
/// Schema lives under `migrations/`; applying it is the deployment's job.
/// Intents are ordered by their serial id, which gives the oldest-first
/// guarantee the store relies on.
pub struct PostgresGateway {
    pool: PgPool,
}

impl PostgresGateway {
    /// Create a new gateway from a connection string.
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a new gateway from settings.
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self, StorageError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
        )
        .await
    }

    /// Health check for the database connection.
    pub async fn health_check(&self) -> Result<bool, StorageError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

fn sport_from_row(row: &PgRow, column: &str) -> Result<Sport, StorageError> {
    let name: String = row.get(column);
    Sport::from_name(&name).ok_or_else(|| StorageError::Decode(format!("unknown sport: {}", name)))
}

fn status_from_row(row: &PgRow, column: &str) -> Result<UserStatus, StorageError> {
    let value: String = row.get(column);
    match value.as_str() {
        "waiting" => Ok(UserStatus::Waiting),
        "matching" => Ok(UserStatus::Matching),
        "gaming" => Ok(UserStatus::Gaming),
        other => Err(StorageError::Decode(format!("unknown status: {}", other))),
    }
}

fn status_name(status: UserStatus) -> &'static str {
    match status {
        UserStatus::Waiting => "waiting",
        UserStatus::Matching => "matching",
        UserStatus::Gaming => "gaming",
    }
}

fn intent_from_row(row: &PgRow) -> Result<MatchIntent, StorageError> {
    Ok(MatchIntent {
        group_id: row.get("group_id"),
        sport: sport_from_row(row, "sport")?,
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        rating: row.get("rating"),
        user_count: row.get::<i32, _>("user_count") as u32,
        start_slots: row.get("start_slots"),
        preferred_venue: row.get("preferred_venue"),
        is_club_matching: row.get("is_club_matching"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl PersistenceGateway for PostgresGateway {
    async fn save_intent(&self, intent: &MatchIntent) -> Result<(), StorageError> {
        let query = r#"
            INSERT INTO match_intents
                (group_id, sport, latitude, longitude, rating, user_count,
                 start_slots, preferred_venue, is_club_matching, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#;

        sqlx::query(query)
            .bind(intent.group_id)
            .bind(intent.sport.name())
            .bind(intent.latitude)
            .bind(intent.longitude)
            .bind(intent.rating)
            .bind(intent.user_count as i32)
            .bind(&intent.start_slots)
            .bind(&intent.preferred_venue)
            .bind(intent.is_club_matching)
            .bind(intent.created_at)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Saved intent for group {}", intent.group_id);

        Ok(())
    }

    async fn delete_intent_by_group_location(
        &self,
        group_id: GroupId,
        latitude: f64,
        longitude: f64,
    ) -> Result<bool, StorageError> {
        let query = r#"
            DELETE FROM match_intents
            WHERE group_id = $1 AND latitude = $2 AND longitude = $3
        "#;

        let result = sqlx::query(query)
            .bind(group_id)
            .bind(latitude)
            .bind(longitude)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_intent_by_group(
        &self,
        group_id: GroupId,
    ) -> Result<Option<MatchIntent>, StorageError> {
        let query = r#"
            SELECT group_id, sport, latitude, longitude, rating, user_count,
                   start_slots, preferred_venue, is_club_matching, created_at
            FROM match_intents
            WHERE group_id = $1
        "#;

        let row = sqlx::query(query)
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(intent_from_row).transpose()
    }

    async fn find_intents_matching(
        &self,
        criteria: &MatchCriteria,
    ) -> Result<Vec<MatchIntent>, StorageError> {
        // Coarse filter: sport, mode and bounding box in SQL; slot, rating
        // and exact distance are applied by the intent store.
        let bbox = bounding_box(criteria.latitude, criteria.longitude, criteria.max_distance_km);

        let query = r#"
            SELECT group_id, sport, latitude, longitude, rating, user_count,
                   start_slots, preferred_venue, is_club_matching, created_at
            FROM match_intents
            WHERE sport = $1
              AND is_club_matching = $2
              AND latitude BETWEEN $3 AND $4
              AND longitude BETWEEN $5 AND $6
            ORDER BY id
        "#;

        let rows = sqlx::query(query)
            .bind(criteria.sport.name())
            .bind(criteria.is_club_matching)
            .bind(bbox.min_lat)
            .bind(bbox.max_lat)
            .bind(bbox.min_lon)
            .bind(bbox.max_lon)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(intent_from_row).collect()
    }

    async fn commit_match(
        &self,
        game: &Game,
        consumed: &[MatchIntent],
    ) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;

        for intent in consumed {
            let result = sqlx::query(
                r#"
                DELETE FROM match_intents
                WHERE group_id = $1 AND latitude = $2 AND longitude = $3
                "#,
            )
            .bind(intent.group_id)
            .bind(intent.latitude)
            .bind(intent.longitude)
            .execute(&mut *tx)
            .await?;

            // A missing intent means the pool changed under the caller;
            // roll everything back and report the miss.
            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(false);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO games (id, sport, start_time, venue_name, venue_latitude, venue_longitude)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(game.id)
        .bind(game.sport.name())
        .bind(game.start_time)
        .bind(game.venue.as_ref().map(|v| v.name.clone()))
        .bind(game.venue.as_ref().map(|v| v.latitude))
        .bind(game.venue.as_ref().map(|v| v.longitude))
        .execute(&mut *tx)
        .await?;

        for team in &game.teams {
            for (position, user_id) in team.user_ids.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO game_teams
                        (game_id, team_number, user_id, position, club_id, leader_id)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(game.id)
                .bind(team.number as i16)
                .bind(user_id)
                .bind(position as i32)
                .bind(team.club_id)
                .bind(team.leader_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        for (position, venue) in game.venue_candidates.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO game_venue_candidates (game_id, name, latitude, longitude, position)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(game.id)
            .bind(&venue.name)
            .bind(venue.latitude)
            .bind(venue.longitude)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE users SET status = $1 WHERE id = ANY($2)")
            .bind(status_name(UserStatus::Gaming))
            .bind(&game.user_ids())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Committed game {} consuming {} intents",
            game.id,
            consumed.len()
        );

        Ok(true)
    }

    async fn find_group_by_id(&self, group_id: GroupId) -> Result<Option<Group>, StorageError> {
        let query = r#"
            SELECT g.id, g.master_id, g.club_id,
                   ARRAY(
                       SELECT gm.user_id FROM group_members gm
                       WHERE gm.group_id = g.id
                       ORDER BY gm.position
                   ) AS member_ids
            FROM groups g
            WHERE g.id = $1
        "#;

        let row = sqlx::query(query)
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Group {
            id: row.get("id"),
            master_id: row.get("master_id"),
            member_ids: row.get("member_ids"),
            club_id: row.get("club_id"),
        }))
    }

    async fn find_group_by_member(&self, user_id: UserId) -> Result<Option<Group>, StorageError> {
        let query = r#"
            SELECT g.id, g.master_id, g.club_id,
                   ARRAY(
                       SELECT gm.user_id FROM group_members gm
                       WHERE gm.group_id = g.id
                       ORDER BY gm.position
                   ) AS member_ids
            FROM groups g
            JOIN group_members m ON m.group_id = g.id
            WHERE m.user_id = $1
        "#;

        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Group {
            id: row.get("id"),
            master_id: row.get("master_id"),
            member_ids: row.get("member_ids"),
            club_id: row.get("club_id"),
        }))
    }

    async fn find_users_in_group(&self, group_id: GroupId) -> Result<Vec<Player>, StorageError> {
        let query = r#"
            SELECT u.id, u.nickname, u.status
            FROM users u
            JOIN group_members gm ON gm.user_id = u.id
            WHERE gm.group_id = $1
            ORDER BY gm.position
        "#;

        let rows = sqlx::query(query)
            .bind(group_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Player {
                    id: row.get("id"),
                    nickname: row.get("nickname"),
                    status: status_from_row(row, "status")?,
                })
            })
            .collect()
    }

    async fn update_statuses(
        &self,
        user_ids: &[UserId],
        status: UserStatus,
    ) -> Result<(), StorageError> {
        let query = r#"
            UPDATE users SET status = $1 WHERE id = ANY($2)
        "#;

        sqlx::query(query)
            .bind(status_name(status))
            .bind(user_ids)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl GroupAdministration for PostgresGateway {
    async fn disband(&self, group_id: GroupId) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM group_members WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Disbanded group {}", group_id);

        Ok(())
    }
}
