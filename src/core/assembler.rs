use std::sync::Arc;

use chrono::{Local, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::error::MatchError;
use crate::models::{Game, MatchIntent, PreferredVenue, Sport, Team, UserId};
use crate::services::PersistenceGateway;

/// Builds the game record of a resolved match.
///
/// Assembly only reads group membership; the caller persists the result
/// in the same unit that consumes the matched intents.
pub struct GameAssembler {
    gateway: Arc<dyn PersistenceGateway>,
}

/// Collect the venue candidates proposed by both sides, deduplicated by
/// name and coordinates, first proposal first. For club games the first
/// entry becomes the game's resolved venue.
pub fn dedup_venues(sides: &[&[MatchIntent]]) -> Vec<PreferredVenue> {
    let mut venues: Vec<PreferredVenue> = Vec::new();
    for side in sides {
        for intent in *side {
            if let Some(venue) = intent.venue_candidate() {
                if !venues.contains(&venue) {
                    venues.push(venue);
                }
            }
        }
    }
    venues
}

/// Combine the current date with an HHMM slot.
pub fn resolve_start_time(slot: &str) -> Result<NaiveDateTime, MatchError> {
    let time = NaiveTime::parse_from_str(slot, "%H%M")
        .map_err(|_| MatchError::InvalidTimeSlot(slot.to_string()))?;
    Ok(Local::now().date_naive().and_time(time))
}

impl GameAssembler {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Materialize a game from two resolved sides.
    ///
    /// Expands each side's groups into individual team rows; for club
    /// games also records each side's club and leader and resolves the
    /// venue to the first candidate.
    pub async fn assemble(
        &self,
        side1: &[MatchIntent],
        side2: &[MatchIntent],
        slot: &str,
        sport: Sport,
        venue_candidates: Vec<PreferredVenue>,
        is_club_matching: bool,
    ) -> Result<Game, MatchError> {
        let start_time = resolve_start_time(slot)?;

        let team1 = self.build_team(1, side1, is_club_matching).await?;
        let team2 = self.build_team(2, side2, is_club_matching).await?;

        let venue = if is_club_matching {
            venue_candidates.first().cloned()
        } else {
            None
        };

        let game = Game {
            id: Uuid::new_v4(),
            sport,
            start_time,
            venue,
            teams: vec![team1, team2],
            venue_candidates,
        };

        tracing::info!(
            "Assembled {:?} game {} starting {}",
            sport,
            game.id,
            game.start_time
        );

        Ok(game)
    }

    async fn build_team(
        &self,
        number: u8,
        side: &[MatchIntent],
        is_club_matching: bool,
    ) -> Result<Team, MatchError> {
        let mut user_ids: Vec<UserId> = Vec::new();
        for intent in side {
            let players = self.gateway.find_users_in_group(intent.group_id).await?;
            user_ids.extend(players.iter().map(|p| p.id));
        }

        let (club_id, leader_id) = if is_club_matching {
            let group_id = side[0].group_id;
            let group = self
                .gateway
                .find_group_by_id(group_id)
                .await?
                .ok_or(MatchError::GroupNotFound(group_id))?;
            (group.club_id, Some(group.master_id))
        } else {
            (None, None)
        };

        Ok(Team {
            number,
            user_ids,
            club_id,
            leader_id,
        })
    }
}
