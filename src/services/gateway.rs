use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Game, Group, GroupId, MatchCriteria, MatchIntent, Player, UserId, UserStatus};

/// Errors raised by persistence backends.
///
/// The engine treats every variant as "storage unavailable": the current
/// matching attempt aborts and the intent stays queryable for a retry.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored value: {0}")]
    Decode(String),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Persistence boundary consumed by the engine.
///
/// Implementations must keep pending intents ordered by insertion (oldest
/// first) so the first-come-first-served policy holds. A match commit is
/// all-or-nothing: intent removal, the game rows and the status flip
/// either all land or none do, so an aborted attempt always leaves its
/// intents queryable for a retry.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save_intent(&self, intent: &MatchIntent) -> Result<(), StorageError>;

    /// Remove a group's intent at the given location. Idempotent; returns
    /// whether a row was actually removed.
    async fn delete_intent_by_group_location(
        &self,
        group_id: GroupId,
        latitude: f64,
        longitude: f64,
    ) -> Result<bool, StorageError>;

    async fn find_intent_by_group(
        &self,
        group_id: GroupId,
    ) -> Result<Option<MatchIntent>, StorageError>;

    /// Coarse scan for the criteria's sport and matching mode, oldest
    /// first. Fine-grained slot/rating/distance filtering happens in the
    /// intent store on top of this.
    async fn find_intents_matching(
        &self,
        criteria: &MatchCriteria,
    ) -> Result<Vec<MatchIntent>, StorageError>;

    /// Commit a resolved match: delete every consumed intent, persist the
    /// game with its team assignments and venue candidates, and flip every
    /// participant to GAMING, all as one unit. Returns `false` without
    /// persisting anything when a consumed intent is already gone.
    async fn commit_match(&self, game: &Game, consumed: &[MatchIntent])
        -> Result<bool, StorageError>;

    async fn find_group_by_id(&self, group_id: GroupId) -> Result<Option<Group>, StorageError>;

    async fn find_group_by_member(&self, user_id: UserId) -> Result<Option<Group>, StorageError>;

    async fn find_users_in_group(&self, group_id: GroupId) -> Result<Vec<Player>, StorageError>;

    /// Move every listed user to `status` in one atomic write.
    async fn update_statuses(
        &self,
        user_ids: &[UserId],
        status: UserStatus,
    ) -> Result<(), StorageError>;
}

/// Group administration lives outside the engine; the engine only asks for
/// disbandment once a group's purpose is fulfilled.
#[async_trait]
pub trait GroupAdministration: Send + Sync {
    async fn disband(&self, group_id: GroupId) -> Result<(), StorageError>;
}
