use thiserror::Error;

use crate::models::{GroupId, UserId};
use crate::services::StorageError;

/// Errors surfaced by matchmaking operations.
///
/// Failing to find an opponent is not among them; an attempt that matches
/// nothing simply leaves the intent pending.
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Only the group leader may start or cancel matching")]
    NotLeader,

    #[error("Group headcount {actual} does not fit a roster of {roster}")]
    InvalidHeadcount { actual: u32, roster: u32 },

    #[error("User {0} is not in the waiting state")]
    MemberNotWaiting(UserId),

    #[error("User {0} has no active group")]
    NoActiveGroup(UserId),

    #[error("Group {0} already has a pending intent")]
    DuplicateIntent(GroupId),

    #[error("Unknown sport: {0}")]
    UnknownSport(String),

    #[error("Invalid time slot: {0}")]
    InvalidTimeSlot(String),

    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    #[error("Stored state diverged from the in-flight attempt")]
    InconsistentState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MatchError::InvalidHeadcount {
            actual: 7,
            roster: 5,
        };
        assert_eq!(
            err.to_string(),
            "Group headcount 7 does not fit a roster of 5"
        );

        let err = MatchError::UnknownSport("curling".to_string());
        assert_eq!(err.to_string(), "Unknown sport: curling");
    }
}
