// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    ClubId, Game, Group, GroupId, MatchCriteria, MatchIntent, NotificationKind, Player,
    PreferredVenue, Sport, Team, UserId, UserStatus,
};
pub use requests::MatchRequest;
pub use responses::{GameResponse, IntentResponse};
