use serde::{Deserialize, Serialize};

/// Conditions under which a group wants to be matched.
///
/// Submitted by the group leader; the rating is not part of the request
/// because the surrounding service layer reads it from the leader's
/// profile for the requested sport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub sport: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Acceptable start times as HHMM strings, e.g. "1830".
    #[serde(alias = "start_slots", rename = "startSlots")]
    pub start_slots: Vec<String>,
    #[serde(alias = "preferred_venue", rename = "preferredVenue", default)]
    pub preferred_venue: Option<String>,
    #[serde(alias = "is_club_matching", rename = "isClubMatching", default)]
    pub is_club_matching: bool,
}
