use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::{Game, MatchIntent};

/// View of a pending matching intent, returned to the submitting group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResponse {
    pub sport: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "startSlots")]
    pub start_slots: Vec<String>,
    #[serde(rename = "preferredVenue")]
    pub preferred_venue: Option<String>,
    #[serde(rename = "isClubMatching")]
    pub is_club_matching: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<&MatchIntent> for IntentResponse {
    fn from(intent: &MatchIntent) -> Self {
        Self {
            sport: intent.sport.name().to_string(),
            latitude: intent.latitude,
            longitude: intent.longitude,
            start_slots: intent.start_slots.clone(),
            preferred_venue: intent.preferred_venue.clone(),
            is_club_matching: intent.is_club_matching,
            created_at: intent.created_at,
        }
    }
}

/// Summary of an assembled game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResponse {
    #[serde(rename = "gameId")]
    pub game_id: Uuid,
    pub sport: String,
    #[serde(rename = "startTime")]
    pub start_time: NaiveDateTime,
    pub venue: Option<String>,
    #[serde(rename = "teamSizes")]
    pub team_sizes: Vec<usize>,
}

impl From<&Game> for GameResponse {
    fn from(game: &Game) -> Self {
        Self {
            game_id: game.id,
            sport: game.sport.name().to_string(),
            start_time: game.start_time,
            venue: game.venue.as_ref().map(|v| v.name.clone()),
            team_sizes: game.teams.iter().map(|t| t.user_ids.len()).collect(),
        }
    }
}
