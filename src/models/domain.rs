use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = i64;
pub type GroupId = i64;
pub type ClubId = i64;

/// Sports the engine knows how to match, each with the number of players
/// a single team requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    Soccer,
    Basketball,
    Badminton,
    TableTennis,
}

impl Sport {
    /// Number of players one team of this sport requires.
    pub fn roster_size(&self) -> u32 {
        match self {
            Sport::Soccer => 11,
            Sport::Basketball => 5,
            Sport::Badminton => 2,
            Sport::TableTennis => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sport::Soccer => "soccer",
            Sport::Basketball => "basketball",
            Sport::Badminton => "badminton",
            Sport::TableTennis => "table_tennis",
        }
    }

    /// Resolve a sport by its lowercase name.
    pub fn from_name(name: &str) -> Option<Sport> {
        match name {
            "soccer" => Some(Sport::Soccer),
            "basketball" => Some(Sport::Basketball),
            "badminton" => Some(Sport::Badminton),
            "table_tennis" => Some(Sport::TableTennis),
            _ => None,
        }
    }
}

/// Lifecycle status of a user with respect to matchmaking.
///
/// All members of a group transition together; a split group is a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Waiting,
    Matching,
    Gaming,
}

/// Matching-relevant view of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: UserId,
    pub nickname: String,
    pub status: UserStatus,
}

/// A party of users that matches as a unit.
///
/// Group creation and membership administration live outside the engine;
/// the engine only reads groups and asks for their disbandment once their
/// purpose is fulfilled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    #[serde(rename = "masterId")]
    pub master_id: UserId,
    #[serde(rename = "memberIds")]
    pub member_ids: Vec<UserId>,
    #[serde(rename = "clubId", default)]
    pub club_id: Option<ClubId>,
}

impl Group {
    pub fn member_count(&self) -> u32 {
        self.member_ids.len() as u32
    }
}

/// A group's open request to be matched into a game.
///
/// Created when the group leader starts matching; destroyed when matched
/// or cancelled, never mutated in between. One per group at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchIntent {
    #[serde(rename = "groupId")]
    pub group_id: GroupId,
    pub sport: Sport,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: i32,
    /// Headcount of the owning group at submission time; the item weight
    /// in subset-sum team formation.
    #[serde(rename = "userCount")]
    pub user_count: u32,
    /// Acceptable start times as HHMM strings, e.g. "1830".
    #[serde(rename = "startSlots")]
    pub start_slots: Vec<String>,
    #[serde(rename = "preferredVenue", default)]
    pub preferred_venue: Option<String>,
    #[serde(rename = "isClubMatching")]
    pub is_club_matching: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl MatchIntent {
    /// The venue candidate this intent proposes, if any.
    pub fn venue_candidate(&self) -> Option<PreferredVenue> {
        self.preferred_venue.as_ref().map(|name| PreferredVenue {
            name: name.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

/// Parameters of one compatibility scan over the pending intents.
///
/// The rating tolerance is caller-supplied per attempt (the matching range
/// may widen between invocations); the distance threshold comes from
/// configuration.
#[derive(Debug, Clone)]
pub struct MatchCriteria {
    pub sport: Sport,
    pub slot: String,
    pub rating: i32,
    pub rating_tolerance: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub max_distance_km: f64,
    pub is_club_matching: bool,
}

/// A candidate location proposed by a matched party.
///
/// Deduplicated by name and exact coordinates; subject to voting after the
/// match unless the game is club-vs-club.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferredVenue {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl PartialEq for PreferredVenue {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.latitude.to_bits() == other.latitude.to_bits()
            && self.longitude.to_bits() == other.longitude.to_bits()
    }
}

impl Eq for PreferredVenue {}

/// One side of an assembled game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// 1 or 2.
    pub number: u8,
    #[serde(rename = "userIds")]
    pub user_ids: Vec<UserId>,
    /// Set for club games only.
    #[serde(rename = "clubId", default)]
    pub club_id: Option<ClubId>,
    #[serde(rename = "leaderId", default)]
    pub leader_id: Option<UserId>,
}

/// An assembled game. Owns its teams and venue candidates; team members
/// are referenced by user id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub sport: Sport,
    /// Current date combined with the matched start slot.
    #[serde(rename = "startTime")]
    pub start_time: NaiveDateTime,
    /// Resolved for club games; open games leave it for venue voting.
    #[serde(default)]
    pub venue: Option<PreferredVenue>,
    pub teams: Vec<Team>,
    #[serde(rename = "venueCandidates")]
    pub venue_candidates: Vec<PreferredVenue>,
}

impl Game {
    /// Every user assigned to either team.
    pub fn user_ids(&self) -> Vec<UserId> {
        self.teams.iter().flat_map(|t| t.user_ids.clone()).collect()
    }
}

/// Notification kinds dispatched by the engine; delivery is best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Matched,
    MatchCancelled,
}
