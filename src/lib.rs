//! Squadmatch - matchmaking engine for team-sport pickup games
//!
//! This library pairs groups of players into two full teams of the same
//! sport. Groups register a match intent (sport, location, rating and
//! acceptable start times); each registration triggers an asynchronous
//! matching attempt that scans compatible intents, partitions them into two
//! rosters via subset-sum and assembles a persisted game.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::config::Settings;
pub use crate::core::{
    AttemptOutcome, GameAssembler, GroupStateManager, MatchIntentStore, MatchingEngine,
};
pub use crate::error::MatchError;
pub use crate::models::{Game, Group, MatchIntent, MatchRequest, Sport, UserStatus};
