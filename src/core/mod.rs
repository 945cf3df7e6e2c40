pub mod assembler;
pub mod compat;
pub mod distance;
pub mod engine;
pub mod groups;
pub mod intents;
pub mod subset;

pub use assembler::GameAssembler;
pub use compat::is_compatible;
pub use distance::{bounding_box, haversine_distance, BoundingBox};
pub use engine::{AttemptJob, AttemptOutcome, EngineWorker, MatchingEngine};
pub use groups::GroupStateManager;
pub use intents::MatchIntentStore;
pub use subset::{subset_indices, team_partition};
