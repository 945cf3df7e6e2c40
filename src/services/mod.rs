// Service exports
pub mod gateway;
pub mod memory;
pub mod notify;
pub mod postgres;

pub use gateway::{GroupAdministration, PersistenceGateway, StorageError};
pub use memory::MemoryGateway;
pub use notify::{
    NotificationGateway, NotifyError, NullNotifier, RecordingNotifier, WebhookNotifier,
};
pub use postgres::PostgresGateway;
