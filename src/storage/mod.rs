//! Persistence for the durable session identity
//!
//! Provides a small key-value "memory slot" store:
//! - SQLite-backed store that survives process restarts
//! - In-memory store for tests and storage-less runs

mod memory;
mod models;
mod sqlite;

pub use memory::MemorySessionStore;
pub use models::SessionIdentity;
pub use sqlite::SqliteSessionStore;

/// Slot under which the session identity is stored
pub const MEMORY_SLOT_NAME: &str = "PADPLUS_SESSION";

/// Storage error type
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Key-value store for [`SessionIdentity`] slots
///
/// `set` stages a value; `save` makes staged values durable.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<SessionIdentity>>;

    fn set(&self, key: &str, value: SessionIdentity) -> StorageResult<()>;

    fn save(&self) -> StorageResult<()>;
}
