//! Error types for session operations

use std::time::Duration;

use crate::storage::StorageError;
use crate::types::ApiType;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Operation needs the contact cache, which only exists after login
    #[error("No cache for the current session: {0}")]
    NoCache(&'static str),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Account logged out by backend: {0}")]
    RemoteLogout(String),

    #[error("Timeout after {elapsed:?} waiting for response to {id}")]
    Timeout { id: String, elapsed: Duration },

    #[error("Request {0} is already pending")]
    DuplicateRequest(String),

    #[error("Request {0} was canceled")]
    Canceled(String),

    #[error("{api:?} failed with status {status}: {message}")]
    Operation {
        api: ApiType,
        status: i64,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
