//! Session Error Types

use thiserror::Error;

use super::types::SessionId;

/// Errors returned by session operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// Never opened, already drained, or closed while the command was queued
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SessionError> for String {
    fn from(err: SessionError) -> String {
        err.to_string()
    }
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
