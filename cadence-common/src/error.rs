//! Common error types for Cadence

use thiserror::Error;

/// Common result type for Cadence operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library and the service crate
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Referenced organization, calendar, item or keyword does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input, rejected before any external call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uniqueness violation that the caller must resolve
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External collaborator failed. The message names the operation only;
    /// the underlying cause is logged where it happened.
    #[error("{0} failed")]
    Collaborator(String),

    /// External collaborator exceeded its timeout. Safe to retry.
    #[error("{0} timed out")]
    Timeout(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller may retry the whole operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_message_is_opaque() {
        let err = Error::Collaborator("keyword discovery".to_string());
        assert_eq!(err.to_string(), "keyword discovery failed");
    }

    #[test]
    fn only_timeouts_are_retryable() {
        assert!(Error::Timeout("page fetch".into()).is_retryable());
        assert!(!Error::Collaborator("page fetch".into()).is_retryable());
        assert!(!Error::NotFound("calendar".into()).is_retryable());
    }
}
