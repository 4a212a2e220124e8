//! Unified error types for pricetag.
//!
//! Display strings carry a stable code prefix so callers and logs can tell
//! a missing product apart from an infrastructure failure.

use tokio_rusqlite::rusqlite;

/// Unified error types for the pricetag crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a malformed scan code).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The code was not resolved by the store, the cache or the external catalog.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// The external session handshake could not be completed.
    #[error("SESSION_BOOTSTRAP: {0}")]
    SessionBootstrap(String),

    /// Transport or parse failure that survived the reauthentication retry.
    #[error("FETCH_FAILED: {0}")]
    Fetch(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be mapped back into the domain model.
    #[error("STORE_ERROR: corrupt row: {0}")]
    CorruptRow(String),
}

impl Error {
    /// Stable machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::SessionBootstrap(_) => "SESSION_BOOTSTRAP",
            Error::Fetch(_) => "FETCH_FAILED",
            Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptRow(_) => "STORE_ERROR",
        }
    }

    /// Whether the failure came from an upstream dependency rather than the request.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::SessionBootstrap(_) | Error::Fetch(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("7891000055120".to_string());
        assert!(err.to_string().contains("NOT_FOUND"));
        assert!(err.to_string().contains("7891000055120"));
    }

    #[test]
    fn test_not_found_and_fetch_are_distinguishable() {
        let missing = Error::NotFound("x".into());
        let broken = Error::Fetch("x".into());
        assert_ne!(missing.code(), broken.code());
        assert!(!missing.is_upstream());
        assert!(broken.is_upstream());
    }

    #[test]
    fn test_store_errors_share_code() {
        assert_eq!(Error::MigrationFailed("x".into()).code(), "STORE_ERROR");
        assert_eq!(Error::CorruptRow("x".into()).code(), "STORE_ERROR");
    }
}
