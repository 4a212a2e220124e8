//! Catalog session error types.

use std::sync::Arc;

use pricetag_core::Error;

/// Errors from a single exchange with the catalog application.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// The handshake did not yield the fields a session needs.
    #[error("session bootstrap failed: {0}")]
    Bootstrap(String),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Non-success HTTP status.
    #[error("HTTP error: {status}")]
    HttpStatus { status: u16 },

    /// Response body was not a recognizable item payload.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { SessionError::Timeout } else { SessionError::Network(Arc::new(err)) }
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Bootstrap(msg) => Error::SessionBootstrap(msg),
            other => Error::Fetch(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::Bootstrap("missing pInstance".to_string());
        assert!(err.to_string().contains("pInstance"));

        let err = SessionError::HttpStatus { status: 503 };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_into_core_error() {
        let err: Error = SessionError::Bootstrap("x".into()).into();
        assert!(matches!(err, Error::SessionBootstrap(_)));

        let err: Error = SessionError::Parse("x".into()).into();
        assert!(matches!(err, Error::Fetch(_)));

        let err: Error = SessionError::Timeout.into();
        assert!(matches!(err, Error::Fetch(_)));
    }
}
