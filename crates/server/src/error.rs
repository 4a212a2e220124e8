//! HTTP error responses for the pricetag server.
//!
//! Every failure is rendered as `{"code": "...", "message": "..."}` with the
//! code taken from [`pricetag_core::Error::code`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pricetag_core::Error;
use serde::Serialize;

/// Error body returned by every API route.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, code: "INVALID_INPUT", message: message.into() }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::SessionBootstrap(_) | Error::Fetch(_) => StatusCode::BAD_GATEWAY,
            Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptRow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &err {
            Error::InvalidInput(m) | Error::NotFound(m) | Error::SessionBootstrap(m) | Error::Fetch(m) => m.clone(),
            Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptRow(_) => {
                // store internals stay in the logs
                tracing::error!(error = %err, "store failure");
                "store operation failed".to_string()
            }
        };

        if err.is_upstream() {
            tracing::warn!(error = %err, "catalog unavailable");
        }

        Self { status, code: err.code(), message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self)).into_response()
    }
}
