//! Error types for cadence-api
//!
//! Handlers return `ApiResult<T>`. Service and repository errors arrive as
//! `cadence_common::Error` and are mapped onto HTTP status codes here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409), e.g. organization slug already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// cadence-common error
    #[error(transparent)]
    Common(#[from] cadence_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use cadence_common::Error as E;

        let mut retryable = false;
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(err) => match err {
                E::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                E::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
                E::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
                ref e @ E::Collaborator(_) => {
                    (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.to_string())
                }
                ref e @ E::Timeout(_) => {
                    retryable = true;
                    (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT", e.to_string())
                }
                other => {
                    tracing::error!(error = %other, "Request failed with internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "Internal server error".to_string(),
                    )
                }
            },
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if retryable {
            error["retryable"] = json!(true);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_common::Error;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::NotFound("calendar".into()), StatusCode::NOT_FOUND),
            (Error::InvalidInput("domain".into()), StatusCode::BAD_REQUEST),
            (Error::Conflict("slug".into()), StatusCode::CONFLICT),
            (Error::Collaborator("keyword discovery".into()), StatusCode::BAD_GATEWAY),
            (Error::Timeout("page fetch".into()), StatusCode::GATEWAY_TIMEOUT),
            (Error::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
