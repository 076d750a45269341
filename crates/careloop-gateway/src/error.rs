//! Request-path error taxonomy mapped onto HTTP status codes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use careloop_core::error::CareloopError;

/// Errors a handler can surface to a client. Background-task failures
/// never reach this type; they end as log lines.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Patient or record absent.
    #[error("{0}")]
    NotFound(String),

    /// Malformed or unacceptable input.
    #[error("{0}")]
    Validation(String),

    /// Anything else, including store connectivity.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<CareloopError> for ApiError {
    fn from(e: CareloopError) -> Self {
        ApiError::Internal(format!("Internal Server Error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::NotFound("Patient not found".into())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Validation("Invalid mobile number".into())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal("boom".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_errors_become_internal() {
        let err: ApiError = CareloopError::Store("no connection".into()).into();
        assert!(matches!(err, ApiError::Internal(_)));
        assert!(err.to_string().contains("no connection"));
    }
}
