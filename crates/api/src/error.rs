//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use event_log::EventLogError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request that never reached the domain.
    BadRequest(String),
    /// Command or query rejected by the domain.
    Domain(DomainError),
    /// Event log inspection failed.
    EventLog(EventLogError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::Domain(err) => {
                let status = match err {
                    DomainError::Validation(_) => StatusCode::BAD_REQUEST,
                    DomainError::NotFound(_) => StatusCode::NOT_FOUND,
                    DomainError::Conflict(_) => StatusCode::CONFLICT,
                    DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.kind(), err.message().to_string())
            }
            ApiError::EventLog(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                err.to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": kind, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<EventLogError> for ApiError {
    fn from(err: EventLogError) -> Self {
        ApiError::EventLog(err)
    }
}
