//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use saga::SagaError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Saga or orchestrator error.
    Saga(SagaError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::BadRequest(msg) => {
                let body = serde_json::json!({ "error": msg });
                return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
            }
            ApiError::Saga(err) => err,
        };

        let status = saga_error_status(&err);
        let mut body = serde_json::json!({ "error": err.to_string() });
        match &err {
            SagaError::PartialFailure {
                saga,
                route_id,
                assignment_id,
                last_completed,
                ..
            } => {
                tracing::error!(error = %err, "saga partially applied");
                body["saga"] = serde_json::json!(saga);
                body["last_completed_step"] = serde_json::json!(last_completed);
                body["route_id"] = serde_json::json!(route_id);
                body["assignment_id"] = serde_json::json!(assignment_id);
            }
            SagaError::Store(_) => tracing::error!(error = %err, "store error"),
            _ => {}
        }
        if err.is_retryable() {
            body["retryable"] = serde_json::json!(true);
        }

        (status, axum::Json(body)).into_response()
    }
}

fn saga_error_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::NotFound { .. } => StatusCode::NOT_FOUND,
        SagaError::Validation(_) => StatusCode::BAD_REQUEST,
        SagaError::Conflict { .. } => StatusCode::CONFLICT,
        SagaError::Transient { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SagaError::PartialFailure { .. } | SagaError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}
