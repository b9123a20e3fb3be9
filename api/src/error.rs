use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rollout_core::decision::DecisionRecord;
use rollout_core::error::{self, ApiError};

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Unknown route (404)
    NotFound { message: String },
    /// The analysis did not run normally (500). The body is still a decision
    /// record, built by the failure-safe policy, so controllers always get a
    /// verdict.
    FailureSafe(DecisionRecord),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound { message } => {
                let api_error = ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id: uuid::Uuid::now_v7().to_string(),
                    docs_hint: Some("See /swagger-ui for the available endpoints.".to_string()),
                };
                (StatusCode::NOT_FOUND, Json(api_error)).into_response()
            }
            AppError::FailureSafe(record) => {
                tracing::warn!(
                    promote = record.promote,
                    analysis = %record.analysis,
                    "Returning failure-safe decision"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, Json(record)).into_response()
            }
        }
    }
}
