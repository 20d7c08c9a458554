//! Error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Rejections for operator scenario commands. Surfaced synchronously to the
/// caller; never reaches the tick loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    #[error("unknown pipe id: {0}")]
    UnknownPipe(String),

    #[error("leak severity {0} out of range (expected 0.0..=1.0)")]
    SeverityOutOfRange(f64),

    #[error("demand multiplier {0} invalid (expected finite value >= 0)")]
    InvalidMultiplier(f64),

    #[error("demand spike duration must be greater than zero seconds")]
    InvalidDuration,
}

/// Failures from the external network-solver collaborator. Always recoverable:
/// the tick reuses the previous snapshot and the next tick is the retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("solver did not converge: {0}")]
    NonConvergence(String),

    #[error("solver timed out after {0} ms")]
    Timeout(u64),

    #[error("perturbation list references unknown pipe: {0}")]
    UnknownPipe(String),

    #[error("solver returned malformed output: {0}")]
    MalformedOutput(String),

    #[error("solver task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug)]
pub enum AppError {
    // Scenario command errors
    InvalidScenario(ScenarioError),

    // Resource errors
    NotFound(String),

    // Validation errors
    ValidationError(String),

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::InvalidScenario(err) => {
                let status = match err {
                    ScenarioError::UnknownPipe(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, err.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<ScenarioError> for AppError {
    fn from(err: ScenarioError) -> Self {
        AppError::InvalidScenario(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}
