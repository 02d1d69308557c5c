use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// The artifact was stored but is not yet searchable.
    #[error("Vector write failed for artifact {artifact_id}")]
    VectorWriteFailed { artifact_id: String },
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(msg) => Self::ValidationError(msg),
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::VectorWriteFailed {
                artifact_id,
                reason,
            } => {
                tracing::error!(%artifact_id, %reason, "vector entry missing after ingestion");
                Self::VectorWriteFailed { artifact_id }
            }
            other => {
                tracing::error!("Internal error: {:?}", other);
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(rejection.body_text())
        } else {
            Self::ValidationError(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::ValidationError(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Self::InternalError(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(message, "error"),
            ),
            Self::ValidationError(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(message, "error"),
            ),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(message, "error"),
            ),
            Self::PayloadTooLarge(message) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorResponse::new(message, "error"),
            ),
            Self::VectorWriteFailed { artifact_id } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "artifact stored but not yet searchable".to_string(),
                    status: "vector_write_failed".to_string(),
                    id: Some(artifact_id),
                },
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

impl ErrorResponse {
    fn new(error: String, status: &str) -> Self {
        Self {
            error,
            status: status.to_string(),
            id: None,
        }
    }
}
