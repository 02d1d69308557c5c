use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use ingestion_pipeline::{IngestRequest, IngestStatus};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

// Fields are optional so a missing one maps to a 400 naming it.
#[derive(Debug, Deserialize)]
pub struct IngestParams {
    pub repo_full_name: Option<String>,
    pub file_path: Option<String>,
    pub content: Option<String>,
}

impl IngestParams {
    fn into_request(self) -> Result<IngestRequest, ApiError> {
        let repo_full_name = required(self.repo_full_name, "repo_full_name")?;
        let file_path = required(self.file_path, "file_path")?;
        let content = self
            .content
            .ok_or_else(|| ApiError::ValidationError("missing field: content".to_string()))?;

        Ok(IngestRequest::new(repo_full_name, file_path, content))
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::ValidationError(format!("missing field: {field}"))),
    }
}

pub async fn ingest_artifact(
    State(state): State<ApiState>,
    payload: Result<Json<IngestParams>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(params) = payload?;
    let request = params.into_request()?;

    info!(
        repo_full_name = %request.repo_full_name,
        file_path = %request.file_path,
        content_bytes = request.content.len(),
        "Received ingestion request"
    );

    let outcome = state.ingestion.ingest(request).await?;
    let status = match outcome.status {
        IngestStatus::Processed => StatusCode::CREATED,
        IngestStatus::AlreadyProcessed => StatusCode::OK,
    };

    Ok((
        status,
        Json(json!({ "id": outcome.id, "message": outcome.status.message() })),
    ))
}
