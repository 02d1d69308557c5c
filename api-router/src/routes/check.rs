use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use common::storage::store::ArtifactStore;
use serde::Deserialize;
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CheckParams {
    pub repo_full_name: Option<String>,
}

/// Reports whether any artifact has been ingested for a repository.
pub async fn check_repository(
    State(state): State<ApiState>,
    params: Result<Query<CheckParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let repo_full_name = params
        .repo_full_name
        .map(|repo| repo.trim().to_string())
        .filter(|repo| !repo.is_empty())
        .ok_or_else(|| ApiError::ValidationError("missing field: repo_full_name".to_string()))?;

    let exists = ArtifactStore::exists_for_repo(state.db.as_ref(), &repo_full_name).await?;

    Ok(if exists {
        (StatusCode::OK, Json(json!({ "status": "exists" })))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "status": "not_found" })))
    })
}
