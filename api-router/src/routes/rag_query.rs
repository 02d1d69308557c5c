use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RagQueryParams {
    pub query: Option<String>,
}

pub async fn rag_query(
    State(state): State<ApiState>,
    payload: Result<Json<RagQueryParams>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(params) = payload?;
    let query = params
        .query
        .filter(|query| !query.trim().is_empty())
        .ok_or_else(|| ApiError::ValidationError("missing field: query".to_string()))?;

    info!(query_chars = query.chars().count(), "Received rag query");

    let answer = state.retrieval.answer(&query).await?;

    Ok(Json(answer))
}
