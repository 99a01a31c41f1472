//! Source similarity search endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

/// Request body for a source search.
#[derive(Debug, Deserialize)]
pub struct SearchSourcesRequest {
    pub query: String,
}

/// Source ids ordered by similarity, without duplicates.
#[derive(Debug, Serialize)]
pub struct SearchSourcesResponse {
    pub source_ids: Vec<String>,
}

/// Find the sources whose content best matches a query.
/// POST /brains/:brain_id/search
pub async fn search_sources(
    State(state): State<AppState>,
    Path(brain_id): Path<String>,
    Json(request): Json<SearchSourcesRequest>,
) -> ApiResult<Json<SearchSourcesResponse>> {
    let source_ids = state
        .pipeline
        .similar_sources(&brain_id, &request.query)
        .await?;
    Ok(Json(SearchSourcesResponse { source_ids }))
}
