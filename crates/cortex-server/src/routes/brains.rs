//! Per-brain endpoints: graph export, source removal and brain deletion.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use cortex_core::{ForceGraph, ForgetReport};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Response for deleting a brain.
#[derive(Debug, Serialize)]
pub struct DeleteBrainResponse {
    pub brain_id: String,
    pub deleted: bool,
}

/// Force-graph view of a brain.
/// GET /brains/:brain_id/graph
pub async fn get_graph(
    State(state): State<AppState>,
    Path(brain_id): Path<String>,
) -> ApiResult<Json<ForceGraph>> {
    let snapshot = state.pipeline.export_graph(&brain_id).await?;
    Ok(Json(ForceGraph::from(&snapshot)))
}

/// Remove everything one source contributed to a brain.
/// DELETE /brains/:brain_id/sources/:source_id
pub async fn forget_source(
    State(state): State<AppState>,
    Path((brain_id, source_id)): Path<(String, String)>,
) -> ApiResult<Json<ForgetReport>> {
    let report = state.pipeline.forget_source(&brain_id, &source_id).await?;
    if !report.succeeded() {
        let details = serde_json::to_value(&report)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        return Err(ApiError::new(
            StatusCode::BAD_GATEWAY,
            "FORGET_INCOMPLETE",
            format!("Source '{}' was not removed from every store", source_id),
        )
        .with_details(details));
    }
    Ok(Json(report))
}

/// Drop a brain from both stores.
/// DELETE /brains/:brain_id
pub async fn delete_brain(
    State(state): State<AppState>,
    Path(brain_id): Path<String>,
) -> ApiResult<Json<DeleteBrainResponse>> {
    state.pipeline.delete_brain(&brain_id).await?;
    Ok(Json(DeleteBrainResponse {
        brain_id,
        deleted: true,
    }))
}
