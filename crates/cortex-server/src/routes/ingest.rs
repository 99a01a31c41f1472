//! Document ingestion endpoint.

use axum::{extract::State, Json};

use cortex_core::{IngestReport, IngestRequest};

use crate::error::ApiResult;
use crate::state::AppState;

/// Chunk, extract and store a document in a brain.
/// POST /ingest
pub async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> ApiResult<Json<IngestReport>> {
    request.validate()?;
    let report = state.pipeline.ingest(request).await?;
    Ok(Json(report))
}
