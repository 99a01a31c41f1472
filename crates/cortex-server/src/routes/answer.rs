//! Question answering endpoint.

use axum::{extract::State, Json};

use cortex_core::{AskRequest, AskResponse};

use crate::error::ApiResult;
use crate::state::AppState;

/// Answer a question from a brain's graph.
/// POST /answer
pub async fn answer(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> ApiResult<Json<AskResponse>> {
    request.validate()?;
    let response = state.pipeline.ask(request).await?;
    Ok(Json(response))
}
