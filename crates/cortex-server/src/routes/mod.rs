//! Route definitions for the REST API.

mod answer;
mod brains;
mod health;
mod ingest;
mod search;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Graph construction and retrieval
        .route("/ingest", post(ingest::ingest))
        .route("/answer", post(answer::answer))
        // Brain management
        .route("/brains/:brain_id", delete(brains::delete_brain))
        .route("/brains/:brain_id/graph", get(brains::get_graph))
        .route("/brains/:brain_id/search", post(search::search_sources))
        .route(
            "/brains/:brain_id/sources/:source_id",
            delete(brains::forget_source),
        )
        // Attach state
        .with_state(state)
}

pub use answer::*;
pub use brains::*;
pub use health::*;
pub use ingest::*;
pub use search::*;
