//! cortex-server - REST API server for cortex.
//!
//! Exposes ingestion, question answering and brain management over JSON/HTTP.
//!
//! # Example
//!
//! ```ignore
//! use cortex_server::{create_pipeline, create_server, AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = cortex_core::CortexConfig::from_env()?;
//!     let pipeline = create_pipeline(&config).await?;
//!     let app = create_server(AppState::new(pipeline, config));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod factory;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use factory::create_pipeline;
pub use state::AppState;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

/// Create the server with all routes and middleware.
pub fn create_server(state: AppState) -> Router {
    routes::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors_layer())
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}
