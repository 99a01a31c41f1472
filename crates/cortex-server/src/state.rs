//! Server state management.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cortex_core::{CortexConfig, KnowledgePipeline};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<KnowledgePipeline>,
    pub config: Arc<CortexConfig>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: KnowledgePipeline, config: CortexConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
            started_at: Utc::now(),
        }
    }
}
