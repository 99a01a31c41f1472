//! Deterministic collaborators for server tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cortex_core::error::{CortexError, CortexResult};
use cortex_core::traits::{Embedder, EmbeddingAction, GenerationOptions, Llm, LlmResponse};
use cortex_core::types::Message;
use cortex_core::{CortexConfig, KnowledgePipeline, RetryPolicy};
use cortex_graph_stores::EmbeddedGraphStore;
use cortex_server::AppState;
use cortex_vector_stores::SqliteVectorStore;

pub const PARIS_GRAPH: &str = r#"{
    "nodes": [
        {"label": "City", "name": "Paris", "description": "Capital of France"},
        {"label": "Country", "name": "France", "description": "A country in Europe"}
    ],
    "edges": [{"source": "Paris", "target": "France", "relation": "capital of"}]
}"#;

pub const PARIS_ANSWER: &str = "Paris is the capital of France.\nEOF\n{\"referenced_nodes\": [\"City-Paris\", \"Country-France\"]}";

/// Replies with queued responses in order, repeating the last once drained.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    calls: Mutex<usize>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    async fn generate(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> CortexResult<LlmResponse> {
        *self.calls.lock().unwrap() += 1;
        let next = self.replies.lock().unwrap().pop_front();
        let text = match next {
            Some(text) => {
                *self.last.lock().unwrap() = Some(text.clone());
                text
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| CortexError::llm("no scripted reply"))?,
        };
        Ok(LlmResponse::text(text))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Embeds text as counts of a few marker words.
pub struct KeywordEmbedder;

const MARKERS: [&str; 4] = ["paris", "france", "louvre", "berlin"];

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str, _action: Option<EmbeddingAction>) -> CortexResult<Vec<f32>> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = MARKERS
            .iter()
            .map(|m| lower.matches(m).count() as f32)
            .collect();
        vector.push(0.01);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        MARKERS.len() + 1
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

pub fn test_config() -> CortexConfig {
    let mut config = CortexConfig::default();
    config.pipeline.retry = RetryPolicy {
        max_retries: 1,
        initial_delay_ms: 1,
        max_delay_ms: 2,
        multiplier: 1.0,
    };
    config
}

/// Pipeline over the embedded graph store and an in-memory SQLite vector store.
pub fn pipeline(llm: Arc<ScriptedLlm>) -> KnowledgePipeline {
    KnowledgePipeline::new(
        &test_config(),
        llm,
        Arc::new(KeywordEmbedder),
        Arc::new(SqliteVectorStore::open(":memory:").unwrap()),
        Arc::new(EmbeddedGraphStore::in_memory().unwrap()),
    )
    .unwrap()
}

pub fn app_state(llm: Arc<ScriptedLlm>) -> AppState {
    AppState::new(pipeline(llm), test_config())
}
