//! cortex-core - Core library for cortex.
//!
//! This crate provides the core types, traits, and the knowledge pipeline
//! that turns documents into a per-brain knowledge graph and answers
//! questions over it.
//!
//! # Example
//!
//! ```ignore
//! use cortex_core::{AskRequest, CortexConfig, IngestRequest, KnowledgePipeline};
//!
//! let config = CortexConfig::default();
//! let pipeline = KnowledgePipeline::new(&config, llm, embedder, vector_store, graph_store)?;
//!
//! // Build the graph from a document
//! let report = pipeline.ingest(IngestRequest::new(text, "doc-1", "brain-1")).await?;
//!
//! // Ask a question
//! let response = pipeline.ask(AskRequest::new("What is Paris the capital of?", "brain-1")).await?;
//! ```

pub mod answer;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod pipeline;
pub mod retrieval;
pub mod retry;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{CortexConfig, PipelineConfig};
pub use error::{CortexError, CortexResult, ErrorCode};
pub use pipeline::{
    AnswerOutcome, AskRequest, AskResponse, ForgetReport, IngestReport, IngestRequest,
    KnowledgePipeline,
};
pub use retrieval::{RetrievalConfig, VectorIndex};
pub use retry::{with_retry, RetryPolicy};
pub use traits::{
    Embedder, EmbedderConfig, EmbeddingAction, GraphStore, GraphStoreConfig, Llm, LlmConfig,
    VectorStore, VectorStoreConfig,
};
pub use types::{
    Entity, EntityKey, ExtractionDelta, Filter, ForceGraph, GraphSnapshot, Message, Neighborhood,
    Relation,
};
