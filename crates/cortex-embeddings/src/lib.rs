//! cortex-embeddings - Embedding provider implementations for cortex.
//!
//! # Supported Providers
//!
//! - **OpenAI** (feature: `openai`) - text-embedding-3-small, text-embedding-3-large, etc.
//! - **Ollama** (feature: `ollama`) - Local embedding models via Ollama
//!
//! # Example
//!
//! ```ignore
//! use cortex_embeddings::EmbedderFactory;
//!
//! let embedder = EmbedderFactory::openai_with_model("text-embedding-3-large", 3072)?;
//! let embedder = EmbedderFactory::ollama_with_model("nomic-embed-text", 768)?;
//! ```

mod factory;
mod ollama;
mod openai;

pub use factory::EmbedderFactory;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAIEmbedder;

// Re-export core types for convenience
pub use cortex_core::traits::{Embedder, EmbedderConfig, EmbedderProvider, EmbeddingAction};
