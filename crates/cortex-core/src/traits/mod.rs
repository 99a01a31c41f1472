//! Core traits for cortex providers and stores.

mod embedder;
mod graph_store;
mod llm;
mod vector_store;

pub use embedder::*;
pub use graph_store::*;
pub use llm::*;
pub use vector_store::*;
