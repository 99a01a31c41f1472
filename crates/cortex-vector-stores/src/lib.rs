//! cortex-vector-stores - Vector store implementations for cortex.
//!
//! Each brain gets its own collection; records are the embedded views of
//! graph entities.
//!
//! # Supported Backends
//!
//! - **Qdrant** (feature: `qdrant`) - Qdrant over gRPC
//! - **SQLite** (feature: `sqlite`) - embedded store with exact search

mod factory;

#[cfg(feature = "qdrant")]
mod qdrant;

#[cfg(feature = "sqlite")]
mod sqlite;

// Public exports
pub use factory::VectorStoreFactory;

#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteVectorStore;

// Re-export core types for convenience
pub use cortex_core::traits::{
    DistanceMetric, VectorRecord, VectorSearchResult, VectorStore, VectorStoreConfig,
    VectorStoreProvider,
};
