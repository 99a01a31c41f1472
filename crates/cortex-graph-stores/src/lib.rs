//! cortex-graph-stores - Graph store implementations for cortex.
//!
//! Every backend keeps each brain's entities, descriptions and relations
//! isolated from every other brain.
//!
//! # Supported Backends
//!
//! - **Embedded** (feature: `embedded`, default) - SQLite with a petgraph mirror
//! - **Neo4j** (feature: `neo4j`) - Neo4j over Bolt

mod factory;

#[cfg(feature = "embedded")]
pub mod embedded;

#[cfg(feature = "neo4j")]
mod neo4j;

pub use factory::GraphStoreFactory;

#[cfg(feature = "embedded")]
pub use embedded::EmbeddedGraphStore;

#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jGraphStore;

// Re-export core types
pub use cortex_core::traits::{GraphStore, GraphStoreConfig, GraphStoreProvider};
