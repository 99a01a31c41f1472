//! Vector store trait and related types.
//!
//! A vector store holds many named collections. Cortex keeps one collection
//! per brain, so every call names the collection it operates on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

use crate::error::CortexResult;
use crate::types::Filter;

/// Distance metric for vector similarity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

/// A vector record with payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique identifier (a UUID string).
    pub id: String,
    /// Vector embedding.
    pub vector: Vec<f32>,
    /// Metadata payload.
    pub payload: HashMap<String, serde_json::Value>,
}

impl VectorRecord {
    /// Create a new vector record.
    pub fn new(
        id: impl Into<String>,
        vector: Vec<f32>,
        payload: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            vector,
            payload,
        }
    }
}

/// Search result from vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSearchResult {
    /// Unique identifier.
    pub id: String,
    /// Similarity score, higher is more similar.
    pub score: f32,
    /// Metadata payload.
    pub payload: HashMap<String, serde_json::Value>,
}

impl VectorSearchResult {
    /// Get a payload value as a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}

/// Core VectorStore trait - all vector store backends implement this.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection. Fails if it already exists.
    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: DistanceMetric,
    ) -> CortexResult<()>;

    /// Whether a collection exists.
    async fn collection_exists(&self, name: &str) -> CortexResult<bool>;

    /// Delete a collection and everything in it. Missing collections are not an error.
    async fn delete_collection(&self, name: &str) -> CortexResult<()>;

    /// List all collections.
    async fn list_collections(&self) -> CortexResult<Vec<String>>;

    /// Insert or overwrite records by id.
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> CortexResult<()>;

    /// Search for similar vectors, best first.
    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
        filter: Option<Filter>,
    ) -> CortexResult<Vec<VectorSearchResult>>;

    /// Delete every record whose payload matches the filter.
    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> CortexResult<()>;

    /// Count records, optionally restricted by a filter.
    async fn count(&self, collection: &str, filter: Option<Filter>) -> CortexResult<u64>;
}

/// Vector store provider type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum VectorStoreProvider {
    #[default]
    Qdrant,
    /// Embedded SQLite store with exact cosine search.
    Sqlite,
}

/// Vector store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Provider type.
    #[serde(default)]
    pub provider: VectorStoreProvider,
    /// Prefix prepended to a brain id to form its collection name.
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
    /// Embedding dimensions.
    #[serde(default = "default_embedding_dims")]
    pub embedding_model_dims: usize,
    /// Provider-specific configuration (`url`, `api_key`, `path`).
    #[serde(flatten)]
    pub config: serde_json::Value,
}

fn default_collection_prefix() -> String {
    "brain_".to_string()
}

fn default_embedding_dims() -> usize {
    1536
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: VectorStoreProvider::Qdrant,
            collection_prefix: default_collection_prefix(),
            embedding_model_dims: default_embedding_dims(),
            config: serde_json::json!({}),
        }
    }
}

impl VectorStoreConfig {
    /// Read a string setting from the provider-specific section.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }
}
