//! Graph store trait and related types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CortexResult;
use crate::types::{Entity, GraphSnapshot, Neighborhood, ProvenanceDeletion, Relation, UpsertOutcome};

/// Core GraphStore trait - all graph store backends implement this.
///
/// Every operation is scoped to one brain; nothing is visible across brains.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create or merge entities and relations in one atomic step.
    ///
    /// Entities merge on `(name, label)`, appending only descriptions not
    /// already present. A relation endpoint resolves to an entity of the same
    /// batch with that name, else to an existing entity of the brain; relations
    /// that resolve neither way are rejected and reported in the outcome.
    async fn upsert_graph(
        &self,
        brain_id: &str,
        entities: &[Entity],
        relations: &[Relation],
    ) -> CortexResult<UpsertOutcome>;

    /// Return the named entities, every entity within `hops` edges of them
    /// (in either direction), and the relations among them.
    async fn query_neighborhood(
        &self,
        brain_id: &str,
        names: &[String],
        hops: usize,
    ) -> CortexResult<Neighborhood>;

    /// Remove every description from `source_id`, then prune entities left
    /// without descriptions along with their relations.
    async fn delete_by_provenance(
        &self,
        brain_id: &str,
        source_id: &str,
    ) -> CortexResult<ProvenanceDeletion>;

    /// Remove everything belonging to a brain.
    async fn delete_tenant(&self, brain_id: &str) -> CortexResult<()>;

    /// Every entity and relation of a brain.
    async fn export_graph(&self, brain_id: &str) -> CortexResult<GraphSnapshot>;
}

/// Graph store provider type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum GraphStoreProvider {
    /// SQLite persistence with an in-memory petgraph mirror.
    #[default]
    Embedded,
    Neo4j,
}

/// Graph store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    /// Provider type.
    #[serde(default)]
    pub provider: GraphStoreProvider,
    /// Connection URL, or a database path (`:memory:` allowed) for the embedded store.
    pub url: String,
    /// Username for authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password for authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Database name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        let path = dirs::home_dir()
            .map(|h| h.join(".cortex").join("graph.db"))
            .unwrap_or_else(|| std::path::PathBuf::from(".cortex/graph.db"));
        Self {
            provider: GraphStoreProvider::Embedded,
            url: path.to_string_lossy().into_owned(),
            username: None,
            password: None,
            database: None,
        }
    }
}
