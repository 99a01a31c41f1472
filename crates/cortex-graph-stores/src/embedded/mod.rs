//! Embedded graph store using petgraph + SQLite hybrid architecture.
//!
//! - SQLite holds the durable graph and makes every write atomic.
//! - A petgraph `StableDiGraph` mirrors it for neighborhood traversal.
//! - The mirror is hydrated on open and patched after each commit.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          EmbeddedGraphStore             │
//! ├─────────────────────────────────────────┤
//! │  ┌─────────────┐    ┌────────────────┐  │
//! │  │   SQLite    │    │   petgraph     │  │
//! │  │ (persistent)│───►│  (in-memory)   │  │
//! │  │             │    │ StableDiGraph  │  │
//! │  └─────────────┘    └────────────────┘  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Writers hold the connection lock across commit and mirror patch, so readers
//! of the mirror see either none or all of a batch.

pub mod petgraph_ops;
pub mod schema;
pub mod sync;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::Connection;

use cortex_core::error::{CortexError, CortexResult};
use cortex_core::traits::{GraphStore, GraphStoreConfig};
use cortex_core::types::{
    Entity, GraphSnapshot, Neighborhood, ProvenanceDeletion, Relation, UpsertOutcome,
};

use petgraph_ops::GraphMirror;

/// Embedded graph store using petgraph + SQLite.
///
/// Thread-safe via Mutex on the connection and graph.
pub struct EmbeddedGraphStore {
    /// SQLite connection (wrapped in Mutex for Send + Sync).
    conn: Mutex<Connection>,
    /// In-memory graph for fast traversal.
    mirror: Mutex<GraphMirror>,
}

impl EmbeddedGraphStore {
    /// Open (or create) a store at the given database path.
    pub fn new(db_path: impl AsRef<Path>) -> CortexResult<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        schema::init_schema(&conn)?;

        let mut mirror = GraphMirror::new();
        sync::load_graph(&conn, &mut mirror)?;
        tracing::debug!(
            path = %db_path.display(),
            entities = mirror.entity_count(),
            relations = mirror.relation_count(),
            "Opened embedded graph store"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            mirror: Mutex::new(mirror),
        })
    }

    /// Create a new in-memory embedded graph store.
    pub fn in_memory() -> CortexResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            mirror: Mutex::new(GraphMirror::new()),
        })
    }

    /// Create from a GraphStoreConfig. The URL is the database path.
    pub fn from_config(config: &GraphStoreConfig) -> CortexResult<Self> {
        if config.url.is_empty() || config.url == ":memory:" {
            Self::in_memory()
        } else {
            Self::new(&config.url)
        }
    }

    fn lock_conn(&self) -> CortexResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CortexError::internal(format!("graph connection lock poisoned: {}", e)))
    }

    fn lock_mirror(&self) -> CortexResult<MutexGuard<'_, GraphMirror>> {
        self.mirror
            .lock()
            .map_err(|e| CortexError::internal(format!("graph mirror lock poisoned: {}", e)))
    }

    /// Number of entities across all brains.
    pub fn entity_count(&self) -> CortexResult<usize> {
        Ok(self.lock_mirror()?.entity_count())
    }

    /// Number of relations across all brains.
    pub fn relation_count(&self) -> CortexResult<usize> {
        Ok(self.lock_mirror()?.relation_count())
    }
}

#[async_trait]
impl GraphStore for EmbeddedGraphStore {
    async fn upsert_graph(
        &self,
        brain_id: &str,
        entities: &[Entity],
        relations: &[Relation],
    ) -> CortexResult<UpsertOutcome> {
        let mut conn = self.lock_conn()?;
        let writes = sync::write_batch(&mut conn, brain_id, entities, relations)?;

        let mut mirror = self.lock_mirror()?;
        for node in writes.entities {
            mirror.merge_entity(node);
        }
        let relations_created = writes.relations.len();
        for (source, target, edge) in writes.relations {
            mirror.add_relation(source, target, edge);
        }
        drop(mirror);
        drop(conn);

        for rejected in &writes.rejected {
            tracing::warn!(
                brain_id = %brain_id,
                source = %rejected.relation.source,
                target = %rejected.relation.target,
                "Rejected relation: {}",
                rejected.reason
            );
        }

        Ok(UpsertOutcome {
            entities_created: writes.entities_created,
            entities_updated: writes.entities_updated,
            descriptions_added: writes.descriptions_added,
            relations_created,
            rejected: writes.rejected,
        })
    }

    async fn query_neighborhood(
        &self,
        brain_id: &str,
        names: &[String],
        hops: usize,
    ) -> CortexResult<Neighborhood> {
        Ok(self.lock_mirror()?.neighborhood(brain_id, names, hops))
    }

    async fn delete_by_provenance(
        &self,
        brain_id: &str,
        source_id: &str,
    ) -> CortexResult<ProvenanceDeletion> {
        let mut conn = self.lock_conn()?;
        let deletion = sync::delete_source(&mut conn, brain_id, source_id)?;

        let mut mirror = self.lock_mirror()?;
        mirror.remove_source(brain_id, source_id);
        for (db_id, _) in &deletion.entities_removed {
            mirror.remove_entity(*db_id);
        }
        drop(mirror);
        drop(conn);

        tracing::debug!(
            brain_id = %brain_id,
            source_id = %source_id,
            descriptions = deletion.descriptions_removed,
            entities = deletion.entities_removed.len(),
            "Deleted source from graph"
        );

        Ok(ProvenanceDeletion {
            descriptions_removed: deletion.descriptions_removed,
            entities_removed: deletion
                .entities_removed
                .into_iter()
                .map(|(_, key)| key)
                .collect(),
            relations_removed: deletion.relations_removed,
        })
    }

    async fn delete_tenant(&self, brain_id: &str) -> CortexResult<()> {
        let conn = self.lock_conn()?;
        let removed = sync::delete_brain(&conn, brain_id)?;
        self.lock_mirror()?.remove_tenant(brain_id);
        drop(conn);

        tracing::info!(brain_id = %brain_id, entities = removed, "Deleted brain graph");
        Ok(())
    }

    async fn export_graph(&self, brain_id: &str) -> CortexResult<GraphSnapshot> {
        Ok(self.lock_mirror()?.snapshot(brain_id))
    }
}

impl std::fmt::Debug for EmbeddedGraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedGraphStore")
            .field("entity_count", &self.entity_count().unwrap_or(0))
            .field("relation_count", &self.relation_count().unwrap_or(0))
            .finish()
    }
}
