//! Tenant-partitioned vector index over entity descriptions.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{CortexError, CortexResult, ErrorCode};
use crate::traits::{
    DistanceMetric, Embedder, EmbeddingAction, VectorRecord, VectorSearchResult, VectorStore,
};
use crate::types::{Entity, Filter};

use super::config::RetrievalConfig;
use super::tiering::{select_tiered, EntityHit};
use super::views::{description_views, point_id};

const UPSERT_BATCH_SIZE: usize = 128;

/// Payload field names written with every vector record.
pub mod fields {
    pub const BRAIN_ID: &str = "brain_id";
    pub const SOURCE_ID: &str = "source_id";
    pub const ENTITY_NAME: &str = "entity_name";
    pub const ENTITY_LABEL: &str = "entity_label";
    pub const DESCRIPTION: &str = "description";
    pub const VIEW_INDEX: &str = "view_index";
    pub const TEXT: &str = "text";
}

/// Multi-view semantic index, one collection per brain.
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    collection_prefix: String,
    namespace_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VectorIndex {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        collection_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            collection_prefix: collection_prefix.into(),
            namespace_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Collection backing a brain.
    pub fn collection_name(&self, brain_id: &str) -> String {
        format!("{}{}", self.collection_prefix, brain_id)
    }

    async fn namespace_lock(&self, brain_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.namespace_locks.lock().await;
        locks
            .entry(brain_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create the brain's collection if it does not exist.
    ///
    /// Returns `true` when a collection was created. Never drops data.
    pub async fn ensure_namespace(&self, brain_id: &str) -> CortexResult<bool> {
        let lock = self.namespace_lock(brain_id).await;
        let _guard = lock.lock().await;

        let collection = self.collection_name(brain_id);
        if self.store.collection_exists(&collection).await? {
            return Ok(false);
        }

        match self
            .store
            .create_collection(&collection, self.embedder.dimension(), DistanceMetric::Cosine)
            .await
        {
            Ok(()) => {
                tracing::info!(brain_id = %brain_id, "Created vector collection {}", collection);
                Ok(true)
            }
            // Another process may have created it between the check and the create.
            Err(e) => {
                if self.store.collection_exists(&collection).await.unwrap_or(false) {
                    tracing::debug!("Collection {} appeared concurrently: {}", collection, e);
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Drop and recreate the brain's collection. Destroys every indexed view.
    pub async fn rebuild_namespace(&self, brain_id: &str) -> CortexResult<()> {
        let lock = self.namespace_lock(brain_id).await;
        let _guard = lock.lock().await;

        let collection = self.collection_name(brain_id);
        self.store.delete_collection(&collection).await?;
        self.store
            .create_collection(&collection, self.embedder.dimension(), DistanceMetric::Cosine)
            .await?;
        tracing::warn!(brain_id = %brain_id, "Rebuilt vector collection {}", collection);
        Ok(())
    }

    /// Drop the brain's collection.
    pub async fn delete_namespace(&self, brain_id: &str) -> CortexResult<()> {
        let lock = self.namespace_lock(brain_id).await;
        let _guard = lock.lock().await;

        self.store
            .delete_collection(&self.collection_name(brain_id))
            .await?;

        // Only forget the lock when no other task holds a handle to it.
        let mut locks = self.namespace_locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(brain_id);
        }
        Ok(())
    }

    /// Whether the brain has a searchable collection.
    pub async fn is_ready(&self, brain_id: &str) -> CortexResult<bool> {
        self.store
            .collection_exists(&self.collection_name(brain_id))
            .await
    }

    /// Embed and upsert every view of every description. Returns the number of
    /// records written.
    pub async fn index(&self, brain_id: &str, entities: &[Entity]) -> CortexResult<usize> {
        let mut records = Vec::new();
        let mut texts = Vec::new();

        for entity in entities {
            for description in &entity.descriptions {
                for (view_index, text) in description_views(entity, &description.text) {
                    let id = point_id(entity, &description.source_id, &description.text, view_index);
                    let mut payload = HashMap::new();
                    payload.insert(fields::BRAIN_ID.to_string(), brain_id.into());
                    payload.insert(
                        fields::SOURCE_ID.to_string(),
                        description.source_id.clone().into(),
                    );
                    payload.insert(fields::ENTITY_NAME.to_string(), entity.name.clone().into());
                    payload.insert(fields::ENTITY_LABEL.to_string(), entity.label.clone().into());
                    payload.insert(
                        fields::DESCRIPTION.to_string(),
                        description.text.clone().into(),
                    );
                    payload.insert(fields::VIEW_INDEX.to_string(), view_index.into());
                    payload.insert(fields::TEXT.to_string(), text.clone().into());

                    records.push(VectorRecord::new(id.to_string(), Vec::new(), payload));
                    texts.push(text);
                }
            }
        }

        if records.is_empty() {
            return Ok(0);
        }

        let vectors = self
            .embedder
            .embed_batch(&texts, Some(EmbeddingAction::Add))
            .await?;
        if vectors.len() != records.len() {
            return Err(CortexError::Embedding {
                message: format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    records.len()
                ),
                code: ErrorCode::EmbGenerationFailed,
                source: None,
            });
        }

        let dimension = self.embedder.dimension();
        for (record, vector) in records.iter_mut().zip(vectors) {
            if vector.len() != dimension {
                return Err(CortexError::Embedding {
                    message: format!(
                        "expected {} dimensions, embedder returned {}",
                        dimension,
                        vector.len()
                    ),
                    code: ErrorCode::EmbDimensionMismatch,
                    source: None,
                });
            }
            record.vector = vector;
        }

        let total = records.len();
        let collection = self.collection_name(brain_id);
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            let batch: Vec<VectorRecord> = records.by_ref().take(UPSERT_BATCH_SIZE).collect();
            self.store.upsert(&collection, batch).await?;
        }

        tracing::debug!(brain_id = %brain_id, "Indexed {} views for {} entities", total, entities.len());
        Ok(total)
    }

    /// Tiered similarity search with a precomputed query vector.
    pub async fn search(
        &self,
        brain_id: &str,
        query_vector: &[f32],
        config: &RetrievalConfig,
    ) -> CortexResult<Vec<EntityHit>> {
        let candidates = self
            .store
            .search(
                &self.collection_name(brain_id),
                query_vector,
                config.candidate_pool(),
                None,
            )
            .await?;

        let hits: Vec<EntityHit> = candidates.into_iter().filter_map(to_hit).collect();
        Ok(select_tiered(hits, config))
    }

    /// Embed `query` and run a tiered search.
    pub async fn search_text(
        &self,
        brain_id: &str,
        query: &str,
        config: &RetrievalConfig,
    ) -> CortexResult<Vec<EntityHit>> {
        let vector = self
            .embedder
            .embed(query, Some(EmbeddingAction::Search))
            .await?;
        self.search(brain_id, &vector, config).await
    }

    /// Delete every view that came from `source_id`.
    pub async fn delete_by_provenance(&self, brain_id: &str, source_id: &str) -> CortexResult<()> {
        let collection = self.collection_name(brain_id);
        if !self.store.collection_exists(&collection).await? {
            return Ok(());
        }
        self.store
            .delete_by_filter(&collection, &Filter::eq(fields::SOURCE_ID, source_id))
            .await
    }

    /// Number of indexed views, optionally only those from one source.
    pub async fn count(&self, brain_id: &str, source_id: Option<&str>) -> CortexResult<u64> {
        let collection = self.collection_name(brain_id);
        if !self.store.collection_exists(&collection).await? {
            return Ok(0);
        }
        let filter = source_id.map(|s| Filter::eq(fields::SOURCE_ID, s));
        self.store.count(&collection, filter).await
    }
}

fn to_hit(result: VectorSearchResult) -> Option<EntityHit> {
    let hit = EntityHit {
        entity_name: result.get_string(fields::ENTITY_NAME)?.to_string(),
        entity_label: result.get_string(fields::ENTITY_LABEL)?.to_string(),
        source_id: result.get_string(fields::SOURCE_ID)?.to_string(),
        description: result
            .get_string(fields::DESCRIPTION)
            .unwrap_or_default()
            .to_string(),
        view_index: result
            .payload
            .get(fields::VIEW_INDEX)
            .and_then(|v| v.as_u64())
            .unwrap_or_default() as usize,
        score: result.score,
        point_id: result.id,
    };
    Some(hit)
}
