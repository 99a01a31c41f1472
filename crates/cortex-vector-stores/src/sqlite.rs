//! Embedded SQLite vector store.
//!
//! Vectors are stored as little-endian `f32` blobs and searched exactly:
//! every record of the collection is scored against the query. This is
//! enough for single-node deployments and tests; use Qdrant for large
//! collections.
//!
//! # Example
//!
//! ```ignore
//! use cortex_vector_stores::SqliteVectorStore;
//!
//! let store = SqliteVectorStore::open(":memory:")?;
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use zerocopy::IntoBytes;

use cortex_core::error::{CortexError, CortexResult, ErrorCode};
use cortex_core::traits::{DistanceMetric, VectorRecord, VectorSearchResult, VectorStore};
use cortex_core::types::Filter;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    dimension INTEGER NOT NULL,
    distance TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vectors (
    collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
    id TEXT NOT NULL,
    embedding BLOB NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
"#;

/// SQLite-backed vector store with exact similarity search.
pub struct SqliteVectorStore {
    /// SQLite connection (wrapped in Mutex for Send + Sync).
    conn: Mutex<Connection>,
}

fn op_error(message: String, err: rusqlite::Error) -> CortexError {
    let code = match err.sqlite_error_code() {
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
            ErrorCode::VecConnectionFailed
        }
        _ => ErrorCode::VecOperationFailed,
    };
    CortexError::VectorStore {
        message,
        code,
        source: Some(Box::new(err)),
    }
}

impl SqliteVectorStore {
    /// Open (or create) a store at `path`. Use `":memory:"` for an in-memory store.
    pub fn open(path: impl AsRef<Path>) -> CortexResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|e| CortexError::VectorStore {
            message: format!("Failed to open SQLite database: {}", e),
            code: ErrorCode::VecConnectionFailed,
            source: Some(Box::new(e)),
        })?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .and_then(|_| conn.execute_batch(SCHEMA))
            .map_err(|e| op_error(format!("Failed to initialize schema: {}", e), e))?;

        tracing::debug!("Opened SQLite vector store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> CortexResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CortexError::vector_store(format!("Failed to acquire lock: {}", e)))
    }

    /// Convert Vec<f32> to bytes for storage.
    fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
        vector.as_bytes().to_vec()
    }

    /// Convert bytes back to Vec<f32>.
    fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn distance_name(metric: DistanceMetric) -> &'static str {
        match metric {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::DotProduct => "dot",
        }
    }

    fn distance_from_name(name: &str) -> DistanceMetric {
        match name {
            "euclidean" => DistanceMetric::Euclidean,
            "dot" => DistanceMetric::DotProduct,
            _ => DistanceMetric::Cosine,
        }
    }

    /// Similarity score, higher is more similar.
    fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
        match metric {
            DistanceMetric::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if na == 0.0 || nb == 0.0 {
                    0.0
                } else {
                    dot / (na * nb)
                }
            }
            DistanceMetric::DotProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            DistanceMetric::Euclidean => {
                let d = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + d)
            }
        }
    }

    fn collection_params(
        conn: &Connection,
        name: &str,
    ) -> CortexResult<Option<(usize, DistanceMetric)>> {
        conn.query_row(
            "SELECT dimension, distance FROM collections WHERE name = ?1",
            params![name],
            |row| {
                let dimension: i64 = row.get(0)?;
                let distance: String = row.get(1)?;
                Ok((dimension as usize, Self::distance_from_name(&distance)))
            },
        )
        .optional()
        .map_err(|e| op_error(format!("Failed to read collection '{}': {}", name, e), e))
    }

    fn require_collection(conn: &Connection, name: &str) -> CortexResult<(usize, DistanceMetric)> {
        Self::collection_params(conn, name)?.ok_or_else(|| CortexError::VectorStore {
            message: format!("Collection '{}' does not exist", name),
            code: ErrorCode::VecCollectionNotFound,
            source: None,
        })
    }

    /// Load `(id, vector, payload)` rows of a collection matching `filter`.
    fn load(
        conn: &Connection,
        collection: &str,
        filter: Option<&Filter>,
    ) -> CortexResult<Vec<(String, Vec<f32>, HashMap<String, Value>)>> {
        let mut stmt = conn
            .prepare("SELECT id, embedding, payload FROM vectors WHERE collection = ?1")
            .map_err(|e| op_error(format!("Failed to prepare scan: {}", e), e))?;
        let rows = stmt
            .query_map(params![collection], |row| {
                let id: String = row.get(0)?;
                let bytes: Vec<u8> = row.get(1)?;
                let payload: String = row.get(2)?;
                Ok((id, bytes, payload))
            })
            .map_err(|e| op_error(format!("Failed to scan collection: {}", e), e))?;

        let mut out = Vec::new();
        for row in rows {
            let (id, bytes, payload) =
                row.map_err(|e| op_error(format!("Failed to read row: {}", e), e))?;
            let payload: serde_json::Map<String, Value> = serde_json::from_str(&payload)?;
            if filter.map_or(true, |f| f.matches(&payload)) {
                out.push((id, Self::bytes_to_vector(&bytes), payload.into_iter().collect()));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: DistanceMetric,
    ) -> CortexResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO collections (name, dimension, distance) VALUES (?1, ?2, ?3)",
            params![name, dimension as i64, Self::distance_name(distance)],
        )
        .map_err(|e| op_error(format!("Failed to create collection '{}': {}", name, e), e))?;

        tracing::info!("Created collection '{}' with dimension {}", name, dimension);
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> CortexResult<bool> {
        let conn = self.lock()?;
        Ok(Self::collection_params(&conn, name)?.is_some())
    }

    async fn delete_collection(&self, name: &str) -> CortexResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM collections WHERE name = ?1", params![name])
            .map_err(|e| op_error(format!("Failed to delete collection '{}': {}", name, e), e))?;
        Ok(())
    }

    async fn list_collections(&self) -> CortexResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT name FROM collections ORDER BY name")
            .map_err(|e| op_error(format!("Failed to list collections: {}", e), e))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| op_error(format!("Failed to list collections: {}", e), e))?;
        Ok(names)
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> CortexResult<()> {
        let mut conn = self.lock()?;
        let (dimension, _) = Self::require_collection(&conn, collection)?;

        let tx = conn
            .transaction()
            .map_err(|e| op_error(format!("Failed to begin transaction: {}", e), e))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO vectors (collection, id, embedding, payload) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(collection, id) DO UPDATE SET embedding = excluded.embedding, payload = excluded.payload",
                )
                .map_err(|e| op_error(format!("Failed to prepare upsert: {}", e), e))?;

            for record in &records {
                if record.vector.len() != dimension {
                    return Err(CortexError::VectorStore {
                        message: format!(
                            "Record '{}' has {} dimensions, collection '{}' expects {}",
                            record.id,
                            record.vector.len(),
                            collection,
                            dimension
                        ),
                        code: ErrorCode::VecOperationFailed,
                        source: None,
                    });
                }
                let payload = serde_json::to_string(&record.payload)?;
                stmt.execute(params![
                    collection,
                    record.id,
                    Self::vector_to_bytes(&record.vector),
                    payload
                ])
                .map_err(|e| op_error(format!("Failed to upsert '{}': {}", record.id, e), e))?;
            }
        }
        tx.commit()
            .map_err(|e| op_error(format!("Failed to commit upsert: {}", e), e))?;

        tracing::debug!("Upserted {} records into '{}'", records.len(), collection);
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
        filter: Option<Filter>,
    ) -> CortexResult<Vec<VectorSearchResult>> {
        let conn = self.lock()?;
        let (dimension, metric) = Self::require_collection(&conn, collection)?;
        if query_vector.len() != dimension {
            return Err(CortexError::VectorStore {
                message: format!(
                    "Query has {} dimensions, collection '{}' expects {}",
                    query_vector.len(),
                    collection,
                    dimension
                ),
                code: ErrorCode::VecOperationFailed,
                source: None,
            });
        }

        let mut results: Vec<VectorSearchResult> = Self::load(&conn, collection, filter.as_ref())?
            .into_iter()
            .map(|(id, vector, payload)| VectorSearchResult {
                score: Self::score(metric, query_vector, &vector),
                id,
                payload,
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        results.truncate(limit);

        tracing::debug!(
            "Search returned {} results from collection '{}'",
            results.len(),
            collection
        );
        Ok(results)
    }

    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> CortexResult<()> {
        let mut conn = self.lock()?;
        let ids: Vec<String> = Self::load(&conn, collection, Some(filter))?
            .into_iter()
            .map(|(id, _, _)| id)
            .collect();

        let tx = conn
            .transaction()
            .map_err(|e| op_error(format!("Failed to begin transaction: {}", e), e))?;
        {
            let mut stmt = tx
                .prepare("DELETE FROM vectors WHERE collection = ?1 AND id = ?2")
                .map_err(|e| op_error(format!("Failed to prepare delete: {}", e), e))?;
            for id in &ids {
                stmt.execute(params![collection, id])
                    .map_err(|e| op_error(format!("Failed to delete '{}': {}", id, e), e))?;
            }
        }
        tx.commit()
            .map_err(|e| op_error(format!("Failed to commit delete: {}", e), e))?;

        tracing::debug!("Deleted {} records from '{}'", ids.len(), collection);
        Ok(())
    }

    async fn count(&self, collection: &str, filter: Option<Filter>) -> CortexResult<u64> {
        let conn = self.lock()?;
        match filter {
            Some(f) => Ok(Self::load(&conn, collection, Some(&f))?.len() as u64),
            None => conn
                .query_row(
                    "SELECT COUNT(*) FROM vectors WHERE collection = ?1",
                    params![collection],
                    |row| row.get::<_, i64>(0),
                )
                .map(|n| n as u64)
                .map_err(|e| op_error(format!("Failed to count '{}': {}", collection, e), e)),
        }
    }
}
