//! Factory for creating vector store providers.

use std::sync::Arc;

use cortex_core::error::{CortexError, CortexResult};
use cortex_core::traits::{VectorStore, VectorStoreConfig, VectorStoreProvider};

/// Factory for creating vector store providers.
pub struct VectorStoreFactory;

impl VectorStoreFactory {
    /// Create a vector store from the given configuration.
    pub fn create(config: &VectorStoreConfig) -> CortexResult<Arc<dyn VectorStore>> {
        tracing::debug!(provider = %config.provider, "Creating vector store");
        match config.provider {
            #[cfg(feature = "qdrant")]
            VectorStoreProvider::Qdrant => {
                let store = crate::qdrant::QdrantVectorStore::new(config)?;
                Ok(Arc::new(store))
            }

            #[cfg(feature = "sqlite")]
            VectorStoreProvider::Sqlite => {
                let path = match config.setting("path") {
                    Some(path) => std::path::PathBuf::from(path),
                    None => cortex_core::config::data_dir().join("vectors.db"),
                };
                let store = crate::sqlite::SqliteVectorStore::open(path)?;
                Ok(Arc::new(store))
            }

            #[allow(unreachable_patterns)]
            provider => Err(CortexError::UnsupportedProvider {
                provider: provider.to_string(),
            }),
        }
    }

    /// Create an in-memory SQLite vector store.
    ///
    /// Ideal for tests and development; nothing survives the process.
    #[cfg(feature = "sqlite")]
    pub fn sqlite_memory() -> CortexResult<Arc<dyn VectorStore>> {
        let store = crate::sqlite::SqliteVectorStore::open(":memory:")?;
        Ok(Arc::new(store))
    }

    /// Create a Qdrant vector store with custom URL.
    #[cfg(feature = "qdrant")]
    pub fn qdrant_with_url(url: &str) -> CortexResult<Arc<dyn VectorStore>> {
        let config = VectorStoreConfig {
            provider: VectorStoreProvider::Qdrant,
            config: serde_json::json!({ "url": url }),
            ..Default::default()
        };
        Self::create(&config)
    }
}
