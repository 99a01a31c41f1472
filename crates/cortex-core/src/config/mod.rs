//! Configuration system for cortex.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{CortexError, CortexResult};
use crate::ingestion::ChunkingConfig;
use crate::retrieval::RetrievalConfig;
use crate::retry::RetryPolicy;
use crate::traits::{
    EmbedderProviderConfig, GraphStoreConfig, GraphStoreProvider, LlmProviderConfig,
    VectorStoreConfig, VectorStoreProvider,
};

/// Default data directory (`~/.cortex`).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".cortex"))
        .unwrap_or_else(|| PathBuf::from(".cortex"))
}

/// Tuning for the ingest and ask flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    /// Retry policy for store operations.
    pub retry: RetryPolicy,
    /// Chunks extracted at the same time during one ingestion.
    pub max_concurrent_extractions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            retry: RetryPolicy::default(),
            max_concurrent_extractions: 4,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), &'static str> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        if self.max_concurrent_extractions == 0 {
            return Err("max_concurrent_extractions must be at least 1");
        }
        Ok(())
    }
}

/// Main cortex configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CortexConfig {
    /// LLM configuration.
    pub llm: LlmProviderConfig,
    /// Embedder configuration.
    pub embedder: EmbedderProviderConfig,
    /// Vector store configuration.
    pub vector_store: VectorStoreConfig,
    /// Graph store configuration.
    pub graph_store: GraphStoreConfig,
    /// Pipeline tuning.
    pub pipeline: PipelineConfig,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> CortexResult<Option<T>> {
    match env_var(name) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            CortexError::Configuration(format!("{} has an invalid value: {}", name, raw))
        }),
        None => Ok(None),
    }
}

impl CortexConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> CortexResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| CortexError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| CortexError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| CortexError::Configuration(e.to_string())),
            _ => Err(CortexError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> CortexResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `CORTEX_*` (and `OPENAI_API_KEY`) overrides to this configuration.
    pub fn with_env_overrides(mut self) -> CortexResult<Self> {
        // LLM
        if let Some(provider) = env_parse("CORTEX_LLM_PROVIDER")? {
            self.llm.provider = provider;
        }
        if let Some(model) = env_var("CORTEX_LLM_MODEL") {
            self.llm.config.model = model;
        }
        if let Some(url) = env_var("CORTEX_LLM_BASE_URL") {
            self.llm.config.base_url = Some(url);
        }

        // Embedder
        if let Some(provider) = env_parse("CORTEX_EMBEDDER_PROVIDER")? {
            self.embedder.provider = provider;
        }
        if let Some(model) = env_var("CORTEX_EMBEDDER_MODEL") {
            self.embedder.config.model = model;
        }
        if let Some(dims) = env_parse::<usize>("CORTEX_EMBEDDING_DIMS")? {
            self.embedder.config.embedding_dims = dims;
            self.vector_store.embedding_model_dims = dims;
        }
        if let Some(url) = env_var("CORTEX_EMBEDDER_BASE_URL") {
            self.embedder.config.base_url = Some(url);
        }

        if let Some(api_key) = env_var("OPENAI_API_KEY") {
            self.llm.config.api_key.get_or_insert_with(|| api_key.clone());
            self.embedder.config.api_key.get_or_insert(api_key);
        }

        // Vector store
        if let Some(provider) = env_parse::<VectorStoreProvider>("CORTEX_VECTOR_STORE_PROVIDER")? {
            self.vector_store.provider = provider;
        }
        if let Some(prefix) = env_var("CORTEX_COLLECTION_PREFIX") {
            self.vector_store.collection_prefix = prefix;
        }
        for (var, key) in [
            ("CORTEX_VECTOR_STORE_URL", "url"),
            ("CORTEX_VECTOR_STORE_API_KEY", "api_key"),
            ("CORTEX_VECTOR_STORE_PATH", "path"),
        ] {
            if let Some(value) = env_var(var) {
                if !self.vector_store.config.is_object() {
                    self.vector_store.config = serde_json::json!({});
                }
                if let Some(map) = self.vector_store.config.as_object_mut() {
                    map.insert(key.to_string(), serde_json::Value::String(value));
                }
            }
        }

        // Graph store
        if let Some(provider) = env_parse::<GraphStoreProvider>("CORTEX_GRAPH_STORE_PROVIDER")? {
            self.graph_store.provider = provider;
        }
        if let Some(url) = env_var("CORTEX_GRAPH_STORE_URL") {
            self.graph_store.url = url;
        }
        if let Some(user) = env_var("CORTEX_GRAPH_STORE_USERNAME") {
            self.graph_store.username = Some(user);
        }
        if let Some(password) = env_var("CORTEX_GRAPH_STORE_PASSWORD") {
            self.graph_store.password = Some(password);
        }

        // Retrieval
        let retrieval = &mut self.pipeline.retrieval;
        if let Some(limit) = env_parse("CORTEX_RETRIEVAL_LIMIT")? {
            retrieval.limit = limit;
        }
        if let Some(low) = env_parse("CORTEX_LOW_THRESHOLD")? {
            retrieval.low_threshold = low;
        }
        if let Some(high) = env_parse("CORTEX_HIGH_THRESHOLD")? {
            retrieval.high_threshold = high;
        }
        if let Some(hops) = env_parse("CORTEX_HOPS")? {
            retrieval.hops = hops;
        }

        Ok(self)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> CortexResult<()> {
        self.pipeline
            .validate()
            .map_err(|msg| CortexError::Configuration(msg.to_string()))?;
        if self.embedder.config.embedding_dims != self.vector_store.embedding_model_dims {
            return Err(CortexError::Configuration(format!(
                "embedder produces {} dimensions but the vector store expects {}",
                self.embedder.config.embedding_dims, self.vector_store.embedding_model_dims
            )));
        }
        Ok(())
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> CortexConfigBuilder {
        CortexConfigBuilder::default()
    }
}

/// Builder for CortexConfig.
#[derive(Default)]
pub struct CortexConfigBuilder {
    config: CortexConfig,
}

impl CortexConfigBuilder {
    /// Set LLM configuration.
    pub fn llm(mut self, config: LlmProviderConfig) -> Self {
        self.config.llm = config;
        self
    }

    /// Set embedder configuration.
    pub fn embedder(mut self, config: EmbedderProviderConfig) -> Self {
        self.config.embedder = config;
        self
    }

    /// Set vector store configuration.
    pub fn vector_store(mut self, config: VectorStoreConfig) -> Self {
        self.config.vector_store = config;
        self
    }

    /// Set graph store configuration.
    pub fn graph_store(mut self, config: GraphStoreConfig) -> Self {
        self.config.graph_store = config;
        self
    }

    pub fn chunking(mut self, config: ChunkingConfig) -> Self {
        self.config.pipeline.chunking = config;
        self
    }

    pub fn retrieval(mut self, config: RetrievalConfig) -> Self {
        self.config.pipeline.retrieval = config;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.pipeline.retry = policy;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> CortexConfig {
        self.config
    }
}
