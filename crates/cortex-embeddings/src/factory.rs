//! Factory for creating embedding providers.

use std::sync::Arc;

use cortex_core::error::CortexResult;
use cortex_core::traits::{Embedder, EmbedderConfig, EmbedderProvider, EmbedderProviderConfig};

use crate::ollama::OllamaEmbedder;
use crate::openai::OpenAIEmbedder;

/// Factory for creating embedding providers.
pub struct EmbedderFactory;

impl EmbedderFactory {
    /// Create an embedder from the given configuration.
    pub fn create(
        provider: EmbedderProvider,
        config: EmbedderConfig,
    ) -> CortexResult<Arc<dyn Embedder>> {
        tracing::debug!(provider = %provider, model = %config.model, "Creating embedder");
        match provider {
            EmbedderProvider::OpenAI => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
            EmbedderProvider::Ollama => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        }
    }

    /// Create an embedder from a provider section of the config file.
    pub fn from_config(config: &EmbedderProviderConfig) -> CortexResult<Arc<dyn Embedder>> {
        Self::create(config.provider, config.config.clone())
    }

    /// Create an OpenAI embedder with default configuration.
    pub fn openai() -> CortexResult<Arc<dyn Embedder>> {
        Self::create(EmbedderProvider::OpenAI, EmbedderConfig::default())
    }

    /// Create an OpenAI embedder with a specific model.
    pub fn openai_with_model(
        model: impl Into<String>,
        dims: usize,
    ) -> CortexResult<Arc<dyn Embedder>> {
        let config = EmbedderConfig {
            model: model.into(),
            embedding_dims: dims,
            ..Default::default()
        };
        Self::create(EmbedderProvider::OpenAI, config)
    }

    /// Create an Ollama embedder with default configuration.
    pub fn ollama() -> CortexResult<Arc<dyn Embedder>> {
        Self::ollama_with_model("nomic-embed-text", 768)
    }

    /// Create an Ollama embedder with a specific model.
    pub fn ollama_with_model(
        model: impl Into<String>,
        dims: usize,
    ) -> CortexResult<Arc<dyn Embedder>> {
        let config = EmbedderConfig {
            model: model.into(),
            embedding_dims: dims,
            ..Default::default()
        };
        Self::create(EmbedderProvider::Ollama, config)
    }
}
