//! Factory for creating LLM providers.

use std::sync::Arc;

use cortex_core::error::CortexResult;
use cortex_core::traits::{Llm, LlmConfig, LlmProvider, LlmProviderConfig};

use crate::ollama::OllamaLlm;
use crate::openai::OpenAIProvider;

/// Factory for creating LLM providers.
pub struct LlmFactory;

impl LlmFactory {
    /// Create an LLM provider from the given configuration.
    pub fn create(provider: LlmProvider, config: LlmConfig) -> CortexResult<Arc<dyn Llm>> {
        tracing::debug!(provider = %provider, model = %config.model, "Creating LLM provider");
        match provider {
            LlmProvider::OpenAI => Ok(Arc::new(OpenAIProvider::new(config)?)),
            LlmProvider::Ollama => Ok(Arc::new(OllamaLlm::new(config)?)),
        }
    }

    /// Create an LLM provider from a provider section of the config file.
    pub fn from_config(config: &LlmProviderConfig) -> CortexResult<Arc<dyn Llm>> {
        Self::create(config.provider, config.config.clone())
    }

    /// Create an OpenAI LLM provider with default configuration.
    pub fn openai() -> CortexResult<Arc<dyn Llm>> {
        Self::create(LlmProvider::OpenAI, LlmConfig::default())
    }

    /// Create an OpenAI LLM provider with a specific model.
    pub fn openai_with_model(model: impl Into<String>) -> CortexResult<Arc<dyn Llm>> {
        let config = LlmConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(LlmProvider::OpenAI, config)
    }

    /// Create an Ollama LLM provider with a specific model.
    pub fn ollama_with_model(model: impl Into<String>) -> CortexResult<Arc<dyn Llm>> {
        let config = LlmConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(LlmProvider::Ollama, config)
    }
}
