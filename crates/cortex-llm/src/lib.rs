//! cortex-llm - LLM provider implementations for cortex.
//!
//! # Supported Providers
//!
//! - **OpenAI** (feature: `openai`) - GPT-4o, GPT-4o-mini, and any
//!   OpenAI-compatible endpoint via `base_url`
//! - **Ollama** (feature: `ollama`) - Local models via Ollama
//!
//! # Example
//!
//! ```ignore
//! use cortex_llm::LlmFactory;
//!
//! let llm = LlmFactory::openai_with_model("gpt-4o-mini")?;
//! let llm = LlmFactory::ollama_with_model("llama3.1")?;
//! ```

mod factory;
mod ollama;
mod openai;

pub use factory::LlmFactory;
pub use ollama::OllamaLlm;
pub use openai::OpenAIProvider;

// Re-export core types for convenience
pub use cortex_core::traits::{
    GenerationOptions, Llm, LlmConfig, LlmProvider, LlmResponse, ResponseFormat,
};
