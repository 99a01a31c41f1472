//! Ollama LLM provider implementation.

use async_trait::async_trait;

use cortex_core::error::{CortexError, CortexResult};
use cortex_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat};
use cortex_core::types::{Message, MessageRole};

#[cfg(feature = "ollama")]
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage, MessageRole as OllamaRole},
    generation::options::GenerationOptions as OllamaOptions,
    Ollama,
};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama LLM provider.
pub struct OllamaLlm {
    #[cfg(feature = "ollama")]
    client: Ollama,
    config: LlmConfig,
}

/// Split an Ollama base URL into host and port.
fn parse_endpoint(base_url: &str) -> CortexResult<(String, u16)> {
    let url = url::Url::parse(base_url)
        .map_err(|e| CortexError::Configuration(format!("Invalid Ollama URL: {}", e)))?;
    let host = format!(
        "{}://{}",
        url.scheme(),
        url.host_str().unwrap_or("localhost")
    );
    Ok((host, url.port().unwrap_or(11434)))
}

impl OllamaLlm {
    /// Create a new Ollama LLM provider.
    pub fn new(config: LlmConfig) -> CortexResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let (host, port) = parse_endpoint(&base_url)?;

        #[cfg(feature = "ollama")]
        let client = Ollama::new(host, port);
        #[cfg(not(feature = "ollama"))]
        let _ = (host, port);

        let mut config = config;
        if config.model.is_empty() {
            config.model = "llama3.1".to_string();
        }

        Ok(Self {
            #[cfg(feature = "ollama")]
            client,
            config,
        })
    }

    #[cfg(feature = "ollama")]
    fn message_to_ollama(msg: &Message) -> ChatMessage {
        let role = match msg.role {
            MessageRole::System => OllamaRole::System,
            MessageRole::User => OllamaRole::User,
            MessageRole::Assistant => OllamaRole::Assistant,
        };
        ChatMessage::new(role, msg.content.clone())
    }
}

#[async_trait]
impl Llm for OllamaLlm {
    #[cfg(feature = "ollama")]
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> CortexResult<LlmResponse> {
        let options = options.unwrap_or_default();

        let mut ollama_messages: Vec<ChatMessage> =
            messages.iter().map(Self::message_to_ollama).collect();

        if options.response_format == Some(ResponseFormat::Json) {
            if let Some(last) = ollama_messages.last_mut() {
                last.content.push_str("\n\nPlease respond with valid JSON only.");
            }
        }

        let sampling = OllamaOptions::default()
            .temperature(options.temperature.unwrap_or(self.config.temperature))
            .top_p(options.top_p.unwrap_or(self.config.top_p));
        let request = ChatMessageRequest::new(self.config.model.clone(), ollama_messages)
            .options(sampling);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| CortexError::llm(format!("Ollama API error: {}", e)))?;

        let content = response.message.map(|m| m.content);
        tracing::debug!(model = %self.config.model, "Ollama completion received");

        Ok(LlmResponse {
            content,
            usage: None,
        })
    }

    #[cfg(not(feature = "ollama"))]
    async fn generate(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> CortexResult<LlmResponse> {
        Err(CortexError::Configuration(
            "Ollama feature not enabled. Enable the 'ollama' feature.".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    /// Ollama is prompted for JSON rather than constrained.
    fn supports_json_mode(&self) -> bool {
        true
    }
}
