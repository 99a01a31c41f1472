//! OpenAI LLM provider implementation.

use async_trait::async_trait;

use cortex_core::error::{CortexError, CortexResult};
use cortex_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, TokenUsage};
use cortex_core::types::{Message, MessageRole};

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
        ResponseFormat as OpenAIResponseFormat,
    },
    Client,
};

/// OpenAI chat completion provider.
pub struct OpenAIProvider {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: LlmConfig,
}

impl OpenAIProvider {
    /// Create a new OpenAI LLM provider.
    pub fn new(config: LlmConfig) -> CortexResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                CortexError::Configuration("OpenAI API key not found. Set OPENAI_API_KEY environment variable or provide api_key in config.".to_string())
            })?;

        #[cfg(feature = "openai")]
        let openai_config = if let Some(ref base_url) = config.base_url {
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(base_url)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };
        #[cfg(not(feature = "openai"))]
        let _ = api_key;

        #[cfg(feature = "openai")]
        let client = Client::with_config(openai_config);

        let mut config = config;
        if config.model.is_empty() {
            config.model = "gpt-4o-mini".to_string();
        }

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    /// Reasoning models reject sampling parameters.
    fn is_reasoning_model(&self) -> bool {
        let model_lower = self.config.model.to_lowercase();
        ["o1", "o3", "o4"]
            .iter()
            .any(|m| model_lower.starts_with(m))
    }

    #[cfg(feature = "openai")]
    fn message_to_openai(msg: &Message) -> ChatCompletionRequestMessage {
        match msg.role {
            MessageRole::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            MessageRole::User => {
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            MessageRole::Assistant => {
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    ..Default::default()
                })
            }
        }
    }
}

/// Classify an OpenAI client error.
#[cfg(feature = "openai")]
fn map_openai_error(err: OpenAIError) -> CortexError {
    match err {
        OpenAIError::Reqwest(e) => CortexError::api(format!("OpenAI request failed: {}", e)),
        OpenAIError::ApiError(api) if api.code.as_deref() == Some("rate_limit_exceeded") => {
            CortexError::rate_limit(api.message)
        }
        other => CortexError::llm(format!("OpenAI API error: {}", other)),
    }
}

#[async_trait]
impl Llm for OpenAIProvider {
    #[cfg(feature = "openai")]
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> CortexResult<LlmResponse> {
        let chat_messages: Vec<ChatCompletionRequestMessage> =
            messages.iter().map(Self::message_to_openai).collect();

        let options = options.unwrap_or_default();

        let mut request = CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages: chat_messages,
            ..Default::default()
        };

        if !self.is_reasoning_model() {
            request.temperature = Some(options.temperature.unwrap_or(self.config.temperature));
            request.top_p = Some(options.top_p.unwrap_or(self.config.top_p));
            request.max_tokens = Some(options.max_tokens.unwrap_or(self.config.max_tokens));
        }
        if options.response_format == Some(cortex_core::traits::ResponseFormat::Json) {
            request.response_format = Some(OpenAIResponseFormat::JsonObject);
        }

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| CortexError::llm("No response choices returned"))?;

        let content = choice.message.content.clone();

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        tracing::debug!(model = %self.config.model, "OpenAI completion received");
        Ok(LlmResponse { content, usage })
    }

    #[cfg(not(feature = "openai"))]
    async fn generate(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> CortexResult<LlmResponse> {
        Err(CortexError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn supports_json_mode(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model: &str) -> LlmConfig {
        LlmConfig {
            model: model.to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_with_explicit_key() {
        let llm = OpenAIProvider::new(config("gpt-4o-mini")).unwrap();
        assert_eq!(llm.model_name(), "gpt-4o-mini");
        assert!(llm.supports_json_mode());
    }

    #[test]
    fn test_empty_model_falls_back() {
        let llm = OpenAIProvider::new(config("")).unwrap();
        assert_eq!(llm.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn test_reasoning_model_detection() {
        assert!(OpenAIProvider::new(config("o3-mini")).unwrap().is_reasoning_model());
        assert!(!OpenAIProvider::new(config("gpt-4o")).unwrap().is_reasoning_model());
    }
}
