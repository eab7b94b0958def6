use crate::config::{Config, coalesce};
use crate::error::SuggestError;
use crate::providers::openai::OpenAIProvider;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One turn of a chat-completion conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Trait representing an LLM provider.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Name of the provider.
    fn name(&self) -> &str;

    /// Send a conversation to the provider and return the reply text.
    async fn send_messages(&self, messages: &[ChatMessage]) -> Result<String, SuggestError>;

    /// Model name of the provider.
    fn model_name(&self) -> &str {
        "Unknown"
    }
}

/// Provider settings after request values have been layered over configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Resolves per-request provider settings and hands out providers that share
/// one HTTP client.
pub struct LLMManager {
    config: Arc<Config>,
    client: reqwest::Client,
}

impl LLMManager {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Request values win over configured defaults, which win over fallbacks.
    pub fn resolve(
        &self,
        api_key: Option<&str>,
        model: Option<&str>,
    ) -> Result<ProviderSettings, SuggestError> {
        let provider = &self.config.provider;
        let api_key = coalesce([api_key, provider.api_key.as_deref()])
            .ok_or_else(|| SuggestError::validation("missing API key"))?;
        let model = coalesce([model]).unwrap_or_else(|| self.config.default_model());

        let settings = ProviderSettings {
            api_key,
            model,
            base_url: self.config.base_url(),
            temperature: provider.temperature,
            max_tokens: provider.max_tokens,
        };
        debug!("Resolved provider {} at {}", settings.model, settings.base_url);
        Ok(settings)
    }

    /// Build the provider for already-resolved settings.
    pub fn provider(&self, settings: ProviderSettings) -> OpenAIProvider {
        OpenAIProvider::new(settings, self.client.clone())
    }
}
