use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SuggestError;
use crate::llm_manager::{ChatMessage, LLMProvider, ProviderSettings};

/// OpenAI-compatible chat-completion provider
pub struct OpenAIProvider {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIProvider {
    pub fn new(settings: ProviderSettings, client: Client) -> Self {
        Self {
            api_key: settings.api_key,
            model: settings.model,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Pull `choices[0].message.content` out of a raw reply body.
    fn content_from_body(body: &str) -> Option<String> {
        let parsed: ChatCompletionResponse = serde_json::from_str(body).ok()?;
        parsed
            .choices
            .into_iter()
            .next()?
            .message?
            .content
            .filter(|content| !content.trim().is_empty())
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_messages(&self, messages: &[ChatMessage]) -> Result<String, SuggestError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach {}: {}", self.endpoint(), e);
                SuggestError::upstream(format!("failed to reach model provider: {}", e), None)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            SuggestError::upstream(format!("failed to read provider response: {}", e), None)
        })?;
        debug!("Raw provider response ({}): {}", status, body);

        if !status.is_success() {
            error!("Provider returned {}: {}", status, body);
            let detail = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
            return Err(SuggestError::upstream(
                format!("model provider returned {}", status.as_u16()),
                Some(detail),
            ));
        }

        Self::content_from_body(&body).ok_or_else(|| SuggestError::upstream("empty content", None))
    }
}
