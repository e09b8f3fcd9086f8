//! Chat completion client used by the reviewer.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ToolError;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
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

/// Abstraction over the completion API so reviews can run against a fake.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32)
    -> Result<String, ToolError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            endpoint: OPENAI_CHAT_URL.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, messages: &[ChatMessage], temperature: f32) -> anyhow::Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature,
            messages,
        };
        let resp: ChatResponse = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send chat completion request")?
            .error_for_status()
            .context("Chat completion API returned error status")?
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        Ok(resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, ToolError> {
        tracing::info!(model = %self.model, messages = messages.len(), "Calling chat completion API");
        let content = self
            .send(messages, temperature)
            .await
            .map_err(|e| ToolError::Model(format!("{:#}", e)))?;
        tracing::info!(chars = content.len(), "Chat completion received");
        Ok(content)
    }
}
