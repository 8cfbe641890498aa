use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One text-in/text-out generation backend.
///
/// Implementations must treat an empty reply as an error; the retry
/// machinery short-circuits on the first non-empty text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn generate(&self, model: &str, system: &str, prompt: &str) -> anyhow::Result<String>;
}

// ── Request / Response types (OpenAI 兼容协议) ───────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ── Client ──────────────────────────────────────────────────────────

/// OpenAI 兼容后端（OpenAI 官方、DeepSeek、通义千问、Moonshot 等）。
pub struct OpenAiClient {
    client: Client,
    api_url: String,
    api_key: String,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(
        api_url: &str,
        api_key: &str,
        temperature: f64,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn generate(&self, model: &str, system: &str, prompt: &str) -> anyhow::Result<String> {
        let body = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(system.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(prompt.to_string()),
                },
            ],
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        };
        let url = format!("{}/chat/completions", self.api_url);

        debug!("POST {url} model={model}");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error (HTTP {status}): {text}");
        }

        let chat_resp: ChatResponse = resp.json().await?;
        let content = chat_resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        if content.trim().is_empty() {
            anyhow::bail!("OpenAI API 返回空响应");
        }
        Ok(content)
    }
}
