use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ChatBackend;

// ── Request / Response types (generateContent REST 协议) ─────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: ContentPayload,
    contents: Vec<ContentPayload>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct ContentPayload {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────────

/// Google Gemini 后端（主后端）。
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    temperature: f64,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        temperature: f64,
        max_output_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            temperature,
            max_output_tokens,
        }
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn generate(&self, model: &str, system: &str, prompt: &str) -> anyhow::Result<String> {
        let body = GenerateRequest {
            system_instruction: ContentPayload {
                parts: vec![TextPart {
                    text: system.to_string(),
                }],
            },
            contents: vec![ContentPayload {
                parts: vec![TextPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        debug!("POST {url}");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            // 状态码保留在错误文本里，上层据此识别 429 限流
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error (HTTP {status}): {text}");
        }

        let gen_resp: GenerateResponse = resp.json().await?;
        let text: String = gen_resp
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            anyhow::bail!("Gemini 返回空响应");
        }
        Ok(text)
    }
}
