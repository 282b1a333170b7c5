//! Client for an OpenAI-compatible `/v1/completions` endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use unified_rag_core::generation::{GenerationError, Generator};

use crate::config::GenerationConfig;
use crate::http::{join_url, truncate_body};

/// Completion-endpoint generator. One request per call, never retried.
pub struct CompletionClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    text: Option<String>,
}

impl CompletionClient {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            client: crate::http::build_client(config.timeout_secs, false)?,
            endpoint: join_url(&config.url, "/v1/completions"),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout,
        })
    }

    fn map_transport(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Generator for CompletionClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let text = resp.text().await.map_err(|e| self.map_transport(e))?;
        parse_completion(&text)
    }
}

/// Extract `choices[0].text` from a completion response body.
fn parse_completion(body: &str) -> Result<String, GenerationError> {
    let parsed: CompletionResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.text)
        .ok_or_else(|| GenerationError::Malformed("response has no choices[0].text".to_string()))
}
