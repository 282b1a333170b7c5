//! Embedding backends.
//!
//! | Provider | Behaviour |
//! |----------|-----------|
//! | `placeholder` | all-zero vectors of `embedding.dims` ([`ZeroEmbedder`]) |
//! | `openai` | OpenAI-compatible `POST <url>/v1/embeddings` |
//!
//! The OpenAI-compatible client sends `OPENAI_API_KEY` as a bearer token
//! when it is set, so self-hosted endpoints without auth work unchanged.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use unified_rag_core::embedding::{Embedder, ZeroEmbedder};

use crate::config::EmbeddingConfig;
use crate::http::{build_client, ensure_success, join_url};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Create the embedder selected by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "placeholder" => Ok(Arc::new(ZeroEmbedder::new(config.dims))),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Client for an OpenAI-compatible embeddings endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dims: usize,
    api_key: Option<String>,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let base = config.url.as_deref().unwrap_or(DEFAULT_OPENAI_URL);

        Ok(Self {
            client: build_client(config.timeout_secs, false)?,
            endpoint: join_url(base, "/v1/embeddings"),
            model,
            dims: config.dims,
            api_key: std::env::var("OPENAI_API_KEY").ok(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("Embedding request to {} failed", self.endpoint))?;
        let resp = ensure_success(resp, "Embedding request").await?;
        let json: serde_json::Value = resp.json().await?;

        let vectors = parse_openai_response(&json)?;
        if vectors.len() != texts.len() {
            bail!(
                "Embedding endpoint returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid embedding response: missing data array"))?;

    data.iter()
        .map(|item| {
            let embedding = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| anyhow!("Invalid embedding response: missing embedding"))?;
            Ok(embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_response() {
        let json = serde_json::json!({
            "data": [
                { "embedding": [0.1, 0.2], "index": 0 },
                { "embedding": [0.3, 0.4], "index": 1 }
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert!((vectors[1][0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_parse_openai_response_missing_data() {
        assert!(parse_openai_response(&serde_json::json!({ "error": "nope" })).is_err());
    }

    #[tokio::test]
    async fn test_placeholder_provider_dims() {
        let config = EmbeddingConfig {
            dims: 8,
            ..Default::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), "placeholder");
        let vectors = embedder.embed(&["x".to_string()]).await.unwrap();
        assert_eq!(vectors[0].len(), 8);
    }

    #[test]
    fn test_openai_provider_requires_model() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            ..Default::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
