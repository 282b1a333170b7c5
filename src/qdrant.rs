//! Vector store backed by a Qdrant collection over its REST API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use unified_rag_core::models::{IndexPoint, SearchFilter};
use unified_rag_core::store::{ScoredPayload, VectorStore};

use crate::config::VectorConfig;
use crate::http::{build_client, ensure_success, join_url};

pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    score: f64,
    #[serde(default)]
    payload: Value,
}

impl QdrantStore {
    pub fn new(config: &VectorConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs, false)?,
            base_url: config.url.clone(),
            collection: config.collection.clone(),
        })
    }

    fn points_url(&self, suffix: &str) -> String {
        join_url(
            &self.base_url,
            &format!("/collections/{}/points{}", self.collection, suffix),
        )
    }
}

/// Qdrant filter clause for a [`SearchFilter`], or `None` when unrestricted.
fn filter_clause(filter: &SearchFilter) -> Option<Value> {
    filter.kind.map(|kind| {
        json!({
            "must": [{ "key": "kind", "match": { "value": kind.prefix() } }]
        })
    })
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, points: &[IndexPoint]) -> Result<()> {
        let url = self.points_url("?wait=true");
        let resp = self
            .client
            .put(&url)
            .json(&json!({ "points": points }))
            .send()
            .await
            .with_context(|| format!("Qdrant upsert to {} failed", url))?;
        ensure_success(resp, "Qdrant upsert").await?;
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredPayload>> {
        let mut body = json!({
            "vector": query_vec,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(clause) = filter_clause(filter) {
            body["filter"] = clause;
        }

        let url = self.points_url("/search");
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Qdrant search at {} failed", url))?;
        let resp = ensure_success(resp, "Qdrant search").await?;
        let parsed: SearchResponse = resp
            .json()
            .await
            .context("Failed to decode Qdrant search response")?;

        Ok(parsed
            .result
            .into_iter()
            .map(|hit| ScoredPayload {
                score: hit.score,
                payload: hit.payload,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unified_rag_core::models::SourceKind;

    #[test]
    fn test_filter_clause() {
        assert!(filter_clause(&SearchFilter::default()).is_none());
        let clause = filter_clause(&SearchFilter {
            kind: Some(SourceKind::Repository),
        })
        .unwrap();
        assert_eq!(clause["must"][0]["key"], "kind");
        assert_eq!(clause["must"][0]["match"]["value"], "git");
    }
}
