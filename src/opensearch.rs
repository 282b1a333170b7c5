//! Lexical store backed by an OpenSearch index.
//!
//! Writes go through `_bulk` with the natural key as the document `_id`, so
//! re-ingesting a source overwrites its documents in place. A bulk response
//! with `"errors": true` counts as a failed write even though the HTTP call
//! itself succeeded.
//!
//! Keys longer than OpenSearch's 512-byte `_id` limit (deep paths in long
//! repository URLs) are replaced by `sha256:<hex digest>` of the key. The
//! full key is always kept in the stored source.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use unified_rag_core::models::{CanonicalDocument, SearchFilter};
use unified_rag_core::store::{LexicalStore, ScoredPayload};

use crate::config::LexicalConfig;
use crate::http::{build_client, ensure_success, join_url, truncate_body};

pub struct OpenSearchStore {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Value,
}

impl OpenSearchStore {
    pub fn new(config: &LexicalConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs, config.accept_invalid_certs)?,
            base_url: config.url.clone(),
            index: config.index.clone(),
        })
    }
}

/// Largest `_id` OpenSearch accepts, in bytes.
const MAX_ID_BYTES: usize = 512;

/// Document `_id` for a natural key.
pub fn document_id(natural_key: &str) -> String {
    if natural_key.len() <= MAX_ID_BYTES {
        return natural_key.to_string();
    }
    format!("sha256:{:x}", Sha256::digest(natural_key.as_bytes()))
}

/// Newline-delimited `_bulk` body: one `index` action plus one source line per document.
pub fn bulk_body(index: &str, documents: &[CanonicalDocument]) -> Result<String> {
    let mut body = String::new();
    for doc in documents {
        let action = json!({ "index": { "_index": index, "_id": document_id(&doc.natural_key) } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

/// `match` query on `text`, wrapped in a `bool` with a `kind` term filter when requested.
pub fn search_body(query: &str, limit: usize, filter: &SearchFilter) -> Value {
    let matcher = json!({ "match": { "text": query } });
    let query = match filter.kind {
        Some(kind) => json!({
            "bool": {
                "must": [matcher],
                "filter": [{ "term": { "kind": kind.prefix() } }]
            }
        }),
        None => matcher,
    };
    json!({ "size": limit, "query": query })
}

/// First item-level error reason from a bulk response that reported errors.
fn first_item_error(items: &[Value]) -> Option<String> {
    items.iter().find_map(|item| {
        let action = item.as_object()?.values().next()?;
        let error = action.get("error")?;
        Some(
            error
                .get("reason")
                .and_then(|r| r.as_str())
                .map(String::from)
                .unwrap_or_else(|| error.to_string()),
        )
    })
}

#[async_trait]
impl LexicalStore for OpenSearchStore {
    async fn index(&self, documents: &[CanonicalDocument]) -> Result<()> {
        let url = join_url(&self.base_url, "/_bulk");
        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-ndjson")
            .body(bulk_body(&self.index, documents)?)
            .send()
            .await
            .with_context(|| format!("OpenSearch bulk request to {} failed", url))?;
        let resp = ensure_success(resp, "OpenSearch bulk index").await?;
        let parsed: BulkResponse = resp
            .json()
            .await
            .context("Failed to decode OpenSearch bulk response")?;

        if parsed.errors {
            let failed = parsed
                .items
                .iter()
                .filter(|item| {
                    item.as_object()
                        .and_then(|o| o.values().next())
                        .map_or(false, |a| a.get("error").is_some())
                })
                .count();
            bail!(
                "OpenSearch rejected {} of {} documents: {}",
                failed,
                documents.len(),
                truncate_body(&first_item_error(&parsed.items).unwrap_or_default())
            );
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredPayload>> {
        let url = join_url(&self.base_url, &format!("/{}/_search", self.index));
        let resp = self
            .client
            .post(&url)
            .json(&search_body(query, limit, filter))
            .send()
            .await
            .with_context(|| format!("OpenSearch search at {} failed", url))?;
        let resp = ensure_success(resp, "OpenSearch search").await?;
        let parsed: SearchResponse = resp
            .json()
            .await
            .context("Failed to decode OpenSearch search response")?;

        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| ScoredPayload {
                score: hit.score.unwrap_or(0.0),
                payload: hit.source,
            })
            .collect())
    }
}
