//! Wiki connector (Confluence content API).
//!
//! Pages through `GET <base_url>/rest/api/content` for one space with
//! basic auth:
//!
//! ```text
//! ?spaceKey=ENG&limit=50&start=<offset>&expand=body.storage
//! ```
//!
//! `start` advances by the number of results each page returned and the
//! pass ends at the first empty page. Page bodies are storage-format markup
//! and are kept verbatim. A failed page request ends the pass with
//! [`ConnectorError::SourceUnavailable`]; nothing is retried.

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use unified_rag_core::models::CanonicalDocument;

use crate::config::WikiConnectorConfig;
use crate::connector::{ConnectorError, DocumentStream};
use crate::http::{build_client, join_url, truncate_body};

pub struct WikiConnector {
    name: String,
    config: WikiConnectorConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ContentPage {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WikiPage {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: Option<PageBody>,
}

#[derive(Debug, Deserialize)]
struct PageBody {
    #[serde(default)]
    storage: Option<Storage>,
}

#[derive(Debug, Deserialize)]
struct Storage {
    #[serde(default)]
    value: String,
}

impl WikiPage {
    fn into_document(self) -> CanonicalDocument {
        let body = self
            .body
            .and_then(|b| b.storage)
            .map(|s| s.value)
            .unwrap_or_default();
        CanonicalDocument::wiki_page(&self.id, &self.title, &body)
    }
}

impl WikiConnector {
    pub fn new(name: &str, config: &WikiConnectorConfig) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            config: config.clone(),
            client: build_client(config.timeout_secs, false)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when both a user and a token are configured.
    pub fn has_credentials(&self) -> bool {
        self.config.user.is_some() && self.config.token.is_some()
    }

    pub fn target(&self) -> String {
        format!("{} (space {})", self.config.base_url, self.config.space_key)
    }

    pub fn fetch(&self) -> DocumentStream<'_> {
        stream::try_unfold(0usize, move |start| async move {
            let (returned, docs) = self.fetch_page(start).await?;
            if returned == 0 {
                info!(connector = %self.name, documents = start, "wiki pass complete");
                return Ok(None);
            }
            Ok::<_, ConnectorError>(Some((docs, start + returned)))
        })
        .map_ok(|docs| stream::iter(docs.into_iter().map(Ok::<_, ConnectorError>)))
        .try_flatten()
        .boxed()
    }

    /// Fetch one page. Returns the raw result count (which drives the
    /// cursor) and the documents that decoded.
    async fn fetch_page(&self, start: usize) -> Result<(usize, Vec<CanonicalDocument>), ConnectorError> {
        let url = join_url(&self.config.base_url, "/rest/api/content");
        let limit = self.config.page_size.to_string();
        let start_param = start.to_string();

        let mut req = self.client.get(&url).query(&[
            ("spaceKey", self.config.space_key.as_str()),
            ("limit", limit.as_str()),
            ("start", start_param.as_str()),
            ("expand", "body.storage"),
        ]);
        if let Some(user) = &self.config.user {
            req = req.basic_auth(user, self.config.token.as_ref());
        }

        let resp = req.send().await.map_err(|e| self.unavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(self.unavailable(format!(
                "GET {} (start={}) returned HTTP {}: {}",
                url,
                start,
                status,
                truncate_body(&body)
            )));
        }
        let page: ContentPage = resp
            .json()
            .await
            .map_err(|e| self.unavailable(format!("undecodable page at start={}: {}", start, e)))?;

        let returned = page.results.len();
        let docs: Vec<CanonicalDocument> = page
            .results
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<WikiPage>(raw) {
                Ok(p) => Some(p.into_document()),
                Err(e) => {
                    debug!(connector = %self.name, error = %e, "skipping undecodable wiki page");
                    None
                }
            })
            .collect();
        debug!(connector = %self.name, start, returned, "fetched wiki page");
        Ok((returned, docs))
    }

    fn unavailable(&self, message: String) -> ConnectorError {
        ConnectorError::SourceUnavailable {
            connector: format!("wiki:{}", self.name),
            message,
        }
    }
}
