//! Issue-tracker connector (Jira search API).
//!
//! Pages through `GET <base_url>/rest/api/2/search` with a JQL query and
//! basic auth. `startAt` advances by the number of issues each page
//! returned; the pass ends at the first empty page or after `max_pages`
//! pages, whichever comes first. The page cap is a safety bound: queries
//! matching more than `max_pages * page_size` issues are truncated.

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use unified_rag_core::models::CanonicalDocument;

use crate::config::IssuesConnectorConfig;
use crate::connector::{ConnectorError, DocumentStream};
use crate::http::{build_client, join_url, truncate_body};

pub struct IssueConnector {
    name: String,
    config: IssuesConnectorConfig,
    jql: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    issues: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    key: String,
    #[serde(default)]
    fields: IssueFields,
}

#[derive(Debug, Default, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Value,
}

impl Issue {
    fn into_document(self) -> CanonicalDocument {
        let summary = self.fields.summary.unwrap_or_default();
        let description = description_text(&self.fields.description);
        CanonicalDocument::issue(&self.key, &summary, description.as_deref())
    }
}

/// Plain-string descriptions are used as-is; structured (rich-text)
/// descriptions are kept as their JSON text.
fn description_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Cursor over the search results: next `startAt` and pages fetched so far.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    start_at: usize,
    pages: usize,
}

impl IssueConnector {
    pub fn new(name: &str, config: &IssuesConnectorConfig) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            jql: config.effective_jql(),
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
        format!("{} ({})", self.config.base_url, self.jql)
    }

    pub fn fetch(&self) -> DocumentStream<'_> {
        let start = Cursor {
            start_at: 0,
            pages: 0,
        };
        stream::try_unfold(start, move |cursor| async move {
            if cursor.pages >= self.config.max_pages {
                info!(
                    connector = %self.name,
                    max_pages = self.config.max_pages,
                    "issue page cap reached, stopping"
                );
                return Ok(None);
            }
            let (returned, docs) = self.fetch_page(cursor.start_at).await?;
            if returned == 0 {
                info!(connector = %self.name, documents = cursor.start_at, "issue pass complete");
                return Ok(None);
            }
            let next = Cursor {
                start_at: cursor.start_at + returned,
                pages: cursor.pages + 1,
            };
            Ok::<_, ConnectorError>(Some((docs, next)))
        })
        .map_ok(|docs| stream::iter(docs.into_iter().map(Ok::<_, ConnectorError>)))
        .try_flatten()
        .boxed()
    }

    async fn fetch_page(&self, start_at: usize) -> Result<(usize, Vec<CanonicalDocument>), ConnectorError> {
        let url = join_url(&self.config.base_url, "/rest/api/2/search");
        let start_param = start_at.to_string();
        let max_results = self.config.page_size.to_string();

        let mut req = self.client.get(&url).query(&[
            ("jql", self.jql.as_str()),
            ("startAt", start_param.as_str()),
            ("maxResults", max_results.as_str()),
        ]);
        if let Some(user) = &self.config.user {
            req = req.basic_auth(user, self.config.token.as_ref());
        }

        let resp = req.send().await.map_err(|e| self.unavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(self.unavailable(format!(
                "GET {} (startAt={}) returned HTTP {}: {}",
                url,
                start_at,
                status,
                truncate_body(&body)
            )));
        }
        let page: SearchPage = resp.json().await.map_err(|e| {
            self.unavailable(format!("undecodable page at startAt={}: {}", start_at, e))
        })?;

        let returned = page.issues.len();
        let docs: Vec<CanonicalDocument> = page
            .issues
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Issue>(raw) {
                Ok(issue) => Some(issue.into_document()),
                Err(e) => {
                    debug!(connector = %self.name, error = %e, "skipping undecodable issue");
                    None
                }
            })
            .collect();
        debug!(connector = %self.name, start_at, returned, "fetched issue page");
        Ok((returned, docs))
    }

    fn unavailable(&self, message: String) -> ConnectorError {
        ConnectorError::SourceUnavailable {
            connector: format!("issues:{}", self.name),
            message,
        }
    }
}
