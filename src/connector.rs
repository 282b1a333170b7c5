//! Connector variants and their selection.
//!
//! A connector turns one external source into a finite, restartable stream
//! of [`CanonicalDocument`]s. The three variants share no behaviour beyond
//! that contract, so they are a closed enum rather than a trait hierarchy:
//!
//! | Variant | Source | Cursor |
//! |---------|--------|--------|
//! | [`Connector::Wiki`] | wiki content API, one space | `start` offset |
//! | [`Connector::IssueTracker`] | issue search API, one query | `startAt` offset, page cap |
//! | [`Connector::Repository`] | one git repository, one branch | shallow checkout + file walk |
//!
//! # Selectors
//!
//! `all`, a connector type (`wiki`, `issues`, `repository`) or a single
//! named instance (`wiki:eng`). Repository instances expand to one
//! connector per configured URL, all sharing the instance label; append
//! `@<url>` (`repository:platform@https://scm.local/a.git`) to pick one.

use anyhow::{bail, Result};
use futures::stream::BoxStream;
use thiserror::Error;
use unified_rag_core::models::{CanonicalDocument, SourceKind};

use crate::config::Config;
use crate::connector_git::RepositoryConnector;
use crate::connector_issues::IssueConnector;
use crate::connector_wiki::WikiConnector;

/// Failures that end a connector invocation.
///
/// Files that cannot be decoded are not errors; they are skipped.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// A paginated fetch against the source failed.
    #[error("{connector}: source unavailable: {message}")]
    SourceUnavailable { connector: String, message: String },
    /// The repository could not be checked out.
    #[error("{connector}: checkout of {url} failed: {message}")]
    Checkout {
        connector: String,
        url: String,
        message: String,
    },
}

/// Documents produced by one connector invocation.
pub type DocumentStream<'a> = BoxStream<'a, Result<CanonicalDocument, ConnectorError>>;

/// One configured source instance, ready to fetch.
pub enum Connector {
    Wiki(WikiConnector),
    IssueTracker(IssueConnector),
    Repository(RepositoryConnector),
}

impl Connector {
    /// `type:name` label used in selectors and summaries.
    pub fn label(&self) -> String {
        match self {
            Connector::Wiki(c) => format!("wiki:{}", c.name()),
            Connector::IssueTracker(c) => format!("issues:{}", c.name()),
            Connector::Repository(c) => format!("repository:{}", c.name()),
        }
    }

    /// Where the connector reads from.
    pub fn target(&self) -> String {
        match self {
            Connector::Wiki(c) => c.target(),
            Connector::IssueTracker(c) => c.target(),
            Connector::Repository(c) => c.target(),
        }
    }

    /// Repositories rely on ambient git credentials and always report `true`.
    pub fn has_credentials(&self) -> bool {
        match self {
            Connector::Wiki(c) => c.has_credentials(),
            Connector::IssueTracker(c) => c.has_credentials(),
            Connector::Repository(_) => true,
        }
    }

    fn repository_url(&self) -> Option<&str> {
        match self {
            Connector::Repository(c) => Some(c.url()),
            _ => None,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Connector::Wiki(_) => SourceKind::Wiki,
            Connector::IssueTracker(_) => SourceKind::IssueTracker,
            Connector::Repository(_) => SourceKind::Repository,
        }
    }

    /// Start a fresh pass over the source.
    ///
    /// Every call starts from the beginning; nothing is remembered between
    /// invocations.
    pub fn fetch(&self) -> DocumentStream<'_> {
        match self {
            Connector::Wiki(c) => c.fetch(),
            Connector::IssueTracker(c) => c.fetch(),
            Connector::Repository(c) => c.fetch(),
        }
    }
}

/// Type names accepted in selectors, with the config table each maps to.
const CONNECTOR_TYPES: [&str; 3] = ["wiki", "issues", "repository"];

/// Build every configured connector, in type then name order.
pub fn connectors_from_config(config: &Config) -> Result<Vec<Connector>> {
    let mut connectors = Vec::new();
    for (name, wiki) in &config.connectors.wiki {
        connectors.push(Connector::Wiki(WikiConnector::new(name, wiki)?));
    }
    for (name, issues) in &config.connectors.issues {
        connectors.push(Connector::IssueTracker(IssueConnector::new(name, issues)?));
    }
    for (name, repo) in &config.connectors.repository {
        for url in &repo.urls {
            connectors.push(Connector::Repository(RepositoryConnector::new(
                name, url, repo,
            )?));
        }
    }
    Ok(connectors)
}

/// Build the connectors matched by `selector`.
pub fn select_connectors(config: &Config, selector: &str) -> Result<Vec<Connector>> {
    let selector = selector.trim();
    let (kind, name) = match selector.split_once(':') {
        Some((kind, name)) => (kind, Some(name)),
        None => (selector, None),
    };
    let (name, url) = match name.and_then(|n| n.split_once('@')) {
        Some((name, url)) => (Some(name), Some(url)),
        None => (name, None),
    };

    if kind != "all" && !CONNECTOR_TYPES.contains(&kind) {
        bail!(
            "Unknown connector selector '{}'. Use all, {}, or <type>:<name>.",
            selector,
            CONNECTOR_TYPES.join(", ")
        );
    }
    if kind == "all" && name.is_some() {
        bail!("Selector 'all' does not take a name");
    }
    if url.is_some() && kind != "repository" {
        bail!("Only repository selectors take an @<url> suffix");
    }

    let selected: Vec<Connector> = connectors_from_config(config)?
        .into_iter()
        .filter(|c| {
            let label = c.label();
            let (c_kind, c_name) = label.split_once(':').unwrap_or((label.as_str(), ""));
            (kind == "all" || kind == c_kind)
                && name.map_or(true, |n| n == c_name)
                && url.map_or(true, |u| c.repository_url() == Some(u))
        })
        .collect();

    if selected.is_empty() {
        bail!(
            "No connectors match '{}'. Configure one under [connectors] or via environment variables.",
            selector
        );
    }
    Ok(selected)
}
