//! Core data models that flow through ingestion and retrieval.
//!
//! A [`CanonicalDocument`] is what every connector produces, whatever the
//! upstream source looks like. Its `natural_key` is stable across
//! re-ingestion, and [`derive_point_id`] maps that key onto the integer
//! identifier the vector store is keyed by, so writing the same document
//! twice overwrites instead of duplicating.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// The closed set of source systems a document can come from.
///
/// Serialized as the natural-key prefix of the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "confluence")]
    Wiki,
    #[serde(rename = "jira")]
    IssueTracker,
    #[serde(rename = "git")]
    Repository,
}

impl SourceKind {
    /// Returns the natural-key prefix for this source (`"confluence"`, `"jira"`, `"git"`).
    pub fn prefix(&self) -> &'static str {
        match self {
            SourceKind::Wiki => "confluence",
            SourceKind::IssueTracker => "jira",
            SourceKind::Repository => "git",
        }
    }

    /// Parses a prefix or a connector type name (`"wiki"`, `"issues"`, `"repository"`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "confluence" | "wiki" => Some(SourceKind::Wiki),
            "jira" | "issues" => Some(SourceKind::IssueTracker),
            "git" | "repository" => Some(SourceKind::Repository),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Normalized record produced by every connector.
///
/// This is also the payload stored alongside each vector and the document
/// body indexed in the lexical store, so retrieval reads `text` and
/// `source` straight back out of either store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDocument {
    /// Source-native identifier (page id, issue key, `<repo>::<path>`).
    pub id: String,
    /// Globally unique, re-ingestion-stable key. Immutable once produced.
    pub natural_key: String,
    pub kind: SourceKind,
    /// Human-readable provenance tag shown next to citations.
    pub source: String,
    pub text: String,
}

impl CanonicalDocument {
    /// A wiki page: `confluence:<pageId>`, text is `title + "\n\n" + body`.
    ///
    /// The body is passed through untouched, markup included.
    pub fn wiki_page(page_id: &str, title: &str, body: &str) -> Self {
        let natural_key = format!("{}:{}", SourceKind::Wiki.prefix(), page_id);
        Self {
            id: page_id.to_string(),
            source: natural_key.clone(),
            natural_key,
            kind: SourceKind::Wiki,
            text: format!("{}\n\n{}", title, body),
        }
    }

    /// An issue: `jira:<issueKey>`, text is `summary + "\n\n" + description`.
    pub fn issue(issue_key: &str, summary: &str, description: Option<&str>) -> Self {
        let natural_key = format!("{}:{}", SourceKind::IssueTracker.prefix(), issue_key);
        Self {
            id: issue_key.to_string(),
            source: natural_key.clone(),
            natural_key,
            kind: SourceKind::IssueTracker,
            text: format!("{}\n\n{}", summary, description.unwrap_or_default()),
        }
    }

    /// A file from a repository checkout: `git:<repoUrl>#<branch>:<relativePath>`.
    pub fn repository_file(repo_url: &str, branch: &str, relative_path: &str, content: String) -> Self {
        let natural_key = format!(
            "{}:{}#{}:{}",
            SourceKind::Repository.prefix(),
            repo_url,
            branch,
            relative_path
        );
        Self {
            id: format!("{}::{}", repo_url, relative_path),
            source: natural_key.clone(),
            natural_key,
            kind: SourceKind::Repository,
            text: content,
        }
    }

    /// The vector-store identifier for this document.
    pub fn point_id(&self) -> PointId {
        derive_point_id(&self.natural_key)
    }
}

/// Fixed-width identifier of a point in the vector store.
///
/// Derived from a natural key by [`derive_point_id`]. Distinct keys can
/// collide (32 bits of a digest); that risk is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(pub u32);

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Map a natural key to its point identifier.
///
/// The first four bytes of the SHA-256 digest of the key, read big-endian.
/// Pure and total: equal keys always give equal identifiers.
///
/// # Example
///
/// ```rust
/// use unified_rag_core::models::derive_point_id;
///
/// assert_eq!(derive_point_id("confluence:123"), derive_point_id("confluence:123"));
/// ```
pub fn derive_point_id(natural_key: &str) -> PointId {
    let digest = Sha256::digest(natural_key.as_bytes());
    PointId(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

/// One entry of a vector-store upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexPoint {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: CanonicalDocument,
}

impl IndexPoint {
    pub fn new(payload: CanonicalDocument, vector: Vec<f32>) -> Self {
        Self {
            id: payload.point_id(),
            vector,
            payload,
        }
    }
}

/// The unit returned by either retrieval path.
///
/// `score` is vector similarity or lexical relevance depending on which
/// path produced the chunk; the two scales are never compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedChunk {
    pub text: String,
    pub source: String,
    pub score: f64,
}

impl RankedChunk {
    /// Build a chunk from a stored payload, reading its `text` and `source` fields.
    ///
    /// Missing or non-string fields become empty strings.
    pub fn from_payload(payload: &serde_json::Value, score: f64) -> Self {
        let field = |name: &str| {
            payload
                .get(name)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Self {
            text: field("text"),
            source: field("source"),
            score,
        }
    }
}

/// Retrieval restrictions parsed from a request's `filters` object.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchFilter {
    /// Only return documents from this source system.
    #[serde(default)]
    pub kind: Option<SourceKind>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
    }
}
