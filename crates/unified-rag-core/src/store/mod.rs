//! Index-store abstraction.
//!
//! The pipeline writes the same corpus into two independent stores: a
//! vector store keyed by [`PointId`](crate::models::PointId) and a lexical
//! store keyed by natural key. Both are long-lived shared handles, so
//! implementations must be `Send + Sync` and safe for concurrent callers.
//!
//! | Trait | Write | Read |
//! |-------|-------|------|
//! | [`VectorStore`] | point upsert (id + vector + payload) | nearest-neighbour search |
//! | [`LexicalStore`] | document upsert into a named index | free-text match query |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CanonicalDocument, IndexPoint, SearchFilter};

/// A search hit from either store: the stored payload and the store's score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPayload {
    /// Vector similarity or lexical relevance, depending on the store.
    pub score: f64,
    pub payload: serde_json::Value,
}

/// Nearest-neighbour store holding one point per document.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite points by id.
    async fn upsert(&self, points: &[IndexPoint]) -> Result<()>;

    /// Return up to `limit` payloads closest to `query_vec`, best first.
    async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredPayload>>;
}

/// Full-text store holding one document per natural key.
#[async_trait]
pub trait LexicalStore: Send + Sync {
    /// Insert or overwrite documents, keyed by `natural_key`.
    async fn index(&self, documents: &[CanonicalDocument]) -> Result<()>;

    /// Return up to `limit` documents matching `query`, most relevant first.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredPayload>>;
}
