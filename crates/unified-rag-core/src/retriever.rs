//! Hybrid retriever: vector search first, lexical search as fallback.
//!
//! # Retrieval Algorithm
//!
//! 1. Embed the query and ask the vector store for `top_k` neighbours.
//! 2. If that produced at least one hit, return those chunks. The lexical
//!    store is not consulted.
//! 3. Otherwise (error or zero hits) run one `match` query against the
//!    lexical store with the same `top_k`.
//! 4. If the lexical store also fails or returns nothing, return an empty
//!    chunk list. That is a valid outcome, not an error.
//!
//! The two paths are exclusive. Vector similarity and lexical relevance
//! live on incomparable scales, so results are never merged or re-ranked
//! across paths, and chunk order is the store's order.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::embedding::{embed_one, Embedder};
use crate::models::{RankedChunk, SearchFilter};
use crate::store::{LexicalStore, ScoredPayload, VectorStore};

/// Default number of chunks requested from either store.
pub const DEFAULT_TOP_K: usize = 8;

/// Which path produced a [`Retrieval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalPath {
    Vector,
    Lexical,
    Empty,
}

/// Ranked chunks for one query, plus the path that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub path: RetrievalPath,
    pub chunks: Vec<RankedChunk>,
}

impl Retrieval {
    fn empty() -> Self {
        Self {
            path: RetrievalPath::Empty,
            chunks: Vec::new(),
        }
    }
}

/// Query-time retriever over the two index stores.
///
/// Stateless across calls; one instance serves any number of concurrent
/// queries.
pub struct HybridRetriever {
    vector: Arc<dyn VectorStore>,
    lexical: Arc<dyn LexicalStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl HybridRetriever {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        lexical: Arc<dyn LexicalStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            vector,
            lexical,
            embedder,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Override the per-store result cap (minimum 1).
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve ranked chunks for `query`. Never fails.
    pub async fn retrieve(&self, query: &str, filter: &SearchFilter) -> Retrieval {
        match self.vector_attempt(query, filter).await {
            Ok(chunks) if !chunks.is_empty() => {
                debug!(hits = chunks.len(), "vector search satisfied query");
                return Retrieval {
                    path: RetrievalPath::Vector,
                    chunks,
                };
            }
            Ok(_) => debug!("vector search returned no hits, falling back to lexical search"),
            Err(e) => warn!(error = %format!("{:#}", e), "vector search failed, falling back to lexical search"),
        }

        match self.lexical.search(query, self.top_k, filter).await {
            Ok(hits) if !hits.is_empty() => {
                debug!(hits = hits.len(), "lexical search satisfied query");
                Retrieval {
                    path: RetrievalPath::Lexical,
                    chunks: self.to_chunks(&hits),
                }
            }
            Ok(_) => {
                debug!("lexical search returned no hits, continuing with empty context");
                Retrieval::empty()
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "lexical search failed, continuing with empty context");
                Retrieval::empty()
            }
        }
    }

    async fn vector_attempt(&self, query: &str, filter: &SearchFilter) -> Result<Vec<RankedChunk>> {
        let query_vec = embed_one(self.embedder.as_ref(), query).await?;
        let hits = self.vector.search(&query_vec, self.top_k, filter).await?;
        Ok(self.to_chunks(&hits))
    }

    fn to_chunks(&self, hits: &[ScoredPayload]) -> Vec<RankedChunk> {
        hits.iter()
            .take(self.top_k)
            .map(|hit| RankedChunk::from_payload(&hit.payload, hit.score))
            .collect()
    }
}
