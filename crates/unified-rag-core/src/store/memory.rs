//! In-memory store implementations for tests and local runs.
//!
//! Uses `BTreeMap` behind `std::sync::RwLock` for thread safety. Vector
//! search is brute-force cosine similarity over all stored points. Lexical
//! search scores a document by how many query terms its text contains.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{CanonicalDocument, IndexPoint, PointId, SearchFilter};

use super::{LexicalStore, ScoredPayload, VectorStore};

/// In-memory vector store keyed by [`PointId`].
#[derive(Default)]
pub struct InMemoryVectorStore {
    points: RwLock<BTreeMap<PointId, IndexPoint>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a stored point by id.
    pub fn get(&self, id: PointId) -> Option<IndexPoint> {
        self.points.read().ok()?.get(&id).cloned()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, points: &[IndexPoint]) -> Result<()> {
        let mut stored = self
            .points
            .write()
            .map_err(|_| anyhow!("vector store lock poisoned"))?;
        for point in points {
            stored.insert(point.id, point.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredPayload>> {
        let stored = self
            .points
            .read()
            .map_err(|_| anyhow!("vector store lock poisoned"))?;
        let mut scored: Vec<(f64, &IndexPoint)> = stored
            .values()
            .filter(|p| filter.kind.map_or(true, |k| p.payload.kind == k))
            .map(|p| (cosine_similarity(query_vec, &p.vector) as f64, p))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(limit)
            .map(|(score, point)| -> Result<ScoredPayload> {
                Ok(ScoredPayload {
                    score,
                    payload: serde_json::to_value(&point.payload)?,
                })
            })
            .collect()
    }
}

/// In-memory lexical store keyed by natural key.
#[derive(Default)]
pub struct InMemoryLexicalStore {
    documents: RwLock<BTreeMap<String, CanonicalDocument>>,
}

impl InMemoryLexicalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a stored document by natural key.
    pub fn get(&self, natural_key: &str) -> Option<CanonicalDocument> {
        self.documents.read().ok()?.get(natural_key).cloned()
    }
}

#[async_trait]
impl LexicalStore for InMemoryLexicalStore {
    async fn index(&self, documents: &[CanonicalDocument]) -> Result<()> {
        let mut stored = self
            .documents
            .write()
            .map_err(|_| anyhow!("lexical store lock poisoned"))?;
        for doc in documents {
            stored.insert(doc.natural_key.clone(), doc.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredPayload>> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let stored = self
            .documents
            .read()
            .map_err(|_| anyhow!("lexical store lock poisoned"))?;
        let mut scored: Vec<(f64, &CanonicalDocument)> = stored
            .values()
            .filter(|d| filter.kind.map_or(true, |k| d.kind == k))
            .filter_map(|d| {
                let text_lower = d.text.to_lowercase();
                let matches = terms.iter().filter(|t| text_lower.contains(*t)).count();
                (matches > 0).then_some((matches as f64, d))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(limit)
            .map(|(score, doc)| -> Result<ScoredPayload> {
                Ok(ScoredPayload {
                    score,
                    payload: serde_json::to_value(doc)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    #[tokio::test]
    async fn test_vector_upsert_overwrites_same_key() {
        let store = InMemoryVectorStore::new();
        let first = CanonicalDocument::wiki_page("1", "Old", "old body");
        let second = CanonicalDocument::wiki_page("1", "New", "new body");

        store.upsert(&[IndexPoint::new(first, vec![1.0, 0.0])]).await.unwrap();
        store.upsert(&[IndexPoint::new(second.clone(), vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(second.point_id()).unwrap().payload, second);
    }

    #[tokio::test]
    async fn test_vector_search_orders_by_similarity() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                IndexPoint::new(CanonicalDocument::wiki_page("1", "A", "a"), vec![1.0, 0.0]),
                IndexPoint::new(CanonicalDocument::wiki_page("2", "B", "b"), vec![0.6, 0.8]),
                IndexPoint::new(CanonicalDocument::wiki_page("3", "C", "c"), vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store
            .search(&[0.0, 1.0], 2, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].payload["source"], "confluence:3");
        assert_eq!(hits[1].payload["source"], "confluence:2");
    }

    #[tokio::test]
    async fn test_lexical_search_counts_terms_and_filters_kind() {
        let store = InMemoryLexicalStore::new();
        store
            .index(&[
                CanonicalDocument::wiki_page("1", "Runbook", "Restart the service"),
                CanonicalDocument::issue("ENG-1", "Service restart loops", None),
                CanonicalDocument::issue("ENG-2", "Unrelated", Some("nothing here")),
            ])
            .await
            .unwrap();

        let hits = store
            .search("restart service", 10, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);

        let only_issues = SearchFilter {
            kind: Some(SourceKind::IssueTracker),
        };
        let hits = store.search("restart", 10, &only_issues).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload["source"], "jira:ENG-1");
    }

    #[tokio::test]
    async fn test_lexical_blank_query_matches_nothing() {
        let store = InMemoryLexicalStore::new();
        store
            .index(&[CanonicalDocument::wiki_page("1", "Runbook", "Restart")])
            .await
            .unwrap();
        let hits = store.search("   ", 10, &SearchFilter::default()).await.unwrap();
        assert!(hits.is_empty());
    }
}
