//! Dual-index writer.
//!
//! Every batch of documents is written to the lexical store and the vector
//! store as two independent calls. Neither write gates the other: a failure
//! on one side is recorded in the [`UpsertReport`] while the other side
//! still runs to completion. There is no rollback, so a batch that lands in
//! only one store is an accepted terminal state, surfaced to the caller via
//! [`UpsertReport::into_result`].

use std::sync::Arc;

use anyhow::{bail, Result};
use futures::{Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, warn};

use crate::embedding::Embedder;
use crate::models::{CanonicalDocument, IndexPoint};
use crate::store::{LexicalStore, VectorStore};

/// Accumulated result of the writes against one store.
///
/// `calls == 0` means the store was never called (nothing to write).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreOutcome {
    /// Number of write calls issued.
    pub calls: usize,
    /// Documents in calls that succeeded.
    pub written: usize,
    /// One message per failed call.
    pub errors: Vec<String>,
}

impl StoreOutcome {
    pub fn is_skipped(&self) -> bool {
        self.calls == 0
    }

    pub fn is_failed(&self) -> bool {
        !self.errors.is_empty()
    }

    fn record(&mut self, documents: usize, result: Result<()>) {
        self.calls += 1;
        match result {
            Ok(()) => self.written += documents,
            Err(e) => self.errors.push(format!("{:#}", e)),
        }
    }

    fn absorb(&mut self, other: StoreOutcome) {
        self.calls += other.calls;
        self.written += other.written;
        self.errors.extend(other.errors);
    }
}

/// Per-store outcome of one or more [`DualIndexWriter::upsert`] calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertReport {
    /// Documents handed to the writer.
    pub documents: usize,
    pub vector: StoreOutcome,
    pub lexical: StoreOutcome,
}

impl UpsertReport {
    /// True when at least one store write failed.
    pub fn has_failures(&self) -> bool {
        self.vector.is_failed() || self.lexical.is_failed()
    }

    /// True when exactly one of the two stores failed.
    pub fn is_partial(&self) -> bool {
        self.vector.is_failed() != self.lexical.is_failed()
    }

    /// Merge the outcome of another batch into this report.
    pub fn absorb(&mut self, other: UpsertReport) {
        self.documents += other.documents;
        self.vector.absorb(other.vector);
        self.lexical.absorb(other.lexical);
    }

    /// Turn recorded failures into an [`IndexWriteError`].
    pub fn into_result(self) -> std::result::Result<UpsertReport, IndexWriteError> {
        match (self.vector.is_failed(), self.lexical.is_failed()) {
            (false, false) => Ok(self),
            (true, false) => Err(IndexWriteError::Vector(self.vector.errors.join("; "))),
            (false, true) => Err(IndexWriteError::Lexical(self.lexical.errors.join("; "))),
            (true, true) => Err(IndexWriteError::Both {
                vector: self.vector.errors.join("; "),
                lexical: self.lexical.errors.join("; "),
            }),
        }
    }
}

/// Write failures, reported per store.
#[derive(Debug, Error, PartialEq)]
pub enum IndexWriteError {
    #[error("vector store write failed (lexical store updated): {0}")]
    Vector(String),
    #[error("lexical store write failed (vector store updated): {0}")]
    Lexical(String),
    #[error("both index writes failed; vector: {vector}; lexical: {lexical}")]
    Both { vector: String, lexical: String },
}

/// Outcome of [`DualIndexWriter::upsert_stream`].
#[derive(Debug)]
pub struct StreamUpsert<E> {
    pub report: UpsertReport,
    /// The error that ended the document stream early, if any.
    pub source_error: Option<E>,
}

/// Writes canonical documents into both index stores.
///
/// Holds shared handles to the two stores and the embedder; cloning the
/// `Arc`s is all it takes to run several writers concurrently.
pub struct DualIndexWriter {
    vector: Arc<dyn VectorStore>,
    lexical: Arc<dyn LexicalStore>,
    embedder: Arc<dyn Embedder>,
}

impl DualIndexWriter {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        lexical: Arc<dyn LexicalStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            vector,
            lexical,
            embedder,
        }
    }

    /// Upsert one batch into both stores.
    ///
    /// An empty batch issues no calls at all. Embedding failures count
    /// against the vector store only.
    pub async fn upsert(&self, documents: &[CanonicalDocument]) -> UpsertReport {
        let mut report = UpsertReport {
            documents: documents.len(),
            ..Default::default()
        };
        if documents.is_empty() {
            return report;
        }

        let lexical_write = self.lexical.index(documents);
        let vector_write = async {
            let points = self.build_points(documents).await?;
            self.vector.upsert(&points).await
        };
        let (lexical_result, vector_result) = futures::join!(lexical_write, vector_write);

        if let Err(ref e) = lexical_result {
            warn!(documents = documents.len(), error = %e, "lexical store write failed");
        }
        if let Err(ref e) = vector_result {
            warn!(documents = documents.len(), error = %e, "vector store write failed");
        }
        report.lexical.record(documents.len(), lexical_result);
        report.vector.record(documents.len(), vector_result);

        debug!(
            documents = documents.len(),
            vector_ok = !report.vector.is_failed(),
            lexical_ok = !report.lexical.is_failed(),
            "batch upserted"
        );
        report
    }

    /// Drain a fallible document stream, upserting in batches of `batch_size`.
    ///
    /// Stops at the first stream error. Documents already buffered when the
    /// error arrives are still written before returning.
    pub async fn upsert_stream<S, E>(&self, documents: S, batch_size: usize) -> StreamUpsert<E>
    where
        S: Stream<Item = std::result::Result<CanonicalDocument, E>>,
    {
        self.upsert_stream_with_progress(documents, batch_size, |_| {})
            .await
    }

    /// [`upsert_stream`](Self::upsert_stream), calling `on_batch` with the
    /// running report after every batch is written.
    pub async fn upsert_stream_with_progress<S, E, F>(
        &self,
        documents: S,
        batch_size: usize,
        mut on_batch: F,
    ) -> StreamUpsert<E>
    where
        S: Stream<Item = std::result::Result<CanonicalDocument, E>>,
        F: FnMut(&UpsertReport),
    {
        let batch_size = batch_size.max(1);
        let mut documents = Box::pin(documents);
        let mut report = UpsertReport::default();
        let mut batch = Vec::with_capacity(batch_size);
        let mut source_error = None;

        while let Some(item) = documents.next().await {
            match item {
                Ok(doc) => {
                    batch.push(doc);
                    if batch.len() >= batch_size {
                        report.absorb(self.upsert(&batch).await);
                        batch.clear();
                        on_batch(&report);
                    }
                }
                Err(e) => {
                    source_error = Some(e);
                    break;
                }
            }
        }

        if !batch.is_empty() {
            report.absorb(self.upsert(&batch).await);
            on_batch(&report);
        }

        StreamUpsert {
            report,
            source_error,
        }
    }

    async fn build_points(&self, documents: &[CanonicalDocument]) -> Result<Vec<IndexPoint>> {
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != documents.len() {
            bail!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                documents.len()
            );
        }
        Ok(documents
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(doc, vector)| IndexPoint::new(doc, vector))
            .collect())
    }
}
