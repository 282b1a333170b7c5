//! # Unified RAG Core
//!
//! The ingestion-and-retrieval pipeline shared by the `urag` binary:
//! canonical document model, point-identifier derivation, store and
//! embedder abstractions, the dual-index writer, the hybrid retriever,
//! and grounded prompt assembly.
//!
//! This crate performs no network or filesystem I/O of its own. Every
//! collaborator (vector store, lexical store, embedder, generator) is an
//! injected trait object, so the whole pipeline runs against the
//! in-memory stores in [`store::memory`] or any test fake.
//!
//! ```text
//!  CanonicalDocument ──▶ DualIndexWriter ──┬──▶ VectorStore
//!                                          └──▶ LexicalStore
//!
//!  question ──▶ HybridRetriever ──▶ build_prompt ──▶ Generator ──▶ Answer
//!                (vector, else lexical)
//! ```

pub mod answer;
pub mod embedding;
pub mod generation;
pub mod models;
pub mod prompt;
pub mod retriever;
pub mod store;
pub mod writer;
