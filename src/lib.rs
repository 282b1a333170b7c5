//! # Unified RAG
//!
//! Ingestion and retrieval over an organisation's wiki, issue tracker and
//! git repositories, answering questions with cited, grounded completions.
//!
//! The pipeline itself (document model, dual-index writer, hybrid
//! retriever, prompt assembly) lives in [`unified_rag_core`]. This crate
//! supplies the concrete collaborators, the connectors, configuration, the
//! `urag` CLI and the HTTP service.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────┐   ┌────────────┐
//! │   Connectors     │──▶│  Dual-index  │──▶│   Qdrant   │
//! │ wiki/issues/git  │   │    writer    │   │ OpenSearch │
//! └──────────────────┘   └──────────────┘   └─────┬──────┘
//!                                                 │
//!                      ┌──────────────────────────┤
//!                      ▼                          ▼
//!                 ┌──────────┐   prompt   ┌──────────────┐
//!                 │  Hybrid  │──────────▶│  Completion  │
//!                 │retriever │            │   endpoint   │
//!                 └──────────┘            └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! urag sources                          # list configured connectors
//! urag ingest all                       # ingest every connector
//! urag ingest wiki:eng --dry-run        # count without writing
//! urag query "how do I restart the api?"
//! urag serve                            # POST /rag, GET /healthz
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`connector`] | Connector enum, errors and selection |
//! | [`connector_wiki`] | Wiki (Confluence) connector |
//! | [`connector_issues`] | Issue-tracker (Jira) connector |
//! | [`connector_git`] | Git repository connector |
//! | [`qdrant`] | Vector store client |
//! | [`opensearch`] | Lexical store client |
//! | [`generation`] | Completion endpoint client |
//! | [`embedding`] | Embedding providers |
//! | [`backends`] | Shared collaborator handles |
//! | [`ingest`] | Ingestion runs |
//! | [`progress`] | Ingest progress on stderr |
//! | [`query`] | One-shot CLI question answering |
//! | [`server`] | Retrieval HTTP service |
//! | [`sources`] | Connector listing |

pub mod backends;
pub mod config;
pub mod connector;
pub mod connector_git;
pub mod connector_issues;
pub mod connector_wiki;
pub mod embedding;
pub mod generation;
pub mod http;
pub mod ingest;
pub mod opensearch;
pub mod progress;
pub mod qdrant;
pub mod query;
pub mod server;
pub mod sources;
