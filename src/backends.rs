//! Process-wide collaborator handles.
//!
//! Built once from configuration at startup and shared by the writer, the
//! retriever and the server for the lifetime of the process.

use anyhow::Result;
use std::sync::Arc;
use unified_rag_core::answer::AnswerService;
use unified_rag_core::embedding::Embedder;
use unified_rag_core::generation::Generator;
use unified_rag_core::retriever::HybridRetriever;
use unified_rag_core::store::{LexicalStore, VectorStore};
use unified_rag_core::writer::DualIndexWriter;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::CompletionClient;
use crate::opensearch::OpenSearchStore;
use crate::qdrant::QdrantStore;

#[derive(Clone)]
pub struct Backends {
    pub vector: Arc<dyn VectorStore>,
    pub lexical: Arc<dyn LexicalStore>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub top_k: usize,
}

impl Backends {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            vector: Arc::new(QdrantStore::new(&config.vector)?),
            lexical: Arc::new(OpenSearchStore::new(&config.lexical)?),
            embedder: create_embedder(&config.embedding)?,
            generator: Arc::new(CompletionClient::new(&config.generation)?),
            top_k: config.retrieval.top_k,
        })
    }

    pub fn writer(&self) -> DualIndexWriter {
        DualIndexWriter::new(
            self.vector.clone(),
            self.lexical.clone(),
            self.embedder.clone(),
        )
    }

    pub fn retriever(&self) -> HybridRetriever {
        HybridRetriever::new(
            self.vector.clone(),
            self.lexical.clone(),
            self.embedder.clone(),
        )
        .with_top_k(self.top_k)
    }

    pub fn answer_service(&self) -> AnswerService {
        AnswerService::new(self.retriever(), self.generator.clone())
    }
}
