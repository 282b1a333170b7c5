//! Retrieval-augmented answering: retrieve, assemble a prompt, generate.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::generation::{GenerationError, Generator};
use crate::models::{RankedChunk, SearchFilter};
use crate::prompt::build_prompt;
use crate::retriever::{HybridRetriever, RetrievalPath};

/// Response to one question: the generated answer and the chunks it was
/// grounded on, in retrieval order.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub chunks: Vec<RankedChunk>,
    #[serde(skip)]
    pub path: RetrievalPath,
}

/// Answers questions against the indexed corpus.
pub struct AnswerService {
    retriever: HybridRetriever,
    generator: Arc<dyn Generator>,
}

impl AnswerService {
    pub fn new(retriever: HybridRetriever, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    /// Answer `question`.
    ///
    /// Retrieval never fails; an empty context is still sent to the
    /// generator. A generation failure fails the whole request.
    pub async fn answer(
        &self,
        question: &str,
        filter: &SearchFilter,
    ) -> Result<Answer, GenerationError> {
        let retrieval = self.retriever.retrieve(question, filter).await;
        info!(path = ?retrieval.path, chunks = retrieval.chunks.len(), "retrieval finished");

        let prompt = build_prompt(question, &retrieval.chunks);
        let answer = self.generator.generate(&prompt).await?;

        Ok(Answer {
            answer,
            chunks: retrieval.chunks,
            path: retrieval.path,
        })
    }
}
