//! Text-generation collaborator.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Why a generation call failed. Every variant is fatal for the request;
/// nothing is retried.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request timed out after {0:?}")]
    Timeout(Duration),
    #[error("generation request failed: {0}")]
    Transport(String),
    #[error("generation endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed generation response: {0}")]
    Malformed(String),
}

/// A text-generation endpoint: prompt in, continuation out.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
