//! Typed error for the rag-pipeline crate.

use thiserror::Error;
use vector_store::VectorStoreError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Retrieval failed; the backend error is kept as-is.
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] VectorStoreError),

    /// The generator could not produce an answer.
    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// Out-of-range run options (temperature, max_tokens).
    #[error("invalid run options: {0}")]
    InvalidOptions(String),

    /// Reading evaluation files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed evaluation JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ai_llm_service::AiLlmError> for PipelineError {
    fn from(e: ai_llm_service::AiLlmError) -> Self {
        PipelineError::GenerationUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
