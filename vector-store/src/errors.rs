//! Unified error types for the crate.

use std::time::Duration;

use ai_llm_service::AiLlmError;
use thiserror::Error;

/// Top-level error for vector-store operations.
///
/// Adapter failures are always surfaced; an empty hit list means "no
/// relevant entries", never "backend failed".
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Backend name outside the closed set (`dense` | `textsearch`).
    #[error("unsupported backend: '{0}' (expected 'dense' or 'textsearch')")]
    UnsupportedBackend(String),

    /// Embedding model cannot be loaded or is not served.
    #[error("embedding model '{model}' unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    /// `ids` and `texts` differ in length.
    #[error("arity mismatch: {ids} ids vs {texts} texts")]
    ArityMismatch { ids: usize, texts: usize },

    /// Backend could not be reached. Transient; callers may retry.
    #[error("{backend} unavailable during {op}: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        op: &'static str,
        reason: String,
    },

    /// Backend did not answer in time. Transient; callers may retry.
    #[error("{backend} timed out during {op} after {after:?}")]
    BackendTimeout {
        backend: &'static str,
        op: &'static str,
        after: Duration,
    },

    /// Backend answered but refused the request (4xx, bulk item errors).
    #[error("{backend} rejected {op}: {reason}")]
    BackendRejected {
        backend: &'static str,
        op: &'static str,
        reason: String,
    },

    /// Vector length differs from the index/embedder dimension.
    #[error("vector size mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    /// Stored data does not have the shape this crate writes.
    #[error("schema drift: {0}")]
    SchemaDrift(String),

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl VectorStoreError {
    /// Maps an LLM-service failure raised while embedding.
    pub(crate) fn from_embedding(op: &'static str, err: AiLlmError) -> Self {
        if err.is_timeout() {
            let after = match err {
                AiLlmError::Timeout(d) => d,
                _ => Duration::ZERO,
            };
            return VectorStoreError::BackendTimeout {
                backend: "embedder",
                op,
                after,
            };
        }
        if err.is_connect() {
            return VectorStoreError::BackendUnavailable {
                backend: "embedder",
                op,
                reason: err.to_string(),
            };
        }
        match err.http_status() {
            Some(s) if s.is_server_error() => VectorStoreError::BackendUnavailable {
                backend: "embedder",
                op,
                reason: err.to_string(),
            },
            _ => VectorStoreError::BackendRejected {
                backend: "embedder",
                op,
                reason: err.to_string(),
            },
        }
    }

    /// `true` for failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VectorStoreError::BackendUnavailable { .. } | VectorStoreError::BackendTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, VectorStoreError>;
