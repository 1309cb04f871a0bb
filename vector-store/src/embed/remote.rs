//! Embedding provider backed by the shared LLM service (Ollama or OpenAI).
//!
//! The model is probed once in [`RemoteEmbedder::connect`]: availability is
//! checked against the provider listing and the output dimension is learned
//! from a single probe embedding. Any failure there is `ModelUnavailable`.

use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::embed::Embedder;
use crate::errors::VectorStoreError;

const PROBE_TEXT: &str = "dimension probe";

/// Remote embedding provider (async, batch).
#[derive(Clone)]
pub struct RemoteEmbedder {
    svc: Arc<LlmServiceProfiles>,
    model: String,
    dim: usize,
}

impl RemoteEmbedder {
    /// Connects to the embedding profile of `svc` and learns its dimension.
    ///
    /// # Errors
    /// - [`VectorStoreError::ModelUnavailable`] if the provider is down, does
    ///   not list the model, or returns an empty probe vector
    /// - [`VectorStoreError::DimensionMismatch`] if `expected_dim` is set and
    ///   differs from the model output
    pub async fn connect(
        svc: Arc<LlmServiceProfiles>,
        expected_dim: Option<usize>,
    ) -> Result<Self, VectorStoreError> {
        let model = svc.embedding_profile().model.clone();
        let unavailable = |reason: String| VectorStoreError::ModelUnavailable {
            model: model.clone(),
            reason,
        };

        svc.require_embedding_model()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let probe = svc
            .embed_batch(&[PROBE_TEXT.to_string()])
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let dim = probe.first().map(Vec::len).unwrap_or(0);
        if dim == 0 {
            return Err(unavailable("model returned an empty embedding".into()));
        }
        if let Some(want) = expected_dim {
            if want != dim {
                return Err(VectorStoreError::DimensionMismatch { got: dim, want });
            }
        }

        info!(model = %model, dim, "remote embedder connected");
        Ok(Self { svc, model, dim })
    }
}

impl Embedder for RemoteEmbedder {
    fn encode<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, VectorStoreError>> {
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            debug!(model = %self.model, batch = texts.len(), "encode");

            let vectors = self
                .svc
                .embed_batch(texts)
                .await
                .map_err(|e| VectorStoreError::from_embedding("encode", e))?;

            if vectors.len() != texts.len() {
                return Err(VectorStoreError::SchemaDrift(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                )));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
                return Err(VectorStoreError::DimensionMismatch {
                    got: bad.len(),
                    want: self.dim,
                });
            }
            Ok(vectors)
        })
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model(&self) -> &str {
        &self.model
    }
}
