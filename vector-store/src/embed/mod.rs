use futures::future::BoxFuture;

use crate::errors::VectorStoreError;

/// Embedding provider interface.
///
/// Async is required because real providers (Ollama, OpenAI) perform HTTP
/// requests. Implementations must be deterministic for a fixed model and safe
/// for concurrent use.
pub trait Embedder: Send + Sync {
    /// Encodes `texts` in one batch: one vector per input, each of
    /// [`Embedder::dimension`] length, in input order.
    fn encode<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, VectorStoreError>>;

    /// Output dimension, fixed for the embedder's lifetime.
    fn dimension(&self) -> usize;

    /// Model identifier, for logs and status output.
    fn model(&self) -> &str;
}

pub mod remote;
