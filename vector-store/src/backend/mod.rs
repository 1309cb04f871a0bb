//! Index backend adapters.
//!
//! [`IndexBackend`] is the capability set shared by every engine. The
//! [`crate::VectorStore`] holds one adapter behind `Arc<dyn IndexBackend>`,
//! chosen at construction from [`BackendKind`].

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::config::{BackendKind, IndexPolicy, VectorStoreConfig};
use crate::errors::VectorStoreError;
use crate::record::{IndexEntry, RawHit, ScoreScale};

pub mod opensearch;
pub mod qdrant;

pub use opensearch::OpenSearchBackend;
pub use qdrant::QdrantBackend;

/// Operations every index backend supports.
///
/// Index lifecycle: `Uninitialized → Created → Populated ⇄ Empty → Destroyed`.
/// A failed bulk write is not rolled back and may leave the index mixed.
pub trait IndexBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Scale of the scores returned by [`IndexBackend::search`].
    fn score_scale(&self) -> ScoreScale;

    /// Makes `name` exist with `dimension`.
    ///
    /// - `Reuse`: create if missing, otherwise verify the stored dimension
    ///   (`DimensionMismatch` on drift).
    /// - `Recreate`: drop if present, then create.
    fn ensure_index<'a>(
        &'a self,
        name: &'a str,
        dimension: usize,
        policy: IndexPolicy,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>>;

    /// Writes or overwrites entries by id, in bulk.
    fn upsert<'a>(
        &'a self,
        name: &'a str,
        entries: &'a [IndexEntry],
    ) -> BoxFuture<'a, Result<(), VectorStoreError>>;

    /// At most `top_k` hits by relevance, raw backend scores.
    fn search<'a>(
        &'a self,
        name: &'a str,
        vector: &'a [f32],
        top_k: usize,
    ) -> BoxFuture<'a, Result<Vec<RawHit>, VectorStoreError>>;

    /// Removes exactly the given ids. Unknown ids are ignored.
    fn delete<'a>(
        &'a self,
        name: &'a str,
        ids: &'a [u64],
    ) -> BoxFuture<'a, Result<(), VectorStoreError>>;

    /// Destroys the whole index. Missing index is not an error.
    fn drop_index<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), VectorStoreError>>;

    /// Number of stored entries.
    fn count<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<u64, VectorStoreError>>;
}

/// What `ensure_index` must do for an index, given whether it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexAction {
    Create,
    DropAndCreate,
    VerifyExisting,
}

pub(crate) fn plan_index(exists: bool, policy: IndexPolicy) -> IndexAction {
    match (exists, policy) {
        (false, _) => IndexAction::Create,
        (true, IndexPolicy::Recreate) => IndexAction::DropAndCreate,
        (true, IndexPolicy::Reuse) => IndexAction::VerifyExisting,
    }
}

/// Builds the adapter selected by `cfg.backend`. No network I/O happens here.
pub fn build_backend(cfg: &VectorStoreConfig) -> Result<Arc<dyn IndexBackend>, VectorStoreError> {
    cfg.validate()?;
    Ok(match cfg.backend {
        BackendKind::Dense => Arc::new(QdrantBackend::new(
            &cfg.qdrant,
            cfg.upsert_batch,
            cfg.timeout,
        )?),
        BackendKind::TextSearch => Arc::new(OpenSearchBackend::new(
            &cfg.opensearch,
            cfg.upsert_batch,
            cfg.timeout,
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_index_is_always_created() {
        assert_eq!(plan_index(false, IndexPolicy::Reuse), IndexAction::Create);
        assert_eq!(plan_index(false, IndexPolicy::Recreate), IndexAction::Create);
    }

    #[test]
    fn existing_index_follows_policy() {
        assert_eq!(plan_index(true, IndexPolicy::Reuse), IndexAction::VerifyExisting);
        assert_eq!(plan_index(true, IndexPolicy::Recreate), IndexAction::DropAndCreate);
    }

    #[test]
    fn unknown_backend_never_builds() {
        let cfg = VectorStoreConfig::from_lookup(&|k| (k == "VECTOR_BACKEND").then(|| "faiss".into()));
        assert!(matches!(cfg, Err(VectorStoreError::UnsupportedBackend(_))));
    }
}
