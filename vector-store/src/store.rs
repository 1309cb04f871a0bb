//! Backend-agnostic store: one embedder bound to one index backend.
//!
//! Callers only see text in, [`SearchHit`] out. Scores are normalized to
//! `[0, 1]` and the score threshold is applied here, never in adapters, so
//! behavior does not depend on the backend.

use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::backend::{IndexBackend, build_backend};
use crate::config::{BackendKind, IndexPolicy, VectorStoreConfig};
use crate::embed::Embedder;
use crate::errors::VectorStoreError;
use crate::record::{IndexEntry, SearchHit};

/// High-level facade that wires an embedder and an index backend.
///
/// Cheap to share behind `Arc`; all methods take `&self`. Index-mutating
/// calls are not serialized against each other.
pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn IndexBackend>,
    index: String,
}

impl VectorStore {
    /// Builds the adapter for `cfg.backend` and ensures the index exists
    /// according to `cfg.policy`.
    ///
    /// `cfg.backend` is already a parsed [`BackendKind`]; unknown names fail
    /// in [`VectorStoreConfig::from_env`] before any connection is made.
    ///
    /// # Errors
    /// Config errors, `DimensionMismatch` when the stored index disagrees
    /// with the embedder, or backend availability errors.
    pub async fn connect(
        cfg: &VectorStoreConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, VectorStoreError> {
        if let Some(want) = cfg.embedding_dim {
            if want != embedder.dimension() {
                return Err(VectorStoreError::DimensionMismatch {
                    got: embedder.dimension(),
                    want,
                });
            }
        }
        let backend = build_backend(cfg)?;
        Self::from_parts(embedder, backend, &cfg.index, cfg.policy).await
    }

    /// Wires explicit parts and ensures the index.
    pub async fn from_parts(
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn IndexBackend>,
        index: &str,
        policy: IndexPolicy,
    ) -> Result<Self, VectorStoreError> {
        if index.trim().is_empty() {
            return Err(VectorStoreError::Config("index name is empty".into()));
        }
        if embedder.dimension() == 0 {
            return Err(VectorStoreError::ModelUnavailable {
                model: embedder.model().to_string(),
                reason: "embedder reports dimension 0".into(),
            });
        }

        backend
            .ensure_index(index, embedder.dimension(), policy)
            .await?;

        info!(
            target: "vector_store::store",
            backend = %backend.kind(),
            index,
            dimension = embedder.dimension(),
            model = embedder.model(),
            ?policy,
            "vector store ready"
        );

        Ok(Self {
            embedder,
            backend,
            index: index.to_string(),
        })
    }

    /// Encodes `texts` in one batch and writes them under `ids`.
    ///
    /// Returns the number of entries written.
    ///
    /// # Errors
    /// `ArityMismatch` when `ids` and `texts` differ in length.
    pub async fn upsert(&self, ids: &[u64], texts: &[String]) -> Result<usize, VectorStoreError> {
        if ids.len() != texts.len() {
            return Err(VectorStoreError::ArityMismatch {
                ids: ids.len(),
                texts: texts.len(),
            });
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let vectors = self.embedder.encode(texts).await?;
        if vectors.len() != texts.len() {
            return Err(VectorStoreError::SchemaDrift(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        let dim = self.embedder.dimension();
        let mut entries = Vec::with_capacity(ids.len());
        for ((id, text), vector) in ids.iter().zip(texts).zip(vectors) {
            if vector.len() != dim {
                return Err(VectorStoreError::DimensionMismatch {
                    got: vector.len(),
                    want: dim,
                });
            }
            entries.push(IndexEntry {
                id: *id,
                vector,
                text: text.clone(),
            });
        }

        self.backend.upsert(&self.index, &entries).await?;
        debug!(target: "vector_store::store", index = %self.index, written = entries.len(), "upsert done");
        Ok(entries.len())
    }

    /// Semantic search with the default threshold of `0.0`.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, VectorStoreError> {
        self.search_with_threshold(query, top_k, 0.0).await
    }

    /// Semantic search: at most `top_k` hits with `score >= score_threshold`,
    /// ordered by non-increasing normalized score.
    ///
    /// `top_k == 0` returns an empty list without calling the embedder or backend.
    pub async fn search_with_threshold(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        if !score_threshold.is_finite() {
            return Err(VectorStoreError::Config(format!(
                "score_threshold must be finite, got {score_threshold}"
            )));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .encode(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| VectorStoreError::SchemaDrift("embedder returned no vector".into()))?;

        let raw = self.backend.search(&self.index, &query_vec, top_k).await?;
        trace!(target: "vector_store::store", raw_hits = raw.len(), "backend search returned");

        let scale = self.backend.score_scale();
        let mut hits: Vec<SearchHit> = raw
            .into_iter()
            .map(|h| SearchHit {
                id: h.id,
                score: scale.normalize(h.score),
                text: h.text,
            })
            .filter(|h| h.score >= score_threshold)
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(top_k);

        debug!(
            target: "vector_store::store",
            index = %self.index,
            top_k,
            score_threshold,
            hits = hits.len(),
            "search done"
        );
        Ok(hits)
    }

    /// Removes exactly `ids`. Empty input is a no-op.
    pub async fn delete(&self, ids: &[u64]) -> Result<(), VectorStoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.backend.delete(&self.index, ids).await?;
        info!(target: "vector_store::store", index = %self.index, deleted = ids.len(), "delete done");
        Ok(())
    }

    /// Destroys the whole index. The store is unusable for writes until the
    /// index is ensured again.
    pub async fn drop_index(&self) -> Result<(), VectorStoreError> {
        self.backend.drop_index(&self.index).await
    }

    pub async fn count(&self) -> Result<u64, VectorStoreError> {
        self.backend.count(&self.index).await
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ScoreScale;
    use crate::testing::{MemoryBackend, StubEmbedder};

    fn animals() -> StubEmbedder {
        StubEmbedder::new(3)
            .with_vector("cat", vec![1.0, 0.0, 0.0])
            .with_vector("feline", vec![0.9, 0.1, 0.0])
            .with_vector("dog", vec![0.0, 1.0, 0.0])
            .with_vector("fish", vec![0.0, 0.0, 1.0])
    }

    async fn store_with(
        embedder: StubEmbedder,
        backend: MemoryBackend,
    ) -> (VectorStore, Arc<StubEmbedder>, Arc<MemoryBackend>) {
        let embedder = Arc::new(embedder);
        let backend = Arc::new(backend);
        let store = VectorStore::from_parts(
            embedder.clone(),
            backend.clone(),
            "docs",
            IndexPolicy::Reuse,
        )
        .await
        .unwrap();
        (store, embedder, backend)
    }

    fn texts(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn feline_ranks_cat_first() {
        let (store, _, _) = store_with(animals(), MemoryBackend::dense()).await;
        store
            .upsert(&[1, 2, 3], &texts(&["cat", "dog", "fish"]))
            .await
            .unwrap();

        let hits = store.search("feline", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
        assert_eq!(hits[0].text, "cat");
    }

    #[tokio::test]
    async fn textsearch_scale_gives_the_same_ranking_and_scores() {
        let (dense, _, _) = store_with(animals(), MemoryBackend::dense()).await;
        let (text, _, _) = store_with(animals(), MemoryBackend::text_search()).await;
        for s in [&dense, &text] {
            s.upsert(&[1, 2, 3], &texts(&["cat", "dog", "fish"])).await.unwrap();
        }
        let a = dense.search("feline", 3).await.unwrap();
        let b = text.search("feline", 3).await.unwrap();
        assert_eq!(a.len(), 3);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.id, y.id);
            assert!((x.score - y.score).abs() < 1e-5);
            assert!((0.0..=1.0).contains(&x.score));
        }
    }

    #[tokio::test]
    async fn identity_recall_returns_exact_text_on_top() {
        let (store, _, _) = store_with(StubEmbedder::new(16), MemoryBackend::dense()).await;
        let docs = texts(&[
            "Section 1. Short title.",
            "Section 2. Definitions.",
            "Section 3. Appropriations for fiscal year 2025.",
            "Section 4. Effective date.",
        ]);
        store.upsert(&[10, 11, 12, 13], &docs).await.unwrap();

        for (id, text) in [10u64, 11, 12, 13].iter().zip(&docs) {
            let hits = store.search(text, 2).await.unwrap();
            assert_eq!(hits[0].id, *id);
            assert!(hits[0].score > 0.999);
        }
    }

    #[tokio::test]
    async fn results_are_bounded_and_ordered() {
        let (store, _, _) = store_with(StubEmbedder::new(8), MemoryBackend::dense()).await;
        let ids: Vec<u64> = (0..20).collect();
        let docs: Vec<String> = ids.iter().map(|i| format!("clause {i}")).collect();
        store.upsert(&ids, &docs).await.unwrap();

        for k in [1usize, 3, 7, 20, 50] {
            let hits = store.search("clause 4", k).await.unwrap();
            assert!(hits.len() <= k);
            assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }

    #[tokio::test]
    async fn threshold_filters_after_normalization() {
        let (store, _, _) = store_with(animals(), MemoryBackend::text_search()).await;
        store
            .upsert(&[1, 2, 3], &texts(&["cat", "dog", "fish"]))
            .await
            .unwrap();

        // feline·dog ≈ 0.11 → normalized ≈ 0.55; feline·cat ≈ 0.99 → ≈ 0.997
        let hits = store.search_with_threshold("feline", 3, 0.9).await.unwrap();
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1]);

        let all = store.search_with_threshold("feline", 3, 0.0).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn deleted_ids_never_come_back() {
        let (store, _, backend) = store_with(animals(), MemoryBackend::dense()).await;
        store
            .upsert(&[1, 2, 3], &texts(&["cat", "dog", "fish"]))
            .await
            .unwrap();
        store.delete(&[1]).await.unwrap();

        for q in ["cat", "feline", "dog", "fish"] {
            let hits = store.search(q, 10).await.unwrap();
            assert!(hits.iter().all(|h| h.id != 1), "query {q} returned deleted id");
        }
        assert_eq!(backend.len("docs").await, 2);
    }

    #[tokio::test]
    async fn upsert_delete_upsert_restores_searchability() {
        let (store, _, _) = store_with(animals(), MemoryBackend::dense()).await;
        let t = texts(&["cat"]);
        store.upsert(&[1], &t).await.unwrap();
        store.delete(&[1]).await.unwrap();
        assert!(store.search("cat", 1).await.unwrap().is_empty());

        store.upsert(&[1], &t).await.unwrap();
        let hits = store.search("cat", 1).await.unwrap();
        assert_eq!(hits[0].id, 1);
    }

    #[tokio::test]
    async fn arity_mismatch_is_rejected_before_encoding() {
        let (store, embedder, _) = store_with(animals(), MemoryBackend::dense()).await;
        let err = store.upsert(&[1, 2], &texts(&["cat"])).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::ArityMismatch { ids: 2, texts: 1 }));
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn upsert_encodes_once_per_batch() {
        let (store, embedder, _) = store_with(animals(), MemoryBackend::dense()).await;
        store
            .upsert(&[1, 2, 3], &texts(&["cat", "dog", "fish"]))
            .await
            .unwrap();
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn zero_top_k_touches_nothing() {
        let (store, embedder, backend) = store_with(animals(), MemoryBackend::dense()).await;
        assert!(store.search("cat", 0).await.unwrap().is_empty());
        assert_eq!(embedder.calls(), 0);
        assert_eq!(backend.search_calls(), 0);
    }

    #[tokio::test]
    async fn empty_delete_is_a_no_op() {
        let (store, _, backend) = store_with(animals(), MemoryBackend::dense()).await;
        store.upsert(&[1], &texts(&["cat"])).await.unwrap();
        store.delete(&[]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(backend.delete_calls(), 0);
    }

    #[tokio::test]
    async fn backend_failure_is_not_an_empty_result() {
        let (store, _, backend) = store_with(animals(), MemoryBackend::dense()).await;
        backend.set_unavailable(true);
        let err = store.search("cat", 3).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn reuse_detects_dimension_drift_and_recreate_resets() {
        let backend = Arc::new(MemoryBackend::dense());
        let three = Arc::new(animals());
        let store = VectorStore::from_parts(three, backend.clone(), "docs", IndexPolicy::Reuse)
            .await
            .unwrap();
        store.upsert(&[1], &texts(&["cat"])).await.unwrap();

        let four = Arc::new(StubEmbedder::new(4));
        let err = VectorStore::from_parts(four.clone(), backend.clone(), "docs", IndexPolicy::Reuse)
            .await
            .err();
        assert!(matches!(err, Some(VectorStoreError::DimensionMismatch { got: 4, want: 3 })));

        let store = VectorStore::from_parts(four, backend, "docs", IndexPolicy::Recreate)
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reuse_keeps_existing_entries() {
        let backend = Arc::new(MemoryBackend::dense());
        let first = VectorStore::from_parts(Arc::new(animals()), backend.clone(), "docs", IndexPolicy::Reuse)
            .await
            .unwrap();
        first.upsert(&[1, 2], &texts(&["cat", "dog"])).await.unwrap();

        let second = VectorStore::from_parts(Arc::new(animals()), backend, "docs", IndexPolicy::Reuse)
            .await
            .unwrap();
        assert_eq!(second.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn drop_index_is_distinct_from_delete() {
        let (store, _, backend) = store_with(animals(), MemoryBackend::dense()).await;
        store.upsert(&[1, 2], &texts(&["cat", "dog"])).await.unwrap();
        store.delete(&[2]).await.unwrap();
        assert!(backend.has_index("docs").await);

        store.drop_index().await.unwrap();
        assert!(!backend.has_index("docs").await);
    }

    #[tokio::test]
    async fn connect_checks_expected_dimension() {
        let mut cfg = VectorStoreConfig::new_default(BackendKind::Dense, "docs");
        cfg.embedding_dim = Some(384);
        let err = VectorStore::connect(&cfg, Arc::new(StubEmbedder::new(3)))
            .await
            .err();
        assert!(matches!(err, Some(VectorStoreError::DimensionMismatch { got: 3, want: 384 })));
    }

    #[test]
    fn invalid_backend_fails_at_config_load() {
        let lookup = |k: &str| (k == "VECTOR_BACKEND").then(|| "invalid".to_string());
        let err = VectorStoreConfig::from_lookup(&lookup).unwrap_err();
        assert!(matches!(err, VectorStoreError::UnsupportedBackend(_)));
    }

    #[tokio::test]
    async fn scores_stay_in_unit_range() {
        let (store, _, _) = store_with(animals(), MemoryBackend::dense()).await;
        store
            .upsert(&[1, 2, 3], &texts(&["cat", "dog", "fish"]))
            .await
            .unwrap();
        let hits = store.search("cat", 3).await.unwrap();
        // cat·cat = 1 → 1.0; cat·dog = 0 → 0.5
        assert_eq!(hits[0].score, ScoreScale::Cosine.normalize(1.0));
        assert!((hits[1].score - 0.5).abs() < 1e-6);
    }
}
