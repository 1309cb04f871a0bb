//! Deterministic test doubles: a stub embedder and an in-memory backend.
//!
//! Available to this crate's tests and, with the `test-util` feature, to
//! downstream crates.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::backend::IndexBackend;
use crate::config::{BackendKind, IndexPolicy};
use crate::embed::Embedder;
use crate::errors::VectorStoreError;
use crate::record::{IndexEntry, RawHit, ScoreScale};

/// Maps known strings to fixed vectors; any other text gets a
/// pseudo-random unit vector derived from its FNV-1a hash.
pub struct StubEmbedder {
    dim: usize,
    known: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            known: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Registers a fixed vector for `text`. Length must equal the dimension.
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dim, "stub vector for '{text}' has wrong length");
        self.known.insert(text.to_string(), vector);
        self
    }

    /// Number of `encode` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.known.get(text) {
            return v.clone();
        }
        let mut state = fnv1a(text.as_bytes());
        let v: Vec<f32> = (0..self.dim)
            .map(|_| {
                // xorshift64*
                state ^= state >> 12;
                state ^= state << 25;
                state ^= state >> 27;
                let x = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
                ((x >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
            })
            .collect();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(f32::EPSILON);
        v.into_iter().map(|x| x / norm).collect()
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        h ^= u64::from(*b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h | 1
}

impl Embedder for StubEmbedder {
    fn encode<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, VectorStoreError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        })
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model(&self) -> &str {
        "stub"
    }
}

struct MemIndex {
    dim: usize,
    entries: BTreeMap<u64, (Vec<f32>, String)>,
}

/// In-memory [`IndexBackend`] with exact cosine ranking.
///
/// `text_search()` reports scores offset by `+1.0`, like the scripted
/// OpenSearch backend.
pub struct MemoryBackend {
    kind: BackendKind,
    indexes: RwLock<HashMap<String, MemIndex>>,
    unavailable: AtomicBool,
    search_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn dense() -> Self {
        Self::with_kind(BackendKind::Dense)
    }

    pub fn text_search() -> Self {
        Self::with_kind(BackendKind::TextSearch)
    }

    fn with_kind(kind: BackendKind) -> Self {
        Self {
            kind,
            indexes: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            search_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Makes every subsequent call fail with `BackendUnavailable`.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub async fn has_index(&self, name: &str) -> bool {
        self.indexes.read().await.contains_key(name)
    }

    pub async fn len(&self, name: &str) -> usize {
        self.indexes
            .read()
            .await
            .get(name)
            .map(|i| i.entries.len())
            .unwrap_or(0)
    }

    fn check_up(&self, op: &'static str) -> Result<(), VectorStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VectorStoreError::BackendUnavailable {
                backend: "memory",
                op,
                reason: "backend marked unavailable".into(),
            });
        }
        Ok(())
    }

    fn missing(name: &str) -> VectorStoreError {
        VectorStoreError::BackendRejected {
            backend: "memory",
            op: "lookup",
            reason: format!("index '{name}' does not exist"),
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

impl IndexBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn score_scale(&self) -> ScoreScale {
        match self.kind {
            BackendKind::Dense => ScoreScale::Cosine,
            BackendKind::TextSearch => ScoreScale::CosinePlusOne,
        }
    }

    fn ensure_index<'a>(
        &'a self,
        name: &'a str,
        dimension: usize,
        policy: IndexPolicy,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            self.check_up("ensure_index")?;
            let mut indexes = self.indexes.write().await;
            match (indexes.get(name), policy) {
                (Some(existing), IndexPolicy::Reuse) => {
                    if existing.dim != dimension {
                        return Err(VectorStoreError::DimensionMismatch {
                            got: dimension,
                            want: existing.dim,
                        });
                    }
                }
                _ => {
                    indexes.insert(
                        name.to_string(),
                        MemIndex {
                            dim: dimension,
                            entries: BTreeMap::new(),
                        },
                    );
                }
            }
            Ok(())
        })
    }

    fn upsert<'a>(
        &'a self,
        name: &'a str,
        entries: &'a [IndexEntry],
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            self.check_up("upsert")?;
            let mut indexes = self.indexes.write().await;
            let idx = indexes.get_mut(name).ok_or_else(|| Self::missing(name))?;
            for e in entries {
                if e.vector.len() != idx.dim {
                    return Err(VectorStoreError::DimensionMismatch {
                        got: e.vector.len(),
                        want: idx.dim,
                    });
                }
                idx.entries.insert(e.id, (e.vector.clone(), e.text.clone()));
            }
            Ok(())
        })
    }

    fn search<'a>(
        &'a self,
        name: &'a str,
        vector: &'a [f32],
        top_k: usize,
    ) -> BoxFuture<'a, Result<Vec<RawHit>, VectorStoreError>> {
        Box::pin(async move {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.check_up("search")?;
            let indexes = self.indexes.read().await;
            let idx = indexes.get(name).ok_or_else(|| Self::missing(name))?;
            let offset = match self.kind {
                BackendKind::Dense => 0.0,
                BackendKind::TextSearch => 1.0,
            };
            let mut hits: Vec<RawHit> = idx
                .entries
                .iter()
                .map(|(id, (v, text))| RawHit {
                    id: *id,
                    score: cosine(vector, v) + offset,
                    text: text.clone(),
                })
                .collect();
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
            hits.truncate(top_k);
            Ok(hits)
        })
    }

    fn delete<'a>(
        &'a self,
        name: &'a str,
        ids: &'a [u64],
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            self.check_up("delete")?;
            let mut indexes = self.indexes.write().await;
            let idx = indexes.get_mut(name).ok_or_else(|| Self::missing(name))?;
            for id in ids {
                idx.entries.remove(id);
            }
            Ok(())
        })
    }

    fn drop_index<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            self.check_up("drop_index")?;
            self.indexes.write().await.remove(name);
            Ok(())
        })
    }

    fn count<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<u64, VectorStoreError>> {
        Box::pin(async move {
            self.check_up("count")?;
            let indexes = self.indexes.read().await;
            let idx = indexes.get(name).ok_or_else(|| Self::missing(name))?;
            Ok(idx.entries.len() as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_is_deterministic_and_unit_length() {
        let e = StubEmbedder::new(12);
        let input = vec!["appropriations".to_string(), "appropriations".to_string()];
        let out = e.encode(&input).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], out[1]);
        assert!(out.iter().all(|v| v.len() == e.dimension()));
        let norm: f32 = out[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn different_texts_get_different_vectors() {
        let e = StubEmbedder::new(12);
        let out = e
            .encode(&["house bill".to_string(), "senate bill".to_string()])
            .await
            .unwrap();
        assert_ne!(out[0], out[1]);
    }
}
