//! Retrieve-then-generate over a [`VectorStore`] and a [`Generator`].

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use vector_store::{SearchHit, VectorStore};

use crate::cfg::{DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_TOP_K, PipelineConfig};
use crate::error::PipelineError;
use crate::generator::{GenerationParams, Generator};
use crate::prompt::build_prompt;

/// Per-question knobs. They override pipeline defaults for one call only.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    pub top_k: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            temperature: 0.0,
            max_tokens: 512,
        }
    }
}

impl RunOptions {
    fn validate(&self) -> Result<(), PipelineError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(PipelineError::InvalidOptions(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(PipelineError::InvalidOptions("max_tokens must be > 0".into()));
        }
        Ok(())
    }
}

/// Answer plus every retrieved hit, best first. Only a leading prefix of
/// `sources` may fit the prompt's context budget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<SearchHit>,
    pub raw_metadata: Value,
}

/// Retrieval-augmented pipeline. Share behind `Arc`.
pub struct RagPipeline {
    store: Arc<VectorStore>,
    generator: Arc<dyn Generator>,
    max_context_chars: usize,
}

impl RagPipeline {
    pub fn new(store: Arc<VectorStore>, generator: Arc<dyn Generator>) -> Self {
        Self {
            store,
            generator,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }

    pub fn with_config(
        store: Arc<VectorStore>,
        generator: Arc<dyn Generator>,
        cfg: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            generator,
            max_context_chars: cfg.max_context_chars,
        }
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Retrieves `opts.top_k` hits for `query`, builds the prompt and asks
    /// the generator.
    ///
    /// Zero hits still reach the generator with an empty context. A generator
    /// failure is an error, never a retrieval-only answer.
    ///
    /// # Errors
    /// - `InvalidOptions` for out-of-range temperature or `max_tokens == 0`
    /// - `Retrieval` when the store fails
    /// - `GenerationUnavailable` when the generator fails
    pub async fn run(&self, query: &str, opts: RunOptions) -> Result<RagAnswer, PipelineError> {
        opts.validate()?;
        let started = Instant::now();

        let sources = self.store.search(query, opts.top_k).await?;
        debug!(target: "rag_pipeline::run", hits = sources.len(), top_k = opts.top_k, "retrieved");

        let (prompt, rendered) = build_prompt(query, &sources, self.max_context_chars);
        if rendered < sources.len() {
            debug!(
                target: "rag_pipeline::run",
                rendered,
                dropped = sources.len() - rendered,
                "context budget reached"
            );
        }
        let generation = self
            .generator
            .generate(
                &prompt,
                &sources[..rendered],
                GenerationParams {
                    temperature: opts.temperature,
                    max_tokens: opts.max_tokens,
                },
            )
            .await?;

        info!(
            target: "rag_pipeline::run",
            sources = sources.len(),
            answer_chars = generation.text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answer ready"
        );

        Ok(RagAnswer {
            answer: generation.text,
            sources,
            raw_metadata: generation.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::future::BoxFuture;
    use serde_json::json;
    use vector_store::IndexPolicy;
    use vector_store::testing::{MemoryBackend, StubEmbedder};

    use super::*;
    use crate::generator::Generation;

    #[derive(Default)]
    struct RecordingGenerator {
        fail: bool,
        seen: Mutex<Vec<(String, usize, GenerationParams)>>,
    }

    impl Generator for RecordingGenerator {
        fn generate<'a>(
            &'a self,
            prompt: &'a str,
            context_chunks: &'a [SearchHit],
            params: GenerationParams,
        ) -> BoxFuture<'a, Result<Generation, PipelineError>> {
            Box::pin(async move {
                self.seen
                    .lock()
                    .unwrap()
                    .push((prompt.to_string(), context_chunks.len(), params));
                if self.fail {
                    return Err(PipelineError::GenerationUnavailable("model offline".into()));
                }
                Ok(Generation {
                    text: "It appropriates funds.".into(),
                    metadata: json!({ "model": "stub", "completion_tokens": 4 }),
                })
            })
        }
    }

    async fn pipeline(generator: Arc<RecordingGenerator>) -> (RagPipeline, Arc<MemoryBackend>) {
        let embedder = Arc::new(
            StubEmbedder::new(3)
                .with_vector("cat", vec![1.0, 0.0, 0.0])
                .with_vector("feline", vec![0.9, 0.1, 0.0])
                .with_vector("dog", vec![0.0, 1.0, 0.0]),
        );
        let backend = Arc::new(MemoryBackend::dense());
        let store = VectorStore::from_parts(embedder, backend.clone(), "docs", IndexPolicy::Reuse)
            .await
            .unwrap();
        store
            .upsert(&[1, 2], &["cat".to_string(), "dog".to_string()])
            .await
            .unwrap();
        (RagPipeline::new(Arc::new(store), generator), backend)
    }

    #[tokio::test]
    async fn run_returns_answer_sources_and_metadata() {
        let generator = Arc::new(RecordingGenerator::default());
        let (p, _) = pipeline(generator.clone()).await;

        let out = p
            .run(
                "feline",
                RunOptions {
                    top_k: 1,
                    temperature: 0.3,
                    max_tokens: 64,
                },
            )
            .await
            .unwrap();

        assert_eq!(out.answer, "It appropriates funds.");
        assert_eq!(out.sources.len(), 1);
        assert_eq!(out.sources[0].id, 1);
        assert_eq!(out.raw_metadata["model"], "stub");

        let seen = generator.seen.lock().unwrap();
        let (prompt, chunks, params) = &seen[0];
        assert!(prompt.contains("[1] cat\n"));
        assert!(prompt.ends_with("Question: feline\nAnswer:"));
        assert_eq!(*chunks, 1);
        assert_eq!(params.temperature, 0.3);
        assert_eq!(params.max_tokens, 64);
    }

    #[tokio::test]
    async fn generator_sees_only_hits_that_fit_the_budget() {
        let generator = Arc::new(RecordingGenerator::default());
        let embedder = Arc::new(StubEmbedder::new(4));
        let backend = Arc::new(MemoryBackend::dense());
        let store = VectorStore::from_parts(embedder, backend, "docs", IndexPolicy::Reuse)
            .await
            .unwrap();
        let texts: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|c| format!("Section {c}: {}", c.repeat(40)))
            .collect();
        store.upsert(&[1, 2, 3], &texts).await.unwrap();

        let cfg = PipelineConfig {
            top_k: 3,
            max_context_chars: 60,
        };
        let p = RagPipeline::with_config(Arc::new(store), generator.clone(), &cfg);
        let out = p
            .run("Section", RunOptions { top_k: 3, ..RunOptions::default() })
            .await
            .unwrap();

        assert_eq!(out.sources.len(), 3);
        let seen = generator.seen.lock().unwrap();
        let (prompt, chunks, _) = &seen[0];
        assert_eq!(*chunks, 1);
        assert!(prompt.contains("[1] "));
        assert!(!prompt.contains("[2] "));
    }

    #[tokio::test]
    async fn zero_top_k_still_generates_with_empty_context() {
        let generator = Arc::new(RecordingGenerator::default());
        let (p, backend) = pipeline(generator.clone()).await;

        let out = p
            .run("feline", RunOptions { top_k: 0, ..RunOptions::default() })
            .await
            .unwrap();

        assert!(out.sources.is_empty());
        assert_eq!(backend.search_calls(), 0);
        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].0.contains("[1]"));
    }

    #[tokio::test]
    async fn generator_failure_is_not_swallowed() {
        let generator = Arc::new(RecordingGenerator {
            fail: true,
            ..Default::default()
        });
        let (p, _) = pipeline(generator).await;
        let err = p.run("cat", RunOptions::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::GenerationUnavailable(_)));
    }

    #[tokio::test]
    async fn retrieval_failure_skips_generation() {
        let generator = Arc::new(RecordingGenerator::default());
        let (p, backend) = pipeline(generator.clone()).await;
        backend.set_unavailable(true);

        let err = p.run("cat", RunOptions::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Retrieval(_)));
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_options_are_rejected_up_front() {
        let generator = Arc::new(RecordingGenerator::default());
        let (p, backend) = pipeline(generator.clone()).await;

        for opts in [
            RunOptions { temperature: 2.5, ..RunOptions::default() },
            RunOptions { temperature: f32::NAN, ..RunOptions::default() },
            RunOptions { max_tokens: 0, ..RunOptions::default() },
        ] {
            let err = p.run("cat", opts).await.unwrap_err();
            assert!(matches!(err, PipelineError::InvalidOptions(_)));
        }
        assert_eq!(backend.search_calls(), 0);
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn defaults_match_documented_values() {
        let o = RunOptions::default();
        assert_eq!((o.top_k, o.temperature, o.max_tokens), (5, 0.0, 512));
    }
}
