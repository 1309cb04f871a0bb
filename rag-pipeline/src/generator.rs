//! Generator capability and its LLM-backed implementation.

use std::sync::Arc;

use ai_llm_service::{GenerateParams, LlmServiceProfiles};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use vector_store::SearchHit;

use crate::error::PipelineError;

/// Per-call sampling parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Generated text plus provider metadata (model, usage, finish reason).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub metadata: Value,
}

/// Anything that turns a prompt into an answer.
///
/// `context_chunks` are the hits rendered into `prompt`, possibly fewer than
/// were retrieved when the context budget runs out. They are
/// passed separately for generators that cite or post-process sources.
pub trait Generator: Send + Sync {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        context_chunks: &'a [SearchHit],
        params: GenerationParams,
    ) -> BoxFuture<'a, Result<Generation, PipelineError>>;
}

/// [`Generator`] over the generation profile of [`LlmServiceProfiles`].
pub struct LlmGenerator {
    svc: Arc<LlmServiceProfiles>,
}

impl LlmGenerator {
    /// Fails with `GenerationUnavailable` when `svc` has no generation profile.
    pub fn new(svc: Arc<LlmServiceProfiles>) -> Result<Self, PipelineError> {
        if svc.generation_profile().is_none() {
            return Err(PipelineError::GenerationUnavailable(
                "no generation profile configured (set LLM_MODEL)".into(),
            ));
        }
        Ok(Self { svc })
    }
}

impl Generator for LlmGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        context_chunks: &'a [SearchHit],
        params: GenerationParams,
    ) -> BoxFuture<'a, Result<Generation, PipelineError>> {
        Box::pin(async move {
            debug!(
                target: "rag_pipeline::generate",
                prompt_chars = prompt.len(),
                chunks = context_chunks.len(),
                temperature = params.temperature,
                max_tokens = params.max_tokens,
                "calling generation model"
            );
            let out = self
                .svc
                .generate(
                    prompt,
                    None,
                    GenerateParams {
                        temperature: Some(params.temperature),
                        max_tokens: Some(params.max_tokens),
                    },
                )
                .await
                .map_err(|e| {
                    warn!(target: "rag_pipeline::generate", error = %e, "generation failed");
                    PipelineError::from(e)
                })?;

            Ok(Generation {
                text: out.text,
                metadata: out.metadata,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_llm_service::{LlmModelConfig, LlmProvider};

    fn embedding_only() -> Arc<LlmServiceProfiles> {
        let cfg = LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "all-minilm".into(),
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: Some(5),
        };
        Arc::new(LlmServiceProfiles::new(cfg, None, None).unwrap())
    }

    #[test]
    fn requires_a_generation_profile() {
        let err = LlmGenerator::new(embedding_only()).err();
        assert!(matches!(err, Some(PipelineError::GenerationUnavailable(_))));
    }
}
