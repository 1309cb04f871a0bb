//! Lightweight Ollama service for text generation and embeddings.
//!
//! This module implements a thin client for the local Ollama API:
//! - `POST {endpoint}/api/generate`: synchronous text generation (`stream=false`)
//! - `POST {endpoint}/api/embed`: batch embeddings
//!
//! It uses the universal configuration [`LlmModelConfig`] and ensures
//! that the selected provider is [`LlmProvider::Ollama`].
//!
//! # Examples
//!
//! ```no_run
//! use ai_llm_service::{GenerateParams, LlmModelConfig, LlmProvider};
//! use ai_llm_service::services::ollama_service::OllamaService;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = LlmModelConfig {
//!     provider: LlmProvider::Ollama,
//!     model: "llama3.1:8b".into(),
//!     endpoint: "http://localhost:11434".into(),
//!     api_key: None,
//!     max_tokens: Some(256),
//!     temperature: Some(0.0),
//!     top_p: None,
//!     timeout_secs: Some(60),
//! };
//!
//! let svc = OllamaService::new(cfg)?;
//! let out = svc.generate("Summarize section 2.", None, GenerateParams::default()).await?;
//! println!("{}", out.text);
//! # Ok(()) }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{Provider, ProviderError, ProviderErrorKind, Result},
    services::{build_client, check_endpoint, ensure_success},
    types::{Completion, GenerateParams},
};

/// Thin client for Ollama.
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_generate: String,
    url_embed: String,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - [`ProviderErrorKind::InvalidProvider`] if `cfg.provider` is not `Ollama`
    /// - [`ProviderErrorKind::InvalidEndpoint`] if `cfg.endpoint` is invalid
    /// - transport error if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(ProviderError::new(Provider::Ollama, ProviderErrorKind::InvalidProvider).into());
        }
        check_endpoint(Provider::Ollama, &cfg.endpoint)?;

        let client = build_client(cfg.timeout_secs)?;
        let base = cfg.base_url().to_string();

        Ok(Self {
            client,
            url_generate: format!("{base}/api/generate"),
            url_embed: format!("{base}/api/embed"),
            cfg,
        })
    }

    /// Performs a **non-streaming** generation request via `/api/generate`.
    ///
    /// Mapped options:
    /// - `num_predict` ← `params.max_tokens` or profile default
    /// - `temperature` ← `params.temperature` or profile default
    /// - `top_p`       ← profile
    ///
    /// The returned metadata carries `model`, `provider`, `prompt_tokens`,
    /// `completion_tokens`, `total_duration_ns` and `done_reason` when Ollama
    /// reports them.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        params: GenerateParams,
    ) -> Result<Completion> {
        let body = GenerateRequest {
            model: &self.cfg.model,
            prompt,
            system,
            stream: false,
            options: GenerateOptions {
                temperature: params.temperature.or(self.cfg.temperature),
                top_p: self.cfg.top_p,
                num_predict: params.max_tokens.or(self.cfg.max_tokens),
            },
        };

        debug!("POST {}", self.url_generate);
        let resp = self.client.post(&self.url_generate).json(&body).send().await?;
        let resp = ensure_success(Provider::Ollama, &self.url_generate, resp).await?;

        let out: GenerateResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::Decode(format!("{e}; ensure `stream=false` is used")),
            )
        })?;

        let metadata = json!({
            "provider": LlmProvider::Ollama.as_str(),
            "model": out.model.unwrap_or_else(|| self.cfg.model.clone()),
            "prompt_tokens": out.prompt_eval_count,
            "completion_tokens": out.eval_count,
            "total_duration_ns": out.total_duration,
            "done_reason": out.done_reason,
        });

        Ok(Completion {
            text: out.response,
            metadata,
        })
    }

    /// Embeds a batch of inputs via `/api/embed`.
    ///
    /// Output order matches input order. An empty batch returns an empty
    /// vector without a request.
    #[instrument(skip_all, fields(model = %self.cfg.model, batch = inputs.len()))]
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbedRequest {
            model: &self.cfg.model,
            input: inputs,
        };

        debug!("POST {}", self.url_embed);
        let resp = self.client.post(&self.url_embed).json(&body).send().await?;
        let resp = ensure_success(Provider::Ollama, &self.url_embed, resp).await?;

        let out: EmbedResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::Decode(format!("{e}; expected `{{ embeddings: number[][] }}`")),
            )
        })?;

        if out.embeddings.len() != inputs.len() {
            return Err(ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::EmbeddingCount {
                    expected: inputs.len(),
                    got: out.embeddings.len(),
                },
            )
            .into());
        }
        Ok(out.embeddings)
    }
}

/* ==========================
HTTP payloads & options
========================== */

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

/// Subset of Ollama `options`.
#[derive(Debug, Default, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    done_reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(provider: LlmProvider, endpoint: &str) -> LlmModelConfig {
        LlmModelConfig {
            provider,
            model: "all-minilm".into(),
            endpoint: endpoint.into(),
            api_key: None,
            max_tokens: Some(64),
            temperature: Some(0.2),
            top_p: None,
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn rejects_foreign_provider_and_bad_endpoint() {
        assert!(OllamaService::new(cfg(LlmProvider::OpenAI, "http://x")).is_err());
        assert!(OllamaService::new(cfg(LlmProvider::Ollama, "ftp://x")).is_err());
    }

    #[test]
    fn urls_are_built_without_double_slash() {
        let svc = OllamaService::new(cfg(LlmProvider::Ollama, "http://localhost:11434/")).unwrap();
        assert_eq!(svc.url_generate, "http://localhost:11434/api/generate");
        assert_eq!(svc.url_embed, "http://localhost:11434/api/embed");
    }

    #[test]
    fn generate_request_prefers_per_call_params() {
        let body = GenerateRequest {
            model: "m",
            prompt: "p",
            system: None,
            stream: false,
            options: GenerateOptions {
                temperature: Some(0.0),
                top_p: None,
                num_predict: Some(512),
            },
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["options"]["num_predict"], 512);
        assert!(v.get("system").is_none());
        assert!(v["options"].get("top_p").is_none());
    }

    #[test]
    fn generate_response_tolerates_missing_counters() {
        let out: GenerateResponse = serde_json::from_str(r#"{"response":"ok","done":true}"#).unwrap();
        assert_eq!(out.response, "ok");
        assert!(out.eval_count.is_none());
    }

    #[tokio::test]
    async fn empty_batch_skips_request() {
        let svc = OllamaService::new(cfg(LlmProvider::Ollama, "http://127.0.0.1:9")).unwrap();
        assert!(svc.embed_batch(&[]).await.unwrap().is_empty());
    }
}
