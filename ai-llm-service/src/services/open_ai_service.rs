//! OpenAI-compatible service for text generation and embeddings.
//!
//! Minimal, non-streaming client around the OpenAI REST API.
//! Endpoints are derived from `LlmModelConfig::endpoint`:
//! - POST {endpoint}/v1/chat/completions: chat completion
//! - POST {endpoint}/v1/embeddings: batch embeddings
//!
//! Constructor validation:
//! - `cfg.provider` must be `LlmProvider::OpenAI`
//! - `cfg.api_key` must be present
//! - `cfg.endpoint` must start with http:// or https://

use std::time::Instant;

use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, Provider, ProviderError, ProviderErrorKind},
    services::{build_client, check_endpoint, ensure_success},
    types::{Completion, GenerateParams},
};

/// Thin client for the OpenAI API.
///
/// High-level operations:
/// - [`OpenAiService::generate`]: single, non-streaming chat completion
/// - [`OpenAiService::embed_batch`]: embeddings for many inputs in one call
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    auth: header::HeaderValue,
    url_chat: String,
    url_embeddings: String,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`] from the given config.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not OpenAI
    /// - `MissingApiKey` if `cfg.api_key` is `None`
    /// - `InvalidEndpoint` if `cfg.endpoint` is invalid
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::OpenAI {
            return Err(
                ProviderError::new(Provider::OpenAI, ProviderErrorKind::InvalidProvider).into(),
            );
        }

        let api_key = cfg.api_key.clone().ok_or_else(|| {
            ProviderError::new(Provider::OpenAI, ProviderErrorKind::MissingApiKey)
        })?;

        check_endpoint(Provider::OpenAI, &cfg.endpoint)?;

        let auth = bearer_header(&api_key)?;
        let client = build_client(cfg.timeout_secs)?;

        let base = cfg.base_url().to_string();
        let url_chat = format!("{base}/v1/chat/completions");
        let url_embeddings = format!("{base}/v1/embeddings");

        info!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = cfg.timeout_secs.unwrap_or(60),
            "OpenAiService initialized"
        );

        Ok(Self {
            client,
            cfg,
            auth,
            url_chat,
            url_embeddings,
        })
    }

    /// Performs a **non-streaming** chat completion request.
    ///
    /// Messages: optional system message, then the user `prompt`.
    /// Metadata carries `model`, `provider`, `finish_reason` and token usage.
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        params: GenerateParams,
    ) -> Result<Completion, AiLlmError> {
        let started = Instant::now();
        let body = ChatCompletionRequest::new(&self.cfg, prompt, system, params);

        debug!(
            model = %self.cfg.model,
            prompt_len = prompt.len(),
            has_system = system.is_some(),
            "POST {}", self.url_chat
        );

        let resp = self
            .client
            .post(&self.url_chat)
            .header(header::AUTHORIZATION, self.auth.clone())
            .json(&body)
            .send()
            .await?;
        let resp = ensure_success(Provider::OpenAI, &self.url_chat, resp)
            .await
            .inspect_err(|e| {
                error!(
                    error = %e,
                    model = %self.cfg.model,
                    latency_ms = started.elapsed().as_millis(),
                    "OpenAI /v1/chat/completions returned non-success status"
                )
            })?;

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::OpenAI,
                ProviderErrorKind::Decode(format!(
                    "{e}; expected `choices[0].message.content`"
                )),
            )
        })?;

        let choice = out
            .choices
            .into_iter()
            .find(|c| c.message.content.is_some())
            .ok_or_else(|| ProviderError::new(Provider::OpenAI, ProviderErrorKind::EmptyChoices))?;

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            "chat completion completed"
        );

        let metadata = json!({
            "provider": LlmProvider::OpenAI.as_str(),
            "model": out.model.unwrap_or_else(|| self.cfg.model.clone()),
            "finish_reason": choice.finish_reason,
            "prompt_tokens": out.usage.as_ref().map(|u| u.prompt_tokens),
            "completion_tokens": out.usage.as_ref().map(|u| u.completion_tokens),
            "total_tokens": out.usage.as_ref().map(|u| u.total_tokens),
        });

        Ok(Completion {
            text: choice.message.content.unwrap_or_default(),
            metadata,
        })
    }

    /// Embeds a batch of inputs via `/v1/embeddings`.
    ///
    /// The API may return items out of order; they are re-sorted by `index`.
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            input: inputs,
        };

        debug!(model = %self.cfg.model, batch = inputs.len(), "POST {}", self.url_embeddings);

        let resp = self
            .client
            .post(&self.url_embeddings)
            .header(header::AUTHORIZATION, self.auth.clone())
            .json(&body)
            .send()
            .await?;
        let resp = ensure_success(Provider::OpenAI, &self.url_embeddings, resp).await?;

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::OpenAI,
                ProviderErrorKind::Decode(format!("{e}; expected `data[].embedding`")),
            )
        })?;

        let vectors = order_embeddings(out.data, inputs.len())?;

        debug!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            "embeddings completed"
        );
        Ok(vectors)
    }
}

fn bearer_header(api_key: &str) -> Result<header::HeaderValue, AiLlmError> {
    let mut value = header::HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
        ProviderError::new(
            Provider::OpenAI,
            ProviderErrorKind::Decode(format!("invalid API key header: {e}")),
        )
    })?;
    value.set_sensitive(true);
    Ok(value)
}

fn order_embeddings(
    mut data: Vec<EmbeddingItem>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, AiLlmError> {
    if data.len() != expected {
        return Err(ProviderError::new(
            Provider::OpenAI,
            ProviderErrorKind::EmbeddingCount {
                expected,
                got: data.len(),
            },
        )
        .into());
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/* ===========================================================================
HTTP payloads & options
======================================================================== */

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatCompletionRequest<'a> {
    fn new(
        cfg: &'a LlmModelConfig,
        prompt: &'a str,
        system: Option<&'a str>,
        params: GenerateParams,
    ) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(ChatMessage {
                role: "system",
                content: sys,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        Self {
            model: &cfg.model,
            messages,
            temperature: params.temperature.or(cfg.temperature),
            top_p: cfg.top_p,
            max_tokens: params.max_tokens.or(cfg.max_tokens),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
