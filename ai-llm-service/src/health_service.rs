//! Health probes for LLM backends (Ollama, OpenAI).
//!
//! - Ollama: `GET {endpoint}/api/tags`
//! - OpenAI: `GET {endpoint}/v1/models` with Bearer auth
//!
//! [`HealthService::check`] never fails (errors become `ok=false`) and is used
//! by the `health` command. [`HealthService::require_model`] is strict and is
//! used at startup to refuse a profile whose model the provider does not serve.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{AiLlmError, HealthError, make_snippet};

/// A serializable health snapshot for a single provider/config.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub ok: bool,
    pub latency_ms: u128,
    pub message: String,
}

/// Raw result of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPresence {
    Listed,
    Missing,
    /// The listing could not be decoded; the server itself answered.
    Unknown,
}

/// A health checker that reuses a single HTTP client.
pub struct HealthService {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HealthService {
    /// Creates a new health service with an optional client timeout (seconds).
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, AiLlmError> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(10));
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// Resilient check for a single profile.
    pub async fn check(&self, cfg: &LlmModelConfig) -> HealthStatus {
        let start = Instant::now();
        let (ok, message) = match self.probe(cfg).await {
            Ok(ModelPresence::Listed) => (true, "healthy; model is available".to_string()),
            Ok(ModelPresence::Missing) => (false, "reachable, but model is not listed".to_string()),
            Ok(ModelPresence::Unknown) => (true, "reachable; model list not decodable".to_string()),
            Err(e) => (false, e.to_string()),
        };
        let status = HealthStatus {
            provider: cfg.provider.as_str().to_string(),
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            ok,
            latency_ms: start.elapsed().as_millis(),
            message,
        };
        if status.ok {
            info!(provider = %status.provider, model = %status.model, latency_ms = status.latency_ms, "health probe completed");
        } else {
            warn!(provider = %status.provider, model = %status.model, message = %status.message, "health probe failed");
        }
        status
    }

    /// Checks several profiles sequentially.
    pub async fn check_many(&self, configs: &[LlmModelConfig]) -> Vec<HealthStatus> {
        let mut out = Vec::with_capacity(configs.len());
        for cfg in configs {
            out.push(self.check(cfg).await);
        }
        out
    }

    /// Strict probe: errors unless the provider is reachable and lists the model.
    ///
    /// An undecodable listing is accepted; the first real call will surface
    /// any problem.
    pub async fn require_model(&self, cfg: &LlmModelConfig) -> Result<(), AiLlmError> {
        match self.probe(cfg).await? {
            ModelPresence::Listed | ModelPresence::Unknown => Ok(()),
            ModelPresence::Missing => Err(HealthError::ModelNotFound {
                provider: cfg.provider.as_str(),
                model: cfg.model.clone(),
            }
            .into()),
        }
    }

    async fn probe(&self, cfg: &LlmModelConfig) -> Result<ModelPresence, AiLlmError> {
        let endpoint = cfg.base_url();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(HealthError::InvalidEndpoint(cfg.endpoint.clone()).into());
        }
        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let (url, req) = match cfg.provider {
            LlmProvider::Ollama => {
                let url = format!("{endpoint}/api/tags");
                let req = self.client.get(&url);
                (url, req)
            }
            LlmProvider::OpenAI => {
                let url = format!("{endpoint}/v1/models");
                let key = cfg.api_key.as_deref().ok_or_else(|| {
                    HealthError::Decode("missing OpenAI API key".into())
                })?;
                let req = self
                    .client
                    .get(&url)
                    .header(header::AUTHORIZATION, format!("Bearer {key}"));
                (url, req)
            }
        };

        debug!(provider = cfg.provider.as_str(), model = %cfg.model, "GET {}", url);
        let resp = req.timeout(timeout).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(HealthError::HttpStatus {
                status,
                url,
                snippet: make_snippet(&text, 240),
            }
            .into());
        }

        let body = resp.text().await?;
        Ok(model_presence(cfg.provider, &body, &cfg.model))
    }
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaTag>,
}

#[derive(Deserialize)]
struct OllamaTag {
    name: String,
}

#[derive(Deserialize)]
struct OpenAiModels {
    data: Vec<OpenAiModel>,
}

#[derive(Deserialize)]
struct OpenAiModel {
    id: String,
}

/// Decides whether `model` appears in a provider listing body.
///
/// Ollama tags carry an implicit `:latest`, so `all-minilm` matches
/// `all-minilm:latest`.
pub fn model_presence(provider: LlmProvider, body: &str, model: &str) -> ModelPresence {
    let names: Vec<String> = match provider {
        LlmProvider::Ollama => match serde_json::from_str::<OllamaTags>(body) {
            Ok(t) => t.models.into_iter().map(|m| m.name).collect(),
            Err(_) => return ModelPresence::Unknown,
        },
        LlmProvider::OpenAI => match serde_json::from_str::<OpenAiModels>(body) {
            Ok(m) => m.data.into_iter().map(|m| m.id).collect(),
            Err(_) => return ModelPresence::Unknown,
        },
    };

    let wanted = model.trim();
    let listed = names.iter().any(|n| {
        n == wanted
            || (provider == LlmProvider::Ollama
                && !wanted.contains(':')
                && n.strip_suffix(":latest") == Some(wanted))
    });
    if listed {
        ModelPresence::Listed
    } else {
        ModelPresence::Missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_latest_tag_matches_bare_name() {
        let body = r#"{"models":[{"name":"all-minilm:latest"},{"name":"llama3.1:8b"}]}"#;
        assert_eq!(
            model_presence(LlmProvider::Ollama, body, "all-minilm"),
            ModelPresence::Listed
        );
        assert_eq!(
            model_presence(LlmProvider::Ollama, body, "llama3.1:70b"),
            ModelPresence::Missing
        );
    }

    #[test]
    fn openai_listing_requires_exact_id() {
        let body = r#"{"object":"list","data":[{"id":"text-embedding-3-small"}]}"#;
        assert_eq!(
            model_presence(LlmProvider::OpenAI, body, "text-embedding-3-small"),
            ModelPresence::Listed
        );
        assert_eq!(
            model_presence(LlmProvider::OpenAI, body, "text-embedding-3-large"),
            ModelPresence::Missing
        );
    }

    #[test]
    fn garbage_listing_is_unknown() {
        assert_eq!(
            model_presence(LlmProvider::OpenAI, "<html>", "x"),
            ModelPresence::Unknown
        );
    }
}
