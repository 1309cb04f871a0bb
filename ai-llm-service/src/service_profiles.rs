//! Shared LLM service with two profiles: `generation` and `embedding`.
//!
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Provider clients are built eagerly, so a bad profile fails at startup.
//! - The generation profile is optional: ingest/search commands only need
//!   embeddings.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use ai_llm_service::{GenerateParams, LlmServiceProfiles};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let svc = Arc::new(LlmServiceProfiles::from_env(true)?);
//! let vectors = svc.embed_batch(&["Ferris".to_string()]).await?;
//! let out = svc.generate("Hello", None, GenerateParams::default()).await?;
//! println!("{} dims, answer: {}", vectors[0].len(), out.text);
//! # Ok(()) }
//! ```

use tracing::info;

use crate::{
    config::{
        default_config::{config_embedding, config_generation},
        llm_model_config::LlmModelConfig,
    },
    error_handler::{AiLlmError, ConfigError},
    health_service::{HealthService, HealthStatus},
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService},
    types::{Completion, GenerateParams},
};

enum Client {
    Ollama(OllamaService),
    OpenAI(OpenAiService),
}

impl Client {
    fn new(cfg: &LlmModelConfig) -> Result<Self, AiLlmError> {
        Ok(match cfg.provider {
            crate::LlmProvider::Ollama => Client::Ollama(OllamaService::new(cfg.clone())?),
            crate::LlmProvider::OpenAI => Client::OpenAI(OpenAiService::new(cfg.clone())?),
        })
    }
}

/// Generation + embedding profiles with their provider clients.
pub struct LlmServiceProfiles {
    generation: Option<(LlmModelConfig, Client)>,
    embedding: (LlmModelConfig, Client),
    health: HealthService,
}

impl LlmServiceProfiles {
    /// Builds clients for both profiles.
    ///
    /// # Errors
    /// Returns [`AiLlmError`] if either profile is invalid for its provider
    /// (missing key, bad endpoint, empty model).
    pub fn new(
        embedding: LlmModelConfig,
        generation: Option<LlmModelConfig>,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self, AiLlmError> {
        if embedding.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }
        let generation = match generation {
            Some(cfg) => {
                if cfg.model.trim().is_empty() {
                    return Err(ConfigError::EmptyModel.into());
                }
                let client = Client::new(&cfg)?;
                Some((cfg, client))
            }
            None => None,
        };
        let embedding_client = Client::new(&embedding)?;

        info!(
            embedding_model = %embedding.model,
            generation_model = generation.as_ref().map(|(c, _)| c.model.as_str()).unwrap_or("n/a"),
            "LLM profiles initialized"
        );

        Ok(Self {
            generation,
            embedding: (embedding, embedding_client),
            health: HealthService::new(health_timeout_secs)?,
        })
    }

    /// Loads profiles from the environment. When `with_generation` is false
    /// `LLM_MODEL` is not required.
    pub fn from_env(with_generation: bool) -> Result<Self, AiLlmError> {
        let embedding = config_embedding()?;
        let generation = if with_generation {
            Some(config_generation()?)
        } else {
            None
        };
        Self::new(embedding, generation, None)
    }

    /// Generates text using the **generation** profile.
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        params: GenerateParams,
    ) -> Result<Completion, AiLlmError> {
        let (_, client) = self
            .generation
            .as_ref()
            .ok_or(ConfigError::MissingVar("LLM_MODEL"))?;
        match client {
            Client::Ollama(c) => c.generate(prompt, system, params).await,
            Client::OpenAI(c) => c.generate(prompt, system, params).await,
        }
    }

    /// Embeds a batch of inputs using the **embedding** profile.
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        match &self.embedding.1 {
            Client::Ollama(c) => c.embed_batch(inputs).await,
            Client::OpenAI(c) => c.embed_batch(inputs).await,
        }
    }

    /// Strict check that the embedding model is served by its provider.
    pub async fn require_embedding_model(&self) -> Result<(), AiLlmError> {
        self.health.require_model(&self.embedding.0).await
    }

    /// Strict check for the generation model; a no-op without a generation profile.
    pub async fn require_generation_model(&self) -> Result<(), AiLlmError> {
        match &self.generation {
            Some((cfg, _)) => self.health.require_model(cfg).await,
            None => Ok(()),
        }
    }

    /// Health snapshot for all distinct profiles.
    pub async fn health_all(&self) -> Vec<HealthStatus> {
        let mut list = vec![self.embedding.0.clone()];
        if let Some((cfg, _)) = &self.generation {
            if *cfg != self.embedding.0 {
                list.push(cfg.clone());
            }
        }
        self.health.check_many(&list).await
    }

    pub fn embedding_profile(&self) -> &LlmModelConfig {
        &self.embedding.0
    }

    pub fn generation_profile(&self) -> Option<&LlmModelConfig> {
        self.generation.as_ref().map(|(c, _)| c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LlmProvider;

    fn ollama(model: &str) -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: model.into(),
            endpoint: "http://127.0.0.1:11434".into(),
            api_key: None,
            max_tokens: None,
            temperature: Some(0.0),
            top_p: None,
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn empty_model_is_rejected() {
        let err = LlmServiceProfiles::new(ollama(" "), None, None).err();
        assert!(matches!(err, Some(AiLlmError::Config(ConfigError::EmptyModel))));
    }

    #[tokio::test]
    async fn generation_without_profile_reports_missing_model() {
        let svc = LlmServiceProfiles::new(ollama("all-minilm"), None, None).unwrap();
        let err = svc
            .generate("q", None, GenerateParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AiLlmError::Config(ConfigError::MissingVar("LLM_MODEL"))));
        assert!(svc.generation_profile().is_none());
    }
}
