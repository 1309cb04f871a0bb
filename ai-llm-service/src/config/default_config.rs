//! Default LLM configs loaded from environment variables.
//!
//! Two roles are supported:
//!
//! - **Generation** → answer synthesis for the RAG pipeline
//! - **Embedding**  → vector encoding for indexing and querying
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND`         = provider kind (`ollama` | `openai`, default `ollama`)
//! - `LLM_MODEL`        = generation model (mandatory)
//! - `LLM_MAX_TOKENS`   = optional default max tokens (u32)
//! - `LLM_TIMEOUT_SECS` = optional generation timeout (default 120)
//! - `EMBEDDING_MODEL`  = embedding model (default `all-minilm` / `text-embedding-3-small`)
//!
//! Ollama-specific:
//! - `OLLAMA_URL` or `OLLAMA_PORT` = endpoint (mandatory for Ollama)
//!
//! OpenAI-specific:
//! - `OPENAI_URL`     = endpoint (default `https://api.openai.com`)
//! - `OPENAI_API_KEY` = API key (mandatory for OpenAI)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, ConfigError, validate_http_endpoint},
};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "all-minilm";
const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Constructs the **generation** profile from the process environment.
///
/// # Defaults
/// - `temperature = Some(0.0)` (callers override per request)
/// - `timeout_secs = Some(120)`
pub fn config_generation() -> Result<LlmModelConfig, AiLlmError> {
    config_generation_from(&|k| std::env::var(k).ok())
}

/// Constructs the **embedding** profile from the process environment.
///
/// # Defaults
/// - `temperature = Some(0.0)` (deterministic)
/// - `timeout_secs = Some(30)`
pub fn config_embedding() -> Result<LlmModelConfig, AiLlmError> {
    config_embedding_from(&|k| std::env::var(k).ok())
}

/// Same as [`config_generation`], reading variables through `lookup`.
pub fn config_generation_from(
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<LlmModelConfig, AiLlmError> {
    let provider = provider(lookup)?;
    let (endpoint, api_key) = endpoint_and_key(provider, lookup)?;
    let model = required(lookup, "LLM_MODEL")?;
    let max_tokens = opt_u32(lookup, "LLM_MAX_TOKENS")?;
    let timeout_secs = opt_u32(lookup, "LLM_TIMEOUT_SECS")?.map(u64::from).unwrap_or(120);

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        api_key,
        max_tokens,
        temperature: Some(0.0),
        top_p: None,
        timeout_secs: Some(timeout_secs),
    })
}

/// Same as [`config_embedding`], reading variables through `lookup`.
pub fn config_embedding_from(
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<LlmModelConfig, AiLlmError> {
    let provider = provider(lookup)?;
    let (endpoint, api_key) = endpoint_and_key(provider, lookup)?;
    let model = non_empty(lookup, "EMBEDDING_MODEL").unwrap_or_else(|| {
        match provider {
            LlmProvider::Ollama => DEFAULT_OLLAMA_EMBEDDING_MODEL,
            LlmProvider::OpenAI => DEFAULT_OPENAI_EMBEDDING_MODEL,
        }
        .to_string()
    });

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        api_key,
        max_tokens: None,
        temperature: Some(0.0),
        top_p: None,
        timeout_secs: Some(30),
    })
}

fn provider(lookup: &dyn Fn(&str) -> Option<String>) -> Result<LlmProvider, AiLlmError> {
    match non_empty(lookup, "LLM_KIND") {
        Some(kind) => Ok(kind.parse::<LlmProvider>()?),
        None => Ok(LlmProvider::Ollama),
    }
}

fn endpoint_and_key(
    provider: LlmProvider,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<(String, Option<String>), AiLlmError> {
    match provider {
        LlmProvider::Ollama => Ok((ollama_endpoint(lookup)?, None)),
        LlmProvider::OpenAI => {
            let url = non_empty(lookup, "OPENAI_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.into());
            validate_http_endpoint("OPENAI_URL", &url)?;
            let key = required(lookup, "OPENAI_API_KEY")?;
            Ok((url, Some(key)))
        }
    }
}

/// Resolves the Ollama endpoint.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
fn ollama_endpoint(lookup: &dyn Fn(&str) -> Option<String>) -> Result<String, AiLlmError> {
    if let Some(url) = non_empty(lookup, "OLLAMA_URL") {
        validate_http_endpoint("OLLAMA_URL", &url)?;
        return Ok(url);
    }
    if let Some(port) = non_empty(lookup, "OLLAMA_PORT") {
        port.trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidNumber {
                var: "OLLAMA_PORT",
                reason: "expected u16 (1..=65535)",
            })?;
        return Ok(format!("http://localhost:{}", port.trim()));
    }
    Err(ConfigError::MissingVar("OLLAMA_URL or OLLAMA_PORT").into())
}

fn non_empty(lookup: &dyn Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.trim().is_empty())
}

fn required(
    lookup: &dyn Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, AiLlmError> {
    non_empty(lookup, name).ok_or_else(|| ConfigError::MissingVar(name).into())
}

fn opt_u32(
    lookup: &dyn Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<u32>, AiLlmError> {
    match non_empty(lookup, name) {
        Some(v) => v.trim().parse::<u32>().map(Some).map_err(|_| {
            ConfigError::InvalidNumber {
                var: name,
                reason: "expected u32",
            }
            .into()
        }),
        None => Ok(None),
    }
}
