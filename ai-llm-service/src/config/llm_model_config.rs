use crate::config::llm_provider::LlmProvider;

/// Configuration for one LLM profile (generation or embedding).
///
/// `temperature` and `max_tokens` are profile defaults; callers can override
/// them per request through [`crate::GenerateParams`].
///
/// # Examples
///
/// ```
/// use ai_llm_service::{LlmModelConfig, LlmProvider};
///
/// let cfg = LlmModelConfig {
///     provider: LlmProvider::Ollama,
///     model: "all-minilm".to_string(),
///     endpoint: "http://localhost:11434".to_string(),
///     api_key: None,
///     max_tokens: None,
///     temperature: Some(0.0),
///     top_p: None,
///     timeout_secs: Some(30),
/// };
/// assert_eq!(cfg.provider, LlmProvider::Ollama);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModelConfig {
    /// The LLM provider/backend.
    pub provider: LlmProvider,

    /// Model identifier string (e.g., `"llama3.1:8b"`, `"text-embedding-3-small"`).
    pub model: String,

    /// Base URL of the provider API.
    pub endpoint: String,

    /// Optional API key (required for OpenAI).
    pub api_key: Option<String>,

    /// Default maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Default sampling temperature.
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,

    /// Request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Base endpoint without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim().trim_end_matches('/')
    }
}
