//! Shared LLM access for the search backend.
//!
//! Two logical profiles are exposed through [`service_profiles::LlmServiceProfiles`]:
//! - **generation** → answer synthesis (Ollama `/api/generate` or OpenAI chat)
//! - **embedding**  → batch embeddings (Ollama `/api/embed` or OpenAI `/v1/embeddings`)
//!
//! Configuration is read from environment variables (see [`config::default_config`]),
//! errors are unified under [`error_handler::AiLlmError`], and provider health is
//! probed via [`health_service::HealthService`].

pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod service_profiles;
pub mod services;
pub mod telemetry;
pub mod types;

pub use config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
pub use error_handler::{AiLlmError, Result};
pub use service_profiles::LlmServiceProfiles;
pub use types::{Completion, GenerateParams};
