//! Request/response types shared by all provider clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-request overrides for generation.
///
/// `None` falls back to the profile default from [`crate::LlmModelConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Generated text plus provider-reported metadata (model, token usage, timings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub metadata: Value,
}
