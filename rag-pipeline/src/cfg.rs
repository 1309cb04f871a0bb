//! Runtime configuration loaded from environment variables.

use crate::error::PipelineError;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8000;

/// Pipeline knobs. All fields have defaults via [`PipelineConfig::from_env`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Default number of hits retrieved per question (`RAG_TOP_K`).
    pub top_k: usize,
    /// Cap on the context block of the prompt (`RAG_MAX_CONTEXT_CHARS`).
    pub max_context_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(&|k| std::env::var(k).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, PipelineError> {
        let d = Self::default();
        Ok(Self {
            top_k: parse(lookup, "RAG_TOP_K")?.unwrap_or(d.top_k),
            max_context_chars: parse(lookup, "RAG_MAX_CONTEXT_CHARS")?
                .unwrap_or(d.max_context_chars),
        })
    }
}

fn parse(lookup: &dyn Fn(&str) -> Option<String>, k: &str) -> Result<Option<usize>, PipelineError> {
    match lookup(k).filter(|v| !v.trim().is_empty()) {
        Some(v) => v
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| PipelineError::InvalidOptions(format!("{k}='{v}': {e}"))),
        None => Ok(None),
    }
}
