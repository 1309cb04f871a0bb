//! Runtime and index configuration.
//!
//! Settings come from environment variables and are exposed as strongly typed
//! structs. Backend selection is parsed first so an unknown backend fails
//! before anything touches the network.

use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::errors::VectorStoreError;

/// Closed set of supported index backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Dense-vector-native store (Qdrant).
    Dense,
    /// Text-search engine with scripted cosine scoring (OpenSearch).
    TextSearch,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Dense => "dense",
            BackendKind::TextSearch => "textsearch",
        }
    }
}

impl FromStr for BackendKind {
    type Err = VectorStoreError;

    /// Case-insensitive; accepts engine names as aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dense" | "qdrant" => Ok(BackendKind::Dense),
            "textsearch" | "text-search" | "opensearch" => Ok(BackendKind::TextSearch),
            _ => Err(VectorStoreError::UnsupportedBackend(s.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `ensure_index` does when the index already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexPolicy {
    /// Keep existing data; verify the stored dimension.
    #[default]
    Reuse,
    /// Drop and create. Destroys prior contents.
    Recreate,
}

impl FromStr for IndexPolicy {
    type Err = VectorStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reuse" => Ok(IndexPolicy::Reuse),
            "recreate" => Ok(IndexPolicy::Recreate),
            other => Err(VectorStoreError::Config(format!(
                "INDEX_POLICY must be 'reuse' or 'recreate', got '{other}'"
            ))),
        }
    }
}

/// Qdrant connectivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantSettings {
    /// gRPC URL, e.g. `http://localhost:6334`.
    pub url: String,
    /// Optional API key for Qdrant Cloud.
    pub api_key: Option<String>,
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
        }
    }
}

/// OpenSearch connectivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSearchSettings {
    /// REST URL, e.g. `http://localhost:9200`.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// `refresh` parameter for bulk writes (`true` | `false` | `wait_for`).
    pub refresh: String,
}

impl Default for OpenSearchSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            refresh: "wait_for".to_string(),
        }
    }
}

/// Top-level configuration for a [`crate::VectorStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub backend: BackendKind,
    /// Index / collection name.
    pub index: String,
    pub policy: IndexPolicy,
    /// Entries per backend bulk request (typical range: 128..512).
    pub upsert_batch: usize,
    /// Per-request timeout for backend calls.
    pub timeout: Duration,
    /// Expected embedding dimension; checked against the model when set.
    pub embedding_dim: Option<usize>,
    pub qdrant: QdrantSettings,
    pub opensearch: OpenSearchSettings,
}

impl VectorStoreConfig {
    /// Creates a sane default config for a given backend and index.
    pub fn new_default(backend: BackendKind, index: impl Into<String>) -> Self {
        Self {
            backend,
            index: index.into(),
            policy: IndexPolicy::Reuse,
            upsert_batch: 256,
            timeout: Duration::from_secs(30),
            embedding_dim: None,
            qdrant: QdrantSettings::default(),
            opensearch: OpenSearchSettings::default(),
        }
    }

    /// Build configuration from environment variables.
    ///
    /// Environment variables used:
    /// - `VECTOR_BACKEND` (`dense` | `textsearch`; default: `dense`)
    /// - `VECTOR_INDEX` (default: `documents`)
    /// - `INDEX_POLICY` (`reuse` | `recreate`; default: `reuse`)
    /// - `UPSERT_BATCH` (default: 256)
    /// - `BACKEND_TIMEOUT_SECS` (default: 30)
    /// - `EMBEDDING_DIM` (optional)
    /// - `QDRANT_URL` (default: `http://localhost:6334`), `QDRANT_API_KEY`
    /// - `OPENSEARCH_URL` (default: `http://localhost:9200`), `OPENSEARCH_USER`,
    ///   `OPENSEARCH_PASSWORD`, `OPENSEARCH_REFRESH` (default: `wait_for`)
    pub fn from_env() -> Result<Self, VectorStoreError> {
        Self::from_lookup(&|k| std::env::var(k).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, VectorStoreError> {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        let backend = match get("VECTOR_BACKEND") {
            Some(v) => v.parse::<BackendKind>()?,
            None => BackendKind::Dense,
        };
        let policy = match get("INDEX_POLICY") {
            Some(v) => v.parse::<IndexPolicy>()?,
            None => IndexPolicy::Reuse,
        };

        let cfg = Self {
            backend,
            index: get("VECTOR_INDEX").unwrap_or_else(|| "documents".into()),
            policy,
            upsert_batch: read_usize(lookup, "UPSERT_BATCH")?.unwrap_or(256),
            timeout: Duration::from_secs(
                read_usize(lookup, "BACKEND_TIMEOUT_SECS")?.unwrap_or(30) as u64,
            ),
            embedding_dim: read_usize(lookup, "EMBEDDING_DIM")?,
            qdrant: QdrantSettings {
                url: get("QDRANT_URL").unwrap_or_else(|| QdrantSettings::default().url),
                api_key: get("QDRANT_API_KEY"),
            },
            opensearch: OpenSearchSettings {
                url: get("OPENSEARCH_URL").unwrap_or_else(|| OpenSearchSettings::default().url),
                username: get("OPENSEARCH_USER"),
                password: get("OPENSEARCH_PASSWORD"),
                refresh: get("OPENSEARCH_REFRESH").unwrap_or_else(|| "wait_for".into()),
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), VectorStoreError> {
        if self.index.trim().is_empty() {
            return Err(VectorStoreError::Config("index name is empty".into()));
        }
        if self.upsert_batch == 0 {
            return Err(VectorStoreError::Config("upsert_batch must be > 0".into()));
        }
        if self.timeout.is_zero() {
            return Err(VectorStoreError::Config("backend timeout must be > 0".into()));
        }
        if self.embedding_dim == Some(0) {
            return Err(VectorStoreError::Config("EMBEDDING_DIM must be > 0".into()));
        }
        let url = match self.backend {
            BackendKind::Dense => &self.qdrant.url,
            BackendKind::TextSearch => &self.opensearch.url,
        };
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(VectorStoreError::Config(format!(
                "{} backend url must start with http:// or https://, got '{url}'",
                self.backend
            )));
        }
        if !matches!(self.opensearch.refresh.as_str(), "true" | "false" | "wait_for") {
            return Err(VectorStoreError::Config(
                "OPENSEARCH_REFRESH must be true, false or wait_for".into(),
            ));
        }
        Ok(())
    }
}

/// Read an optional `usize` from the lookup.
fn read_usize(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<usize>, VectorStoreError> {
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(v) => v
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| VectorStoreError::Config(format!("{key} must be an unsigned integer, got '{v}'"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = VectorStoreConfig::from_lookup(&env(&[])).unwrap();
        assert_eq!(cfg.backend, BackendKind::Dense);
        assert_eq!(cfg.index, "documents");
        assert_eq!(cfg.policy, IndexPolicy::Reuse);
        assert_eq!(cfg.upsert_batch, 256);
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert_eq!(cfg.qdrant.url, "http://localhost:6334");
    }

    #[test]
    fn backend_aliases_parse() {
        assert_eq!("Qdrant".parse::<BackendKind>().unwrap(), BackendKind::Dense);
        assert_eq!("opensearch".parse::<BackendKind>().unwrap(), BackendKind::TextSearch);
        assert_eq!("textsearch".parse::<BackendKind>().unwrap(), BackendKind::TextSearch);
    }

    #[test]
    fn unknown_backend_is_unsupported() {
        let err = VectorStoreConfig::from_lookup(&env(&[("VECTOR_BACKEND", "invalid")])).unwrap_err();
        assert!(matches!(err, VectorStoreError::UnsupportedBackend(ref b) if b == "invalid"));
    }

    #[test]
    fn textsearch_settings_from_env() {
        let cfg = VectorStoreConfig::from_lookup(&env(&[
            ("VECTOR_BACKEND", "textsearch"),
            ("VECTOR_INDEX", "bills"),
            ("INDEX_POLICY", "recreate"),
            ("OPENSEARCH_URL", "https://search.local:9200"),
            ("OPENSEARCH_USER", "admin"),
            ("OPENSEARCH_REFRESH", "true"),
            ("EMBEDDING_DIM", "384"),
        ]))
        .unwrap();
        assert_eq!(cfg.backend, BackendKind::TextSearch);
        assert_eq!(cfg.policy, IndexPolicy::Recreate);
        assert_eq!(cfg.opensearch.username.as_deref(), Some("admin"));
        assert_eq!(cfg.opensearch.refresh, "true");
        assert_eq!(cfg.embedding_dim, Some(384));
    }

    #[test]
    fn invalid_numbers_and_policy_are_rejected() {
        assert!(VectorStoreConfig::from_lookup(&env(&[("UPSERT_BATCH", "0")])).is_err());
        assert!(VectorStoreConfig::from_lookup(&env(&[("UPSERT_BATCH", "lots")])).is_err());
        assert!(VectorStoreConfig::from_lookup(&env(&[("INDEX_POLICY", "sometimes")])).is_err());
        assert!(VectorStoreConfig::from_lookup(&env(&[("QDRANT_URL", "localhost:6334")])).is_err());
    }
}
