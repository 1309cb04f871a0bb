//! Backend-agnostic semantic index over Qdrant or OpenSearch.
//!
//! This crate provides:
//! - An [`Embedder`] capability with a remote implementation over `ai-llm-service`
//! - [`IndexBackend`] adapters for a dense store (Qdrant) and a text-search
//!   engine with scripted cosine scoring (OpenSearch)
//! - [`VectorStore`], the facade that upserts text, searches by text and
//!   deletes by id with normalized scores
//! - A char-boundary safe chunker for ingestion

pub mod backend;
pub mod chunking;
mod config;
pub mod embed;
mod errors;
mod record;
mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use backend::{IndexBackend, OpenSearchBackend, QdrantBackend, build_backend};
pub use chunking::{Chunk, chunk_documents, chunk_text};
pub use config::{BackendKind, IndexPolicy, OpenSearchSettings, QdrantSettings, VectorStoreConfig};
pub use embed::{Embedder, remote::RemoteEmbedder};
pub use errors::{Result, VectorStoreError};
pub use record::{IndexEntry, RawHit, ScoreScale, SearchHit};
pub use store::VectorStore;
