//! Retrieval-augmented answering over a `vector-store` index.
//!
//! [`RagPipeline::run`] retrieves the top-K hits for a question, renders them
//! into a fixed legislative-assistant prompt and hands it to a [`Generator`].
//! The [`eval`] module scores retrieval output against labeled ground truth.

mod cfg;
mod error;
pub mod eval;
mod generator;
mod pipeline;
pub mod prompt;

pub use cfg::PipelineConfig;
pub use error::{PipelineError, Result};
pub use eval::Metrics;
pub use generator::{Generation, GenerationParams, Generator, LlmGenerator};
pub use pipeline::{RagAnswer, RagPipeline, RunOptions};
