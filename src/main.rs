use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod progress;

#[derive(Parser)]
#[command(name = "policy-search")]
#[command(about = "Semantic search and retrieval-augmented answers over a policy corpus", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read text files, chunk them and upsert the chunks into the index
    Ingest {
        /// Text files to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Id of the first chunk; following chunks are numbered sequentially
        #[arg(long, default_value = "0")]
        first_id: u64,

        /// Chunk size in characters
        #[arg(long, default_value_t = vector_store::chunking::DEFAULT_MAX_CHARS)]
        max_chars: usize,

        /// Overlap between consecutive chunks in characters
        #[arg(long, default_value_t = vector_store::chunking::DEFAULT_OVERLAP)]
        overlap: usize,

        /// Drop and recreate the index before writing
        #[arg(long)]
        recreate: bool,
    },

    /// Semantic search; prints hits as JSON
    Search {
        query: String,

        /// Number of hits (default: RAG_TOP_K or 5)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum normalized score in [0, 1]
        #[arg(long, default_value = "0.0")]
        threshold: f32,
    },

    /// Retrieve context and generate an answer
    Ask {
        query: String,

        /// Number of context chunks (default: RAG_TOP_K or 5)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Sampling temperature, 0.0 to 2.0
        #[arg(long, default_value = "0.0")]
        temperature: f32,

        /// Maximum tokens to generate
        #[arg(long, default_value = "512")]
        max_tokens: u32,
    },

    /// Delete chunks by id
    Delete {
        #[arg(required = true)]
        ids: Vec<u64>,
    },

    /// Destroy the whole index
    Drop {
        /// Confirm the destructive operation
        #[arg(long)]
        yes: bool,
    },

    /// Show backend, index and entry count
    Status,

    /// Precision / recall / F1 of retrieval predictions
    Eval {
        /// Ground truth JSON: [{"id": .., "relevant": [..]}]
        #[arg(long)]
        ground_truth: PathBuf,

        /// Predictions JSON: [{"id": .., "predicted": [..]}]
        #[arg(long)]
        predictions: PathBuf,

        /// Optional path to write the metrics JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Probe the configured LLM providers
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();

    ai_llm_service::telemetry::init("info,policy_search=info");

    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest {
            paths,
            first_id,
            max_chars,
            overlap,
            recreate,
        } => commands::ingest(&paths, first_id, max_chars, overlap, recreate).await,
        Commands::Search {
            query,
            top_k,
            threshold,
        } => commands::search(&query, top_k, threshold).await,
        Commands::Ask {
            query,
            top_k,
            temperature,
            max_tokens,
        } => commands::ask(&query, top_k, temperature, max_tokens).await,
        Commands::Delete { ids } => commands::delete(&ids).await,
        Commands::Drop { yes } => commands::drop_index(yes).await,
        Commands::Status => commands::status().await,
        Commands::Eval {
            ground_truth,
            predictions,
            output,
        } => commands::eval(&ground_truth, &predictions, output.as_deref()),
        Commands::Health => commands::health().await,
    }
}
