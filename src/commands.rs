//! Command handlers. Results go to stdout as JSON, logs to stderr.

use std::path::Path;
use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use anyhow::{Context, bail};
use colored::Colorize;
use rag_pipeline::eval as metrics;
use rag_pipeline::{LlmGenerator, PipelineConfig, RagPipeline, RunOptions};
use serde_json::json;
use tracing::info;
use vector_store::{IndexPolicy, RemoteEmbedder, VectorStore, VectorStoreConfig, chunk_documents};

use crate::progress;

/// Connects the embedder and opens the index.
///
/// `cfg` comes from [`VectorStoreConfig::from_env`], so backend selection is
/// already validated before any network call.
async fn open_store(
    cfg: &VectorStoreConfig,
    with_generation: bool,
) -> anyhow::Result<(Arc<LlmServiceProfiles>, Arc<VectorStore>)> {
    let svc = Arc::new(LlmServiceProfiles::from_env(with_generation)?);
    let embedder = RemoteEmbedder::connect(svc.clone(), cfg.embedding_dim).await?;
    let store = VectorStore::connect(cfg, Arc::new(embedder)).await?;
    Ok((svc, Arc::new(store)))
}

pub async fn ingest(
    paths: &[std::path::PathBuf],
    first_id: u64,
    max_chars: usize,
    overlap: usize,
    recreate: bool,
) -> anyhow::Result<()> {
    let mut docs = Vec::with_capacity(paths.len());
    for p in paths {
        let text = std::fs::read_to_string(p)
            .with_context(|| format!("reading {}", p.display()))?;
        docs.push(text);
    }
    let chunks = chunk_documents(docs.iter().map(String::as_str), first_id, max_chars, overlap)?;
    info!(files = paths.len(), chunks = chunks.len(), "documents chunked");

    let mut cfg = VectorStoreConfig::from_env()?;
    if recreate {
        cfg.policy = IndexPolicy::Recreate;
    }
    let (_, store) = open_store(&cfg, false).await?;

    let bar = progress::for_total(chunks.len() as u64);
    let mut written = 0usize;
    for group in chunks.chunks(cfg.upsert_batch) {
        let ids: Vec<u64> = group.iter().map(|c| c.id).collect();
        let texts: Vec<String> = group.iter().map(|c| c.text.clone()).collect();
        written += store.upsert(&ids, &texts).await?;
        bar.advance(group.len() as u64, "upserting");
    }
    bar.finish("done");

    let next_id = chunks.last().map(|c| c.id + 1).unwrap_or(first_id);
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "index": store.index_name(),
            "backend": store.backend_kind().as_str(),
            "chunks_written": written,
            "next_id": next_id,
        }))?
    );
    Ok(())
}

fn default_top_k(top_k: Option<usize>) -> anyhow::Result<usize> {
    Ok(match top_k {
        Some(k) => k,
        None => PipelineConfig::from_env()?.top_k,
    })
}

pub async fn search(query: &str, top_k: Option<usize>, threshold: f32) -> anyhow::Result<()> {
    let top_k = default_top_k(top_k)?;
    let (_, store) = open_store(&VectorStoreConfig::from_env()?, false).await?;
    let hits = store.search_with_threshold(query, top_k, threshold).await?;
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}

pub async fn ask(
    query: &str,
    top_k: Option<usize>,
    temperature: f32,
    max_tokens: u32,
) -> anyhow::Result<()> {
    let pcfg = PipelineConfig::from_env()?;
    let opts = RunOptions {
        top_k: top_k.unwrap_or(pcfg.top_k),
        temperature,
        max_tokens,
    };
    let (svc, store) = open_store(&VectorStoreConfig::from_env()?, true).await?;
    svc.require_generation_model().await?;

    let generator = Arc::new(LlmGenerator::new(svc)?);
    let pipeline = RagPipeline::with_config(store, generator, &pcfg);
    let answer = pipeline.run(query, opts).await?;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}

pub async fn delete(ids: &[u64]) -> anyhow::Result<()> {
    let (_, store) = open_store(&VectorStoreConfig::from_env()?, false).await?;
    store.delete(ids).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "index": store.index_name(), "deleted": ids }))?
    );
    Ok(())
}

pub async fn drop_index(yes: bool) -> anyhow::Result<()> {
    if !yes {
        bail!("refusing to drop the index without --yes");
    }
    let (_, store) = open_store(&VectorStoreConfig::from_env()?, false).await?;
    store.drop_index().await?;
    eprintln!("{} index '{}' dropped", "warning:".yellow(), store.index_name());
    Ok(())
}

pub async fn status() -> anyhow::Result<()> {
    let (_, store) = open_store(&VectorStoreConfig::from_env()?, false).await?;
    let count = store.count().await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "backend": store.backend_kind().as_str(),
            "index": store.index_name(),
            "entries": count,
            "embedding_model": store.embedder().model(),
            "dimension": store.embedder().dimension(),
        }))?
    );
    Ok(())
}

pub fn eval(ground_truth: &Path, predictions: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let gt = metrics::load_ground_truth(ground_truth)
        .with_context(|| format!("loading {}", ground_truth.display()))?;
    let pred = metrics::load_predictions(predictions)
        .with_context(|| format!("loading {}", predictions.display()))?;
    let scores = metrics::compute_metrics(&gt, &pred);

    let body = serde_json::to_string_pretty(&scores)?;
    println!("{body}");
    if let Some(path) = output {
        std::fs::write(path, &body).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "metrics written");
    }
    Ok(())
}

pub async fn health() -> anyhow::Result<()> {
    let svc = LlmServiceProfiles::from_env(std::env::var("LLM_MODEL").is_ok())?;
    let statuses = svc.health_all().await;
    for s in &statuses {
        let mark = if s.ok { "ok".green() } else { "fail".red() };
        eprintln!("[{mark}] {} {} ({} ms) {}", s.provider, s.model, s.latency_ms, s.message);
    }
    println!("{}", serde_json::to_string_pretty(&statuses)?);
    if statuses.iter().any(|s| !s.ok) {
        bail!("one or more providers are unhealthy");
    }
    Ok(())
}
