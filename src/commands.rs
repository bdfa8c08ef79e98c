use anyhow::Context;
use console::style;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::cleaner::{CleanReport, TreeCleaner};
use crate::collector::{ApiClient, CollectOptions, CollectReport, collect_matches};
use crate::config::{Config, load_config};
use crate::database::{Metadata, VectorStore};
use crate::embeddings::OllamaClient;
use crate::indexer::{IndexReport, index_directory};
use crate::{RagError, Result};

/// Parse a `key=value` search filter. Values are matched as text.
#[inline]
pub fn parse_filter(arg: &str) -> std::result::Result<(String, Value), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), Value::String(value.to_string())))
        }
        _ => Err(format!("expected key=value, got {arg:?}")),
    }
}

async fn open_store(config: &Config) -> Result<VectorStore> {
    let embedder = OllamaClient::new(&config.embedding).context("Failed to create Ollama client")?;
    Ok(VectorStore::from_config(config, Arc::new(embedder)).await?)
}

/// Collect a season into `options.out_dir`. Ctrl-C stops after the current match.
#[inline]
pub async fn collect_season(options: CollectOptions) -> Result<CollectReport> {
    let config = load_config().context("Failed to load configuration")?;
    config.api.validate()?;
    let client = ApiClient::new(&config.api);

    let stop = Arc::new(AtomicBool::new(false));
    let interrupt = {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing current match");
                stop.store(true, Ordering::Relaxed);
            }
        })
    };

    info!(
        "Collecting tournament {} season {} into {}",
        options.tournament_id,
        options.season_year,
        options.out_dir.display()
    );
    let result = tokio::task::spawn_blocking(move || collect_matches(&client, &options, &stop))
        .await
        .context("Collection task panicked")?;
    interrupt.abort();

    let report = result?;
    println!(
        "{} {} matches saved ({} failed, {} skipped) across {} rounds",
        style("✅").green(),
        style(report.saved).bold(),
        report.failed,
        report.skipped,
        report.rounds
    );
    if report.interrupted {
        println!("{}", style("⚠️  Run was interrupted").yellow());
    }
    println!("Index: {}", style(report.index_path.display()).dim());

    Ok(report)
}

/// Write cleaned copies of the season directories below `base` into `output`
#[inline]
pub async fn clean_tree(base: PathBuf, output: PathBuf, seasons: Vec<String>) -> Result<CleanReport> {
    let config = load_config().context("Failed to load configuration")?;
    let seasons = if seasons.is_empty() {
        config.cleaner.season_dirs.clone()
    } else {
        seasons
    };
    if !base.is_dir() {
        return Err(RagError::InvalidArgument(format!(
            "base directory {} does not exist",
            base.display()
        )));
    }

    let cleaner = TreeCleaner::new(config.cleaner.keys.iter().cloned());
    let report = tokio::task::spawn_blocking(move || {
        cleaner.process_directory(&base, &output, &seasons)
    })
    .await
    .context("Cleaning task panicked")?;

    for season in &report.missing_seasons {
        println!("{} season directory not found: {}", style("⚠️").yellow(), season);
    }
    println!(
        "{} {} files cleaned, {} failed ({} -> {} tokens)",
        style("✅").green(),
        style(report.cleaned.len()).bold(),
        report.failed.len(),
        report.tokens_before(),
        report.tokens_after()
    );

    Ok(report)
}

/// Build and store player chunks for every match file below `dir`
#[inline]
pub async fn embed_directory(dir: &Path) -> Result<IndexReport> {
    if !dir.is_dir() {
        return Err(RagError::InvalidArgument(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let config = load_config().context("Failed to load configuration")?;
    config.validate()?;
    let store = open_store(&config).await?;

    let report = index_directory(&store, dir, Some(config.store.max_chunk_size)).await;
    println!(
        "{} {} chunks stored from {} files ({} with failures)",
        style("✅").green(),
        style(report.chunks_stored).bold(),
        report.files.len(),
        report.failed_files()
    );

    Ok(report)
}

/// Print the closest stored chunks to `query`
#[inline]
pub async fn search(
    query: &str,
    k: Option<usize>,
    min_score: Option<f64>,
    filters: Vec<(String, Value)>,
) -> Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    let store = open_store(&config).await?;

    let filter: Metadata = filters.into_iter().collect();
    let k = k.unwrap_or(config.store.default_k);
    let hits = store.try_search_with_score(query, &filter, k, min_score).await?;

    if hits.is_empty() {
        println!("No results.");
    }
    for (rank, hit) in hits.iter().enumerate() {
        let source = hit
            .document
            .metadata
            .get("sourceFile")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        println!(
            "{} {} {} ({})",
            style(format!("#{}", rank + 1)).bold(),
            style(format!("{:.4}", hit.score)).cyan(),
            hit.document.id,
            style(source).dim()
        );
        println!("{}", hit.document.text);
        println!();
    }

    Ok(())
}

/// Remove one stored chunk by id
#[inline]
pub async fn delete(id: &str) -> Result<bool> {
    let config = load_config().context("Failed to load configuration")?;
    let store = open_store(&config).await?;

    let removed = store.delete_document(id).await;
    if removed {
        println!("{} Removed {}", style("✅").green(), id);
    } else {
        println!("{} Nothing removed for {}", style("⚠️").yellow(), id);
    }

    Ok(removed)
}
