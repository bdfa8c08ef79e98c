// Indexer module
// Embedding pass: turns persisted match files into stored player chunks

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cleaner::json_files;
use crate::database::VectorStore;
use crate::embeddings::chunking::{ChunkError, build_chunks};
use crate::storage::INDEX_FILE;

/// What happened to one match file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// All chunks stored
    Stored(usize),
    /// Readable, but no player carried statistics
    Empty,
    /// No `raw` payloads to build chunks from
    Skipped,
    /// Some chunks stored, others rejected by the store
    Partial { stored: usize, failed: usize },
    /// The file could not be read or parsed
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

/// Totals for an embedding pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub files: Vec<FileReport>,
    pub chunks_stored: usize,
    pub chunks_failed: usize,
}

impl IndexReport {
    #[inline]
    pub fn failed_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed(_) | FileOutcome::Partial { .. }))
            .count()
    }
}

impl FileOutcome {
    #[inline]
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Stored(_) => "✅",
            Self::Empty | Self::Skipped => "⚠️",
            Self::Partial { .. } | Self::Failed(_) => "❌",
        }
    }
}

/// One status line: `[NNNN/TTTT] glyph | NN chunks | file`
#[inline]
pub fn status_line(position: usize, total: usize, report: &FileReport) -> String {
    let name = report
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let detail = match &report.outcome {
        FileOutcome::Stored(count) => format!("{count:02} chunks"),
        FileOutcome::Empty | FileOutcome::Skipped => "00 chunks".to_string(),
        FileOutcome::Partial { stored, failed } => {
            format!("{stored:02} chunks, {failed} failed")
        }
        FileOutcome::Failed(reason) => reason.clone(),
    };
    format!(
        "[{position:04}/{total:04}] {} | {detail} | {name}",
        report.outcome.glyph()
    )
}

/// Build and store the chunks of one match file
#[inline]
pub async fn index_file(
    store: &VectorStore,
    path: &Path,
    max_chunk_size: Option<usize>,
) -> Result<FileOutcome> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let record: Value = serde_json::from_str(&content).context("JSON error")?;

    let chunks = match build_chunks(&record, path) {
        Ok(chunks) => chunks,
        Err(ChunkError::MissingRaw) => {
            warn!("No raw payloads in {}, skipping", path.display());
            return Ok(FileOutcome::Skipped);
        }
        Err(e) => return Err(e).context("Failed to build chunks"),
    };

    if chunks.is_empty() {
        return Ok(FileOutcome::Empty);
    }

    let mut stored = 0;
    let mut failed = 0;
    for chunk in &chunks {
        if store
            .add_document(&chunk.text, &chunk.metadata, max_chunk_size)
            .await
            .is_empty()
        {
            failed += 1;
        } else {
            stored += 1;
        }
    }
    debug!("{}: {} stored, {} failed", path.display(), stored, failed);

    Ok(if failed == 0 {
        FileOutcome::Stored(stored)
    } else {
        FileOutcome::Partial { stored, failed }
    })
}

/// Embed every match file below `dir`, printing one status line per file.
/// A failure on one file is reported and the pass continues.
#[inline]
pub async fn index_directory(
    store: &VectorStore,
    dir: &Path,
    max_chunk_size: Option<usize>,
) -> IndexReport {
    let files: Vec<PathBuf> = json_files(dir)
        .into_iter()
        .filter(|path| path.file_name().is_none_or(|name| name != INDEX_FILE))
        .collect();
    let total = files.len();
    info!("Found {} match files in {}", total, dir.display());

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(total as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut report = IndexReport::default();
    for (position, path) in files.into_iter().enumerate() {
        bar.set_message(
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        let outcome = match index_file(store, &path, max_chunk_size).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to index {}: {:#}", path.display(), e);
                FileOutcome::Failed(e.to_string())
            }
        };

        match &outcome {
            FileOutcome::Stored(count) => report.chunks_stored += count,
            FileOutcome::Partial { stored, failed } => {
                report.chunks_stored += stored;
                report.chunks_failed += failed;
            }
            FileOutcome::Empty | FileOutcome::Skipped | FileOutcome::Failed(_) => {}
        }

        let file_report = FileReport { path, outcome };
        let line = status_line(position + 1, total, &file_report);
        let styled = match file_report.outcome {
            FileOutcome::Stored(_) => style(line).green(),
            FileOutcome::Empty | FileOutcome::Skipped => style(line).yellow(),
            FileOutcome::Partial { .. } | FileOutcome::Failed(_) => style(line).red(),
        };
        bar.suspend(|| println!("{styled}"));
        bar.inc(1);

        report.files.push(file_report);
    }
    bar.finish_and_clear();

    info!(
        "Embedding pass finished: {} chunks stored from {} files ({} with failures)",
        report.chunks_stored,
        total,
        report.failed_files()
    );
    report
}
