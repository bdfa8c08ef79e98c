// Storage module
// One JSON file per match under rounds/rNN/ plus a run-wide index.json


use anyhow::{Context, Result};
use chrono::DateTime;
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

use crate::normalizer::Match;

pub const INDEX_FILE: &str = "index.json";
const SLUG_MAX_LEN: usize = 16;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// One line of `index.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub event_id: Option<u64>,
    pub round: u64,
    /// Path of the match file relative to the output directory
    pub file: String,
    pub home: Option<String>,
    pub away: Option<String>,
    pub start_timestamp: Option<i64>,
    pub status: Option<String>,
}

impl IndexEntry {
    #[inline]
    pub fn new(round: u64, file: String, record: &Match) -> Self {
        Self {
            event_id: record.event_id,
            round,
            file,
            home: record.teams.home.name.clone(),
            away: record.teams.away.name.clone(),
            start_timestamp: record.start_timestamp,
            status: record.status.clone(),
        }
    }
}

/// Lower-case, collapse runs of anything but `[a-z0-9]` into one hyphen, trim
/// hyphens at both ends and keep at most `max_len` characters
#[inline]
pub fn slugify(text: &str, max_len: usize) -> String {
    let lowered = text.trim().to_lowercase();
    let replaced = NON_ALPHANUMERIC.replace_all(&lowered, "-");
    replaced.trim_matches('-').chars().take(max_len).collect()
}

fn team_slug(slug: Option<&str>, name: Option<&str>, fallback: &str) -> String {
    let source = slug
        .filter(|s| !s.is_empty())
        .or(name.filter(|n| !n.is_empty()))
        .unwrap_or(fallback);
    slugify(source, SLUG_MAX_LEN)
}

/// Path of a match file relative to the output directory
#[inline]
pub fn match_file_path(record: &Match) -> PathBuf {
    let round = record.round.id.unwrap_or(0);
    let event_id = record
        .event_id
        .map_or_else(|| "unknown".to_string(), |id| id.to_string());

    let date = record
        .start_timestamp
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d").to_string());

    let file_name = match date {
        Some(date) => {
            let home = team_slug(
                record.teams.home.slug.as_deref(),
                record.teams.home.name.as_deref(),
                "home",
            );
            let away = team_slug(
                record.teams.away.slug.as_deref(),
                record.teams.away.name.as_deref(),
                "away",
            );
            format!(
                "{}_r{:02}_{}-vs-{}_{}.json",
                date, round, home, away, event_id
            )
        }
        None => format!("{}.json", event_id),
    };

    Path::new("rounds")
        .join(format!("r{:02}", round))
        .join(file_name)
}

/// Write a match below `out_dir`, replacing any previous copy. Returns the relative path.
#[inline]
pub fn save_match(out_dir: &Path, record: &Match) -> Result<PathBuf> {
    let relative = match_file_path(record);
    let path = out_dir.join(&relative);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(record).context("Failed to serialize match")?;
    fs::write(&path, content)
        .with_context(|| format!("Failed to write match file: {}", path.display()))?;

    debug!("Saved match {:?} to {}", record.event_id, path.display());
    Ok(relative)
}

/// Replace `index.json` with this run's entries
#[inline]
pub fn save_index(out_dir: &Path, entries: &[IndexEntry]) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create directory: {}", out_dir.display()))?;

    let path = out_dir.join(INDEX_FILE);
    let content = serde_json::to_string_pretty(entries).context("Failed to serialize index")?;
    fs::write(&path, content)
        .with_context(|| format!("Failed to write index file: {}", path.display()))?;

    debug!("Wrote {} index entries to {}", entries.len(), path.display());
    Ok(path)
}

#[inline]
pub fn load_index(out_dir: &Path) -> Result<Vec<IndexEntry>> {
    let path = out_dir.join(INDEX_FILE);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read index file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse index file: {}", path.display()))
}
