// Cleaner module
// Strips named keys from persisted match trees into a mirrored output directory

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Keys removed when no explicit set is configured
pub const DEFAULT_REMOVED_KEYS: &[&str] = &[
    "fieldTranslations",
    "nameTranslation",
    "shortNameTranslation",
    "ar",
    "alpha2",
    "alpha3",
    "slug",
];

/// Removes every field whose key is in a fixed set, at any depth.
///
/// Matching is by key name only: removing `slug` drops team, player and
/// tournament slugs alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeCleaner {
    keys: BTreeSet<String>,
}

/// Token counts for one cleaned file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    pub tokens_before: usize,
    pub tokens_after: usize,
}

/// Summary of a directory pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub cleaned: Vec<CleanedFile>,
    pub failed: Vec<PathBuf>,
    pub missing_seasons: Vec<String>,
}

impl CleanReport {
    #[inline]
    pub fn tokens_before(&self) -> usize {
        self.cleaned.iter().map(|f| f.tokens_before).sum()
    }

    #[inline]
    pub fn tokens_after(&self) -> usize {
        self.cleaned.iter().map(|f| f.tokens_after).sum()
    }
}

impl Default for TreeCleaner {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_REMOVED_KEYS.iter().copied())
    }
}

/// Whitespace-separated token count, a rough size measure for embedding input
#[inline]
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

impl TreeCleaner {
    #[inline]
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Return the tree with every removed key dropped
    #[inline]
    pub fn clean(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(key, _)| !self.keys.contains(key))
                    .map(|(key, child)| (key, self.clean(child)))
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|item| self.clean(item)).collect())
            }
            scalar => scalar,
        }
    }

    /// Clean one file into `output`, creating parent directories as needed
    #[inline]
    pub fn clean_file(&self, source: &Path, output: &Path) -> Result<CleanedFile> {
        let content = fs::read_to_string(source)
            .with_context(|| format!("Failed to read {}", source.display()))?;
        let tree: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", source.display()))?;

        let cleaned = serde_json::to_string_pretty(&self.clean(tree))
            .context("Failed to serialize cleaned tree")?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(output, &cleaned)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        Ok(CleanedFile {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            tokens_before: count_tokens(&content),
            tokens_after: count_tokens(&cleaned),
        })
    }

    /// Clean every `*.json` file below each season directory of `base`, writing
    /// to the same relative path below `output`. Unreadable files are skipped.
    #[inline]
    pub fn process_directory<S: AsRef<str>>(
        &self,
        base: &Path,
        output: &Path,
        season_dirs: &[S],
    ) -> CleanReport {
        let mut report = CleanReport::default();

        for season in season_dirs {
            let season = season.as_ref();
            let season_path = base.join(season);
            if !season_path.is_dir() {
                warn!("Season directory not found, skipping: {}", season_path.display());
                report.missing_seasons.push(season.to_string());
                continue;
            }

            let files = json_files(&season_path);
            info!("Found {} files in {}", files.len(), season);

            for file in files {
                let Ok(relative) = file.strip_prefix(base) else {
                    continue;
                };
                let target = output.join(relative);

                match self.clean_file(&file, &target) {
                    Ok(cleaned) => {
                        debug!(
                            "{}: {} -> {} tokens",
                            relative.display(),
                            cleaned.tokens_before,
                            cleaned.tokens_after
                        );
                        report.cleaned.push(cleaned);
                    }
                    Err(e) => {
                        warn!("Skipping {}: {:#}", file.display(), e);
                        report.failed.push(file);
                    }
                }
            }
        }

        info!(
            "Cleaned {} files ({} failed), {} -> {} tokens",
            report.cleaned.len(),
            report.failed.len(),
            report.tokens_before(),
            report.tokens_after()
        );
        report
    }
}

/// Every `*.json` file below `dir`, sorted
#[inline]
pub fn json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Failed to read directory entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();
    files
}
