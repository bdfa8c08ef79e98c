
use anyhow::Context;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::discovery::{Discovery, event_id};
use super::{ApiClient, FetchError};
use crate::normalizer::normalize_match;
use crate::storage::{IndexEntry, save_index, save_match};

/// Errors that end a collection run
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to list seasons: {0}")]
    Seasons(#[from] FetchError),
    #[error("no season {year} found for tournament {tournament_id}")]
    SeasonNotFound { tournament_id: u64, year: i32 },
    #[error("season {season_id} lists neither rounds nor events")]
    NothingToCollect { season_id: u64 },
    #[error("failed to write index: {0:#}")]
    Index(anyhow::Error),
}

#[derive(Debug, Error)]
#[error("invalid round range {0:?}: expected `a-b` or a single round number")]
pub struct RoundRangeError(String);

/// Inclusive range of round numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRange {
    pub first: u64,
    pub last: u64,
}

impl RoundRange {
    #[inline]
    pub fn contains(&self, round: u64) -> bool {
        (self.first..=self.last).contains(&round)
    }
}

impl FromStr for RoundRange {
    type Err = RoundRangeError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u64>()
                .map_err(|_| RoundRangeError(s.to_string()))
        };

        let (first, last) = match s.split_once('-') {
            Some((a, b)) => (parse(a)?, parse(b)?),
            None => {
                let round = parse(s)?;
                (round, round)
            }
        };

        if first > last {
            return Err(RoundRangeError(s.to_string()));
        }
        Ok(Self { first, last })
    }
}

impl fmt::Display for RoundRange {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

/// Which season to collect and where to put it
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub out_dir: PathBuf,
    pub tournament_id: u64,
    pub season_year: i32,
    /// Skip season resolution and use this id directly
    pub season_id: Option<u64>,
    pub rounds: Option<RoundRange>,
    /// Events per logged batch; requests are still issued one at a time
    pub batch_size: usize,
}

/// Outcome of a collection run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectReport {
    pub season_id: u64,
    pub rounds: usize,
    pub saved: usize,
    pub failed: usize,
    pub skipped: usize,
    pub interrupted: bool,
    pub index_path: PathBuf,
}

fn collect_event(client: &ApiClient, out_dir: &Path, round: u64, id: u64) -> anyhow::Result<IndexEntry> {
    let core = client
        .event(id)
        .with_context(|| format!("Failed to fetch event {}", id))?;

    let lineups = client.event_lineups(id).into_value("lineups", id);
    let statistics = client.event_statistics(id).into_value("statistics", id);
    let incidents = client.event_incidents(id).into_value("incidents", id);

    let record = normalize_match(
        &core,
        lineups.as_ref(),
        statistics.as_ref(),
        incidents.as_ref(),
    );
    let relative = save_match(out_dir, &record)?;

    info!(
        "✔ {} saved to {}",
        record.slug.as_deref().unwrap_or("match"),
        relative.display()
    );
    Ok(IndexEntry::new(
        round,
        relative.to_string_lossy().replace('\\', "/"),
        &record,
    ))
}

/// Collect every match of a season: discover rounds, fetch and normalize each event,
/// write one file per match and finally the index. Failures on a single match are
/// logged and skipped. Setting `stop` ends the run before the next event; the
/// index of already saved matches is still written.
#[inline]
pub fn collect_matches(
    client: &ApiClient,
    options: &CollectOptions,
    stop: &AtomicBool,
) -> Result<CollectReport, CollectError> {
    let mut discovery = Discovery::new(client, options.tournament_id);

    let season_id = match options.season_id {
        Some(id) => id,
        None => discovery.season_id_for_year(options.season_year)?.ok_or(
            CollectError::SeasonNotFound {
                tournament_id: options.tournament_id,
                year: options.season_year,
            },
        )?,
    };
    info!("Collecting season {} ({})", options.season_year, season_id);

    let scope = discovery.scope(season_id);
    let mut rounds = discovery.rounds_with_events(scope);
    if rounds.is_empty() {
        return Err(CollectError::NothingToCollect { season_id });
    }

    if let Some(range) = options.rounds {
        rounds.retain(|round| range.contains(round.round));
    }
    info!("{} rounds to process", rounds.len());

    let batch_size = options.batch_size.max(1);
    let mut report = CollectReport {
        season_id,
        rounds: rounds.len(),
        ..CollectReport::default()
    };
    let mut entries = Vec::new();

    'rounds: for round in &rounds {
        if round.events.is_empty() {
            warn!("Round {} has no events", round.round);
            continue;
        }
        info!("Round {:02}: {} matches", round.round, round.events.len());

        for (batch_number, batch) in round.events.chunks(batch_size).enumerate() {
            debug!(
                "Round {:02} batch {} ({} events)",
                round.round,
                batch_number + 1,
                batch.len()
            );

            for event in batch {
                if stop.load(Ordering::Relaxed) {
                    warn!("Interrupted, stopping after {} saved matches", report.saved);
                    report.interrupted = true;
                    break 'rounds;
                }

                let Some(id) = event_id(event) else {
                    debug!("Skipping event summary without an id");
                    report.skipped += 1;
                    continue;
                };

                match collect_event(client, &options.out_dir, round.round, id) {
                    Ok(entry) => {
                        entries.push(entry);
                        report.saved += 1;
                    }
                    Err(e) => {
                        if let Some(fetch) = e.downcast_ref::<FetchError>() {
                            warn!("Skipping event {}: {}", id, fetch);
                        } else {
                            error!("Failed to process event {}: {:#}", id, e);
                        }
                        report.failed += 1;
                    }
                }
            }
        }
    }

    report.index_path = save_index(&options.out_dir, &entries).map_err(CollectError::Index)?;
    info!("Finished: {} matches saved", report.saved);

    Ok(report)
}
