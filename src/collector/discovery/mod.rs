
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::{ApiClient, FetchError};

/// Identifies one season of one tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonScope {
    pub tournament_id: u64,
    pub season_id: u64,
}

/// A candidate URL layout for a listing, and the keys that may hold its items
#[derive(Debug, Clone, Copy)]
pub struct EndpointShape {
    pub name: &'static str,
    path: fn(SeasonScope, u64) -> String,
    keys: &'static [&'static str],
}

impl EndpointShape {
    #[inline]
    pub fn path(&self, scope: SeasonScope, round: u64) -> String {
        (self.path)(scope, round)
    }

    /// First non-empty array found under one of the shape's keys
    #[inline]
    pub fn items(&self, payload: &Value) -> Vec<Value> {
        self.keys
            .iter()
            .filter_map(|key| payload.get(*key).and_then(Value::as_array))
            .find(|items| !items.is_empty())
            .cloned()
            .unwrap_or_default()
    }
}

fn season_prefix(scope: SeasonScope) -> String {
    format!(
        "/unique-tournament/{}/season/{}",
        scope.tournament_id, scope.season_id
    )
}

fn rounds_path(scope: SeasonScope, _: u64) -> String {
    format!("{}/rounds", season_prefix(scope))
}

fn event_rounds_path(scope: SeasonScope, _: u64) -> String {
    format!("{}/events/rounds", season_prefix(scope))
}

fn season_events_path(scope: SeasonScope, _: u64) -> String {
    format!("{}/events", season_prefix(scope))
}

fn season_matches_path(scope: SeasonScope, _: u64) -> String {
    format!("{}/matches", season_prefix(scope))
}

fn round_events_path(scope: SeasonScope, round: u64) -> String {
    format!("{}/round/{}/events", season_prefix(scope), round)
}

fn events_by_round_path(scope: SeasonScope, round: u64) -> String {
    format!("{}/events/round/{}", season_prefix(scope), round)
}

const EVENT_KEYS: &[&str] = &["events", "matches"];

pub const ROUND_SHAPES: &[EndpointShape] = &[
    EndpointShape {
        name: "season rounds",
        path: rounds_path,
        keys: &["rounds", "data"],
    },
    EndpointShape {
        name: "season event rounds",
        path: event_rounds_path,
        keys: &["rounds", "data"],
    },
];

pub const SEASON_EVENT_SHAPES: &[EndpointShape] = &[
    EndpointShape {
        name: "season events",
        path: season_events_path,
        keys: EVENT_KEYS,
    },
    EndpointShape {
        name: "season matches",
        path: season_matches_path,
        keys: EVENT_KEYS,
    },
];

pub const ROUND_EVENT_SHAPES: &[EndpointShape] = &[
    EndpointShape {
        name: "round events",
        path: round_events_path,
        keys: EVENT_KEYS,
    },
    EndpointShape {
        name: "events by round",
        path: events_by_round_path,
        keys: EVENT_KEYS,
    },
];

/// A round number with the event summaries that belong to it
#[derive(Debug, Clone, PartialEq)]
pub struct RoundEvents {
    pub round: u64,
    pub name: Option<String>,
    pub events: Vec<Value>,
}

/// Round number recorded in an event summary, 0 when unknown
#[inline]
pub fn event_round(event: &Value) -> u64 {
    event
        .pointer("/roundInfo/round")
        .and_then(Value::as_u64)
        .or_else(|| event.pointer("/round/round").and_then(Value::as_u64))
        .unwrap_or(0)
}

/// Event id from a summary, which may itself be wrapped in `{event: {...}}`
#[inline]
pub fn event_id(event: &Value) -> Option<u64> {
    event
        .get("id")
        .and_then(Value::as_u64)
        .or_else(|| event.pointer("/event/id").and_then(Value::as_u64))
}

/// Group event summaries by round number, ordered by round
#[inline]
pub fn bucket_by_round(events: Vec<Value>) -> Vec<RoundEvents> {
    let mut buckets: BTreeMap<u64, Vec<Value>> = BTreeMap::new();
    for event in events {
        buckets.entry(event_round(&event)).or_default().push(event);
    }

    buckets
        .into_iter()
        .map(|(round, events)| RoundEvents {
            round,
            name: Some(format!("Round {}", round)),
            events,
        })
        .collect()
}

/// Find the season whose `year` (or, failing that, `name`) matches the requested year
#[inline]
pub fn find_season_id(seasons: &[Value], year: i32) -> Option<u64> {
    let wanted = year.to_string();
    let year_matches = |season: &&Value| match season.get("year") {
        Some(Value::Number(n)) => n.as_i64() == Some(i64::from(year)),
        Some(Value::String(s)) => s.trim() == wanted,
        _ => false,
    };
    let name_matches = |season: &&Value| {
        season.get("name").and_then(Value::as_str).map(str::trim) == Some(wanted.as_str())
    };

    seasons
        .iter()
        .find(year_matches)
        .or_else(|| seasons.iter().find(name_matches))
        .and_then(|season| season.get("id").and_then(Value::as_u64))
}

/// Resolves seasons, rounds and events for one tournament
#[derive(Debug)]
pub struct Discovery<'a> {
    client: &'a ApiClient,
    tournament_id: u64,
    season_events: Option<Vec<Value>>,
}

impl<'a> Discovery<'a> {
    #[inline]
    pub fn new(client: &'a ApiClient, tournament_id: u64) -> Self {
        Self {
            client,
            tournament_id,
            season_events: None,
        }
    }

    #[inline]
    pub fn season_id_for_year(&self, year: i32) -> Result<Option<u64>, FetchError> {
        let payload = self.client.seasons(self.tournament_id)?;
        let seasons = payload
            .get("seasons")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let season_id = find_season_id(seasons, year);
        debug!(
            "Resolved season {} of tournament {} to {:?} ({} seasons listed)",
            year,
            self.tournament_id,
            season_id,
            seasons.len()
        );
        Ok(season_id)
    }

    #[inline]
    pub fn scope(&self, season_id: u64) -> SeasonScope {
        SeasonScope {
            tournament_id: self.tournament_id,
            season_id,
        }
    }

    /// Try each shape in order and return the first non-empty listing
    #[inline]
    pub fn first_non_empty(
        &self,
        shapes: &[EndpointShape],
        scope: SeasonScope,
        round: u64,
    ) -> Vec<Value> {
        for shape in shapes {
            let path = shape.path(scope, round);
            match self.client.get_json(&path) {
                Ok(payload) => {
                    let items = shape.items(&payload);
                    if !items.is_empty() {
                        debug!("{} returned {} items", shape.name, items.len());
                        return items;
                    }
                    debug!("{} returned no items, trying next shape", shape.name);
                }
                Err(e) => debug!("{} failed: {}, trying next shape", shape.name, e),
            }
        }
        Vec::new()
    }

    /// Raw round entries as listed by the API
    #[inline]
    pub fn rounds(&self, scope: SeasonScope) -> Vec<Value> {
        self.first_non_empty(ROUND_SHAPES, scope, 0)
    }

    #[inline]
    pub fn events_for_round(&self, scope: SeasonScope, round: u64) -> Vec<Value> {
        self.first_non_empty(ROUND_EVENT_SHAPES, scope, round)
    }

    /// Every event of the season, fetched at most once
    #[inline]
    pub fn season_events(&mut self, scope: SeasonScope) -> &[Value] {
        if self.season_events.is_none() {
            let events = self.first_non_empty(SEASON_EVENT_SHAPES, scope, 0);
            info!("Season {} lists {} events", scope.season_id, events.len());
            self.season_events = Some(events);
        }
        self.season_events.as_deref().unwrap_or_default()
    }

    /// Rounds with their events, falling back to bucketing the season's events
    /// when no round listing is available. Empty when neither exists.
    #[inline]
    pub fn rounds_with_events(&mut self, scope: SeasonScope) -> Vec<RoundEvents> {
        let rounds = self.rounds(scope);

        if rounds.is_empty() {
            warn!("No rounds listed, bucketing all season events by round");
            let events = self.season_events(scope).to_vec();
            return bucket_by_round(events);
        }

        let mut resolved = Vec::with_capacity(rounds.len());
        for entry in &rounds {
            let Some(round) = entry
                .get("round")
                .and_then(Value::as_u64)
                .or_else(|| entry.get("id").and_then(Value::as_u64))
            else {
                warn!("Skipping round entry without a number: {}", entry);
                continue;
            };

            let mut events = self.events_for_round(scope, round);
            if events.is_empty() {
                debug!("Round {} has no listing, filtering season events", round);
                events = self
                    .season_events(scope)
                    .iter()
                    .filter(|event| event_round(event) == round)
                    .cloned()
                    .collect();
            }

            resolved.push(RoundEvents {
                round,
                name: entry.get("name").and_then(Value::as_str).map(ToString::to_string),
                events,
            });
        }
        resolved
    }
}
