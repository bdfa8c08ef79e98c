
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::normalizer::unwrap_event;

/// Errors that prevent a match file from producing chunks
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("match record has no `raw` payloads")]
    MissingRaw,
    #[error("failed to serialize chunk: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One embeddable player performance
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerChunk {
    /// Pretty JSON document sent to the embedder
    pub text: String,
    /// Filterable fields stored next to the vector; never contains nulls
    pub metadata: Map<String, Value>,
}

/// Team on one side of a match, as named in the core payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideContext {
    pub id: Option<Value>,
    pub name: Option<Value>,
}

/// Match-level fields repeated in every player chunk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchContext {
    pub event_id: Option<Value>,
    pub match_date: Option<Value>,
    pub season: Option<Value>,
    pub round: Option<Value>,
    pub home: SideContext,
    pub away: SideContext,
    pub home_score: Option<Value>,
    pub away_score: Option<Value>,
    /// File name only, without directories
    pub source_file: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChunkDocument<'a> {
    match_info: MatchInfo<'a>,
    player_performance: PlayerPerformance<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchInfo<'a> {
    event_id: Option<&'a Value>,
    match_date: Option<&'a Value>,
    season: Option<&'a Value>,
    round: Option<&'a Value>,
    home_team: Option<&'a Value>,
    away_team: Option<&'a Value>,
    final_score: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerPerformance<'a> {
    player_id: Option<&'a Value>,
    player_name: Option<&'a Value>,
    player_team: Option<&'a Value>,
    position: Option<&'a Value>,
    jersey_number: Option<&'a Value>,
    is_substitute: bool,
    statistics: &'a Map<String, Value>,
}

static NULL: Value = Value::Null;

/// Present and non-null child of `value`
fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| !v.is_null())
}

fn score_text(score: Option<&Value>) -> String {
    match score {
        Some(Value::String(text)) => text.clone(),
        Some(value) => value.to_string(),
        None => "-".to_string(),
    }
}

impl SideContext {
    #[inline]
    pub fn from_team(team: Option<&Value>) -> Self {
        Self {
            id: team.and_then(|t| field(t, "id")).cloned(),
            name: team.and_then(|t| field(t, "name")).cloned(),
        }
    }
}

impl MatchContext {
    /// Read the shared fields from a raw core event payload (enveloped or not)
    #[inline]
    pub fn from_core(core: &Value, source_file: &Path) -> Self {
        let event = unwrap_event(core);
        let current = |key: &str| field(event, key).and_then(|s| field(s, "current")).cloned();

        Self {
            event_id: field(event, "id").cloned(),
            match_date: field(event, "startTimestamp").cloned(),
            season: field(event, "season")
                .and_then(|s| field(s, "year"))
                .cloned(),
            round: field(event, "roundInfo")
                .and_then(|r| field(r, "round"))
                .cloned(),
            home: SideContext::from_team(field(event, "homeTeam")),
            away: SideContext::from_team(field(event, "awayTeam")),
            home_score: current("homeScore"),
            away_score: current("awayScore"),
            source_file: source_file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// `"{home} x {away}"`, with `-` for a missing side
    #[inline]
    pub fn final_score(&self) -> String {
        format!(
            "{} x {}",
            score_text(self.home_score.as_ref()),
            score_text(self.away_score.as_ref())
        )
    }

    /// Build the chunk for one lineup entry, or `None` when it carries no statistics
    #[inline]
    pub fn player_chunk(
        &self,
        side: &SideContext,
        entry: &Value,
    ) -> Result<Option<PlayerChunk>, ChunkError> {
        let Some(statistics) = entry
            .get("statistics")
            .and_then(Value::as_object)
            .filter(|stats| !stats.is_empty())
        else {
            return Ok(None);
        };

        let player = field(entry, "player").unwrap_or(&NULL);
        let player_id = field(player, "id");
        let player_name = field(player, "name");

        let document = ChunkDocument {
            match_info: MatchInfo {
                event_id: self.event_id.as_ref(),
                match_date: self.match_date.as_ref(),
                season: self.season.as_ref(),
                round: self.round.as_ref(),
                home_team: self.home.name.as_ref(),
                away_team: self.away.name.as_ref(),
                final_score: self.final_score(),
            },
            player_performance: PlayerPerformance {
                player_id,
                player_name,
                player_team: side.name.as_ref(),
                position: field(entry, "position"),
                jersey_number: field(entry, "jerseyNumber"),
                is_substitute: entry
                    .get("substitute")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                statistics,
            },
        };
        let text = serde_json::to_string_pretty(&document)?;

        let parent_id = self.event_id.as_ref().map(|id| match id {
            Value::String(text) => Value::String(text.clone()),
            other => Value::String(other.to_string()),
        });

        let metadata: Map<String, Value> = [
            ("eventId", self.event_id.clone()),
            ("playerId", player_id.cloned()),
            ("playerName", player_name.cloned()),
            ("teamId", side.id.clone()),
            ("teamName", side.name.clone()),
            ("season", self.season.clone()),
            ("round", self.round.clone()),
            ("sourceFile", Some(Value::String(self.source_file.clone()))),
            ("parent_id", parent_id),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect();

        Ok(Some(PlayerChunk { text, metadata }))
    }
}

/// Build one chunk per stat-bearing player from a persisted match record.
///
/// Only `raw.core` and `raw.lineups` are read; the normalized top-level
/// fields are ignored.
#[inline]
pub fn build_chunks(record: &Value, source_file: &Path) -> Result<Vec<PlayerChunk>, ChunkError> {
    let raw = record
        .get("raw")
        .filter(|raw| raw.as_object().is_some_and(|map| !map.is_empty()))
        .ok_or(ChunkError::MissingRaw)?;

    let core = raw.get("core").unwrap_or(&NULL);
    let lineups = raw.get("lineups").unwrap_or(&NULL);
    let context = MatchContext::from_core(core, source_file);

    let mut chunks = Vec::new();
    for (side_key, side) in [("home", &context.home), ("away", &context.away)] {
        let Some(players) = lineups
            .get(side_key)
            .and_then(|block| block.get("players"))
            .and_then(Value::as_array)
        else {
            continue;
        };

        for entry in players {
            if let Some(chunk) = context.player_chunk(side, entry)? {
                chunks.push(chunk);
            }
        }
    }

    debug!(
        "Built {} chunks from {}",
        chunks.len(),
        context.source_file
    );
    Ok(chunks)
}
