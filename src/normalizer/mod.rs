// Normalizer module
// Maps the API's loosely structured event payloads onto one stable match schema


use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Canonical record of one match. Every field is always serialized, `null` when unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub event_id: Option<u64>,
    pub slug: Option<String>,
    pub status: Option<String>,
    pub start_timestamp: Option<i64>,
    pub referee: Option<Value>,
    pub venue: Option<Value>,
    pub round: RoundInfo,
    pub season: SeasonInfo,
    pub tournament: TournamentInfo,
    pub score: Score,
    pub teams: Teams,
    pub incidents: Vec<Value>,
    pub raw: RawPayloads,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundInfo {
    pub id: Option<u64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonInfo {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentInfo {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: Option<i64>,
    pub away: Option<i64>,
    pub penalties: SidePair<Option<i64>>,
}

/// A value recorded once per side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidePair<T> {
    pub home: T,
    pub away: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Teams {
    pub home: Team,
    pub away: Team,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub formation: Option<String>,
    pub coach: Option<String>,
    #[serde(rename = "startingXI")]
    pub starting_xi: Vec<Player>,
    pub bench: Vec<Player>,
    /// This side's value for every team statistic, keyed by statistic name
    pub statistics: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub shirt_number: Option<Value>,
    pub position: Option<String>,
    pub captain: Option<bool>,
    pub rating: Option<Value>,
    pub statistics: Option<Map<String, Value>>,
}

/// Source payloads exactly as received
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPayloads {
    pub core: Value,
    pub lineups: Option<Value>,
    pub statistics: Option<Value>,
    pub incidents: Option<Value>,
}

/// Identity of a team as referenced by an event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamRef {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub slug: Option<String>,
}

static NULL: Value = Value::Null;

fn str_at(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn u64_at(value: &Value, pointer: &str) -> Option<u64> {
    value.pointer(pointer).and_then(Value::as_u64)
}

fn i64_at(value: &Value, pointer: &str) -> Option<i64> {
    value.pointer(pointer).and_then(Value::as_i64)
}

/// Non-null value at a pointer
fn present<'v>(value: &'v Value, pointer: &str) -> Option<&'v Value> {
    value.pointer(pointer).filter(|v| !v.is_null())
}

/// String or number rendered as a string
fn text_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Strip an optional `{event: {...}}` envelope
#[inline]
pub fn unwrap_event(core: &Value) -> &Value {
    core.get("event").filter(|e| e.is_object()).unwrap_or(core)
}

#[inline]
pub fn team_ref(team: &Value) -> TeamRef {
    TeamRef {
        id: u64_at(team, "/id"),
        name: str_at(team, "/name")
            .filter(|name| !name.is_empty())
            .or_else(|| str_at(team, "/shortName")),
        slug: str_at(team, "/slug"),
    }
}

/// Flatten grouped team statistics into `name -> {home, away}`.
/// A top-level `expectedGoals` block is added as `xG`.
#[inline]
pub fn flatten_statistics(payload: &Value) -> BTreeMap<String, SidePair<Value>> {
    let mut flat = BTreeMap::new();

    let groups = ["/statistics", "/groups"]
        .iter()
        .filter_map(|pointer| payload.pointer(pointer).and_then(Value::as_array))
        .find(|groups| !groups.is_empty());

    for group in groups.into_iter().flatten() {
        let items = ["/statisticsItems", "/items"]
            .iter()
            .filter_map(|pointer| group.pointer(pointer).and_then(Value::as_array))
            .find(|items| !items.is_empty());

        for item in items.into_iter().flatten() {
            let name = str_at(item, "/name")
                .filter(|name| !name.trim().is_empty())
                .or_else(|| str_at(item, "/title"))
                .map(|name| name.trim().to_string())
                .unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            flat.insert(
                name,
                SidePair {
                    home: item.get("home").cloned().unwrap_or(Value::Null),
                    away: item.get("away").cloned().unwrap_or(Value::Null),
                },
            );
        }
    }

    if let Some(xg) = payload.get("expectedGoals").filter(|xg| xg.is_object()) {
        flat.insert(
            "xG".to_string(),
            SidePair {
                home: xg.get("home").cloned().unwrap_or(Value::Null),
                away: xg.get("away").cloned().unwrap_or(Value::Null),
            },
        );
    }

    flat
}

/// One lineup entry as a player
#[inline]
pub fn lineup_player(entry: &Value) -> Player {
    let statistics = entry
        .get("statistics")
        .and_then(Value::as_object)
        .filter(|stats| !stats.is_empty())
        .cloned();

    let rating = present(entry, "/rating/rating")
        .or_else(|| present(entry, "/rating").filter(|r| !r.is_object()))
        .or_else(|| present(entry, "/statistics/rating"))
        .cloned();

    Player {
        id: u64_at(entry, "/player/id"),
        name: str_at(entry, "/player/name"),
        slug: str_at(entry, "/player/slug"),
        shirt_number: present(entry, "/shirtNumber")
            .or_else(|| present(entry, "/jerseyNumber"))
            .cloned(),
        position: str_at(entry, "/position"),
        captain: entry.get("captain").and_then(Value::as_bool),
        rating,
        statistics,
    }
}

fn players_of(block: Option<&Value>) -> Vec<Value> {
    block
        .and_then(|b| b.get("players"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Starters and substitutes of one side. Explicit `startingLineups` / `substitutes`
/// blocks win; otherwise `players` is split on each entry's `substitute` flag.
#[inline]
pub fn side_lineup(side: &Value) -> (Vec<Player>, Vec<Player>) {
    let starting = side.get("startingLineups");
    let substitutes = side.get("substitutes");

    if starting.is_some() || substitutes.is_some() {
        let to_players = |block: Option<&Value>| -> Vec<Player> {
            players_of(block).iter().map(lineup_player).collect()
        };
        return (to_players(starting), to_players(substitutes));
    }

    let (bench, starting): (Vec<Value>, Vec<Value>) = players_of(Some(side))
        .into_iter()
        .partition(|entry| entry.get("substitute").and_then(Value::as_bool) == Some(true));

    (
        starting.iter().map(lineup_player).collect(),
        bench.iter().map(lineup_player).collect(),
    )
}

fn incidents_of(incidents: Option<&Value>) -> Vec<Value> {
    match incidents {
        Some(Value::Object(map)) => map
            .get("incidents")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        Some(Value::Array(list)) => list.clone(),
        _ => Vec::new(),
    }
}

fn side_score(event: &Value, side: &str) -> Option<i64> {
    i64_at(event, &format!("/{}Score/current", side))
        .or_else(|| i64_at(event, &format!("/{}Score/normaltime", side)))
}

fn build_team(
    reference: TeamRef,
    lineup: Option<&Value>,
    statistics: BTreeMap<String, Value>,
) -> Team {
    let lineup = lineup.unwrap_or(&NULL);
    let (starting_xi, bench) = side_lineup(lineup);

    Team {
        id: reference.id,
        name: reference.name,
        slug: reference.slug,
        formation: str_at(lineup, "/formation"),
        coach: str_at(lineup, "/coach/name"),
        starting_xi,
        bench,
        statistics,
    }
}

/// Build the canonical record from the four event payloads. Never fails:
/// anything missing from the sources is left as `None` / empty.
#[inline]
pub fn normalize_match(
    core: &Value,
    lineups: Option<&Value>,
    statistics: Option<&Value>,
    incidents: Option<&Value>,
) -> Match {
    let event = unwrap_event(core);

    let round_info = ["/roundInfo", "/round"]
        .iter()
        .find_map(|pointer| event.pointer(pointer).filter(|r| r.is_object()))
        .unwrap_or(&NULL);
    let season = event.get("season").unwrap_or(&NULL);
    let tournament = ["/tournament", "/uniqueTournament"]
        .iter()
        .find_map(|pointer| event.pointer(pointer).filter(|t| t.is_object()))
        .unwrap_or(&NULL);

    let flat = statistics.map(flatten_statistics).unwrap_or_default();
    let (home_stats, away_stats) = flat.into_iter().fold(
        (BTreeMap::new(), BTreeMap::new()),
        |(mut home, mut away), (name, pair)| {
            home.insert(name.clone(), pair.home);
            away.insert(name, pair.away);
            (home, away)
        },
    );

    let home_ref = team_ref(event.get("homeTeam").unwrap_or(&NULL));
    let away_ref = team_ref(event.get("awayTeam").unwrap_or(&NULL));

    Match {
        event_id: u64_at(event, "/id"),
        slug: str_at(event, "/slug"),
        status: str_at(event, "/status/description").or_else(|| str_at(event, "/status/type")),
        start_timestamp: i64_at(event, "/startTimestamp"),
        referee: present(event, "/referee").cloned(),
        venue: present(event, "/venue").cloned(),
        round: RoundInfo {
            id: u64_at(round_info, "/round"),
            name: str_at(round_info, "/name").or_else(|| text_at(round_info, "/round")),
        },
        season: SeasonInfo {
            id: u64_at(season, "/id"),
            name: str_at(season, "/name"),
            year: text_at(season, "/year"),
        },
        tournament: TournamentInfo {
            id: u64_at(tournament, "/uniqueTournament/id").or_else(|| u64_at(tournament, "/id")),
            name: str_at(tournament, "/name")
                .or_else(|| str_at(tournament, "/uniqueTournament/name")),
            category: str_at(tournament, "/category/name"),
        },
        score: Score {
            home: side_score(event, "home"),
            away: side_score(event, "away"),
            penalties: SidePair {
                home: i64_at(event, "/homeScore/penalties"),
                away: i64_at(event, "/awayScore/penalties"),
            },
        },
        teams: Teams {
            home: build_team(home_ref, lineups.and_then(|l| l.get("home")), home_stats),
            away: build_team(away_ref, lineups.and_then(|l| l.get("away")), away_stats),
        },
        incidents: incidents_of(incidents),
        raw: RawPayloads {
            core: core.clone(),
            lineups: lineups.cloned(),
            statistics: statistics.cloned(),
            incidents: incidents.cloned(),
        },
    }
}
