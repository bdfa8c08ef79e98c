#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end collection runs against a mocked statistics API

use serde_json::{Value, json};
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use match_rag::collector::retry::RetryPolicy;
use match_rag::collector::{ApiClient, CollectOptions, collect_matches};
use match_rag::config::ApiConfig;
use match_rag::normalizer::Match;
use match_rag::storage::load_index;

const SEASON: &str = "/unique-tournament/325/season/58766";

fn client(server: &MockServer) -> ApiClient {
    let config = ApiConfig {
        base_url: format!("{}/api/v1", server.uri()),
        ..ApiConfig::default()
    };
    ApiClient::new(&config)
        .with_retry_policy(RetryPolicy {
            backoff: Duration::from_millis(5),
            ..RetryPolicy::default()
        })
        .with_pacing(Duration::ZERO)
}

fn options(out_dir: &std::path::Path) -> CollectOptions {
    CollectOptions {
        out_dir: out_dir.to_path_buf(),
        tournament_id: 325,
        season_year: 2024,
        season_id: None,
        rounds: None,
        batch_size: 10,
    }
}

async fn mount(server: &MockServer, route: &str, status: u16, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1{route}")))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

fn core_event(id: u64, round: u64, day_offset: u64) -> Value {
    json!({"event": {
        "id": id,
        "slug": format!("home-away-{id}"),
        "startTimestamp": 1_713_042_000 + day_offset * 86_400,
        "status": {"description": "Ended"},
        "roundInfo": {"round": round},
        "season": {"id": 58766, "name": "Brasileiro Série A 2024", "year": "2024"},
        "homeTeam": {"id": 1, "name": "Grêmio", "slug": "gremio"},
        "awayTeam": {"id": 2, "name": "Internacional", "slug": "internacional"},
        "homeScore": {"current": 1},
        "awayScore": {"current": 0}
    }})
}

async fn mount_season(server: &MockServer) {
    mount(
        server,
        "/unique-tournament/325/seasons",
        200,
        json!({"seasons": [
            {"id": 1, "year": "2023", "name": "Brasileiro 2023"},
            {"id": 58766, "year": "2024", "name": "Brasileiro 2024"}
        ]}),
    )
    .await;
}

async fn mount_event_details(server: &MockServer, id: u64) {
    mount(
        server,
        &format!("/event/{id}/lineups"),
        200,
        json!({
            "home": {"players": [
                {"player": {"id": 10, "name": "Villasanti"}, "shirtNumber": 8, "statistics": {"totalPass": 40}}
            ]},
            "away": {"players": []}
        }),
    )
    .await;
    mount(
        server,
        &format!("/event/{id}/statistics"),
        200,
        json!({"statistics": [
            {"groupName": "Match overview", "statisticsItems": [
                {"name": "Ball possession", "home": "55%", "away": "45%"}
            ]}
        ]}),
    )
    .await;
    // incidents are not published for this event
    mount(server, &format!("/event/{id}/incidents"), 404, json!({})).await;
}

#[tokio::test]
async fn two_rounds_yield_two_files_and_index() {
    let server = MockServer::start().await;
    mount_season(&server).await;
    mount(
        &server,
        &format!("{SEASON}/rounds"),
        200,
        json!({"rounds": [{"round": 1}, {"round": 2}]}),
    )
    .await;
    for (round, id) in [(1, 101), (2, 102)] {
        mount(
            &server,
            &format!("{SEASON}/round/{round}/events"),
            200,
            json!({"events": [{"id": id}]}),
        )
        .await;
        mount(&server, &format!("/event/{id}"), 200, core_event(id, round, round)).await;
        mount_event_details(&server, id).await;
    }

    let temp_dir = TempDir::new().expect("should create temp dir");
    let report = collect_matches(&client(&server), &options(temp_dir.path()), &AtomicBool::new(false))
        .expect("collection should succeed");

    assert_eq!(report.season_id, 58766);
    assert_eq!(report.saved, 2);
    assert_eq!(report.failed, 0);

    let index = load_index(temp_dir.path()).expect("should load index");
    assert_eq!(index.len(), 2);

    let files: Vec<_> = index.iter().map(|entry| entry.file.clone()).collect();
    assert_eq!(
        files,
        vec![
            "rounds/r01/2024-04-14_r01_gremio-vs-internacional_101.json",
            "rounds/r02/2024-04-15_r02_gremio-vs-internacional_102.json",
        ]
    );

    let content =
        std::fs::read_to_string(temp_dir.path().join(&files[0])).expect("should read match file");
    let record: Match = serde_json::from_str(&content).expect("should parse match");
    assert_eq!(record.event_id, Some(101));
    assert_eq!(record.score.home, Some(1));
    assert_eq!(record.teams.home.starting_xi.len(), 1);
    assert!(record.teams.home.statistics.contains_key("Ball possession"));
    assert!(record.raw.lineups.is_some());
    assert!(record.raw.incidents.is_none());
    assert!(record.incidents.is_empty());
}

#[tokio::test]
async fn rerun_overwrites_instead_of_duplicating() {
    let server = MockServer::start().await;
    mount_season(&server).await;
    mount(&server, &format!("{SEASON}/rounds"), 200, json!({"rounds": [{"round": 1}]})).await;
    mount(
        &server,
        &format!("{SEASON}/round/1/events"),
        200,
        json!({"events": [{"id": 101}]}),
    )
    .await;
    mount(&server, "/event/101", 200, core_event(101, 1, 1)).await;
    mount_event_details(&server, 101).await;

    let temp_dir = TempDir::new().expect("should create temp dir");
    for _ in 0..2 {
        collect_matches(&client(&server), &options(temp_dir.path()), &AtomicBool::new(false))
            .expect("collection should succeed");
    }

    let round_files = std::fs::read_dir(temp_dir.path().join("rounds/r01"))
        .expect("should list round dir")
        .count();
    assert_eq!(round_files, 1);
    assert_eq!(load_index(temp_dir.path()).expect("should load index").len(), 1);
}

#[tokio::test]
async fn season_events_are_bucketed_when_rounds_are_missing() {
    let server = MockServer::start().await;
    mount_season(&server).await;
    mount(
        &server,
        &format!("{SEASON}/events"),
        200,
        json!({"events": [
            {"id": 201, "roundInfo": {"round": 2}},
            {"id": 202, "roundInfo": {"round": 1}}
        ]}),
    )
    .await;
    for (id, round) in [(201, 2), (202, 1)] {
        mount(&server, &format!("/event/{id}"), 200, core_event(id, round, round)).await;
        mount_event_details(&server, id).await;
    }

    let temp_dir = TempDir::new().expect("should create temp dir");
    let report = collect_matches(&client(&server), &options(temp_dir.path()), &AtomicBool::new(false))
        .expect("collection should succeed");

    assert_eq!(report.rounds, 2);
    let rounds: Vec<u64> = load_index(temp_dir.path())
        .expect("should load index")
        .iter()
        .map(|entry| entry.round)
        .collect();
    assert_eq!(rounds, vec![1, 2]);
}
