#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Cleaning, chunking and embedding of persisted match files

use async_trait::async_trait;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use match_rag::cleaner::TreeCleaner;
use match_rag::database::{EMBEDDING_DIMENSION, Metadata, VectorStore};
use match_rag::embeddings::{Embedder, build_chunks};
use match_rag::indexer::{FileOutcome, index_directory};
use match_rag::normalizer::normalize_match;
use match_rag::storage::save_match;

struct LengthEmbedder;

#[async_trait]
impl Embedder for LengthEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let digits = text.bytes().filter(u8::is_ascii_digit).count();
        let mut vector = vec![0.0_f32; EMBEDDING_DIMENSION];
        vector[0] = 1.0;
        vector[1] = text.len() as f32 / 100.0;
        vector[2] = digits as f32;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }

    fn model_name(&self) -> &str {
        "length"
    }
}

fn core() -> Value {
    json!({"event": {
        "id": 9001,
        "slug": "gremio-internacional",
        "startTimestamp": 1_713_128_400,
        "roundInfo": {"round": 3},
        "season": {"id": 58766, "year": "2024"},
        "homeTeam": {"id": 1, "name": "Grêmio", "slug": "gremio",
            "fieldTranslations": {"nameTranslation": {"ar": "غريميو"}}},
        "awayTeam": {"id": 2, "name": "Internacional", "slug": "internacional"},
        "homeScore": {"current": 2},
        "awayScore": {"current": 2}
    }})
}

fn lineups() -> Value {
    json!({
        "home": {"players": [
            {"player": {"id": 10, "name": "Villasanti", "slug": "villasanti"},
             "position": "M", "statistics": {"totalPass": 40, "goals": 1}},
            {"player": {"id": 11, "name": "Reserve Keeper"}, "substitute": true}
        ]},
        "away": {"players": []}
    })
}

#[test]
fn cleaning_removes_slug_only() {
    let cleaner = TreeCleaner::new(["slug"]);
    let cleaned = cleaner.clean(json!({"teams": {"home": {"slug": "abc", "name": "X"}}}));
    assert_eq!(cleaned, json!({"teams": {"home": {"name": "X"}}}));
}

#[test]
fn only_stat_bearing_players_become_chunks() {
    let record = json!({"raw": {"core": core(), "lineups": lineups()}});

    let chunks = build_chunks(&record, Path::new("rounds/r03/match.json"))
        .expect("should build chunks");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].metadata["playerName"], json!("Villasanti"));
    assert_eq!(chunks[0].metadata["teamName"], json!("Grêmio"));
    assert_eq!(chunks[0].metadata["sourceFile"], json!("match.json"));
    assert!(chunks[0].text.contains("\"finalScore\": \"2 x 2\""));
}

#[tokio::test]
async fn collected_files_are_cleaned_then_embedded() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let base = temp_dir.path().join("data");
    let cleaned = temp_dir.path().join("clean");

    let record = normalize_match(&core(), Some(&lineups()), None, None);
    let relative = save_match(&base.join("brasileirao_2024"), &record)
        .expect("should save match");

    let report = TreeCleaner::default().process_directory(&base, &cleaned, &["brasileirao_2024"]);
    assert_eq!(report.cleaned.len(), 1);
    assert!(report.tokens_after() < report.tokens_before());

    let cleaned_file = cleaned.join("brasileirao_2024").join(&relative);
    let content = fs::read_to_string(&cleaned_file).expect("should read cleaned file");
    assert!(!content.contains("\"slug\""));
    assert!(!content.contains("fieldTranslations"));

    let store = VectorStore::open(&temp_dir.path().join("vectors"), Arc::new(LengthEmbedder))
        .await
        .expect("should open store");
    let indexed = index_directory(&store, &cleaned, None).await;

    assert_eq!(indexed.files.len(), 1);
    assert_eq!(indexed.files[0].outcome, FileOutcome::Stored(1));

    let mut filter = Metadata::new();
    filter.insert("playerName".to_string(), json!("Villasanti"));
    let hits = store.search("midfield passing", &filter, 5).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata["eventId"], json!(9001));
    assert_eq!(hits[0].metadata["parent_id"], json!("9001"));
}
