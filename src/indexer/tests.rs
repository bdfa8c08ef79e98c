use super::*;
use crate::database::EMBEDDING_DIMENSION;
use crate::embeddings::Embedder;
use async_trait::async_trait;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

/// Embedder that fails for any text containing "reject"
struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("reject") {
            anyhow::bail!("service unavailable");
        }
        Ok(vec![0.5; EMBEDDING_DIMENSION])
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

async fn create_test_store(dir: &Path) -> VectorStore {
    VectorStore::open(&dir.join("vectors"), Arc::new(FixedEmbedder))
        .await
        .expect("should open store")
}

fn match_file(players: Value) -> Value {
    json!({
        "eventId": 10,
        "raw": {
            "core": {"event": {
                "id": 10,
                "homeTeam": {"id": 1, "name": "Home FC"},
                "awayTeam": {"id": 2, "name": "Away FC"}
            }},
            "lineups": {"home": {"players": players}}
        }
    })
}

fn write_json(path: &Path, value: &Value) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create parent dir");
    }
    fs::write(path, serde_json::to_string_pretty(value).expect("should serialize"))
        .expect("should write file");
}

#[test]
fn status_lines() {
    let stored = FileReport {
        path: PathBuf::from("rounds/r01/a.json"),
        outcome: FileOutcome::Stored(7),
    };
    assert_eq!(status_line(3, 120, &stored), "[0003/0120] ✅ | 07 chunks | a.json");

    let empty = FileReport {
        path: PathBuf::from("b.json"),
        outcome: FileOutcome::Empty,
    };
    assert_eq!(status_line(1, 2, &empty), "[0001/0002] ⚠️ | 00 chunks | b.json");

    let failed = FileReport {
        path: PathBuf::from("c.json"),
        outcome: FileOutcome::Failed("JSON error".to_string()),
    };
    assert_eq!(status_line(2, 2, &failed), "[0002/0002] ❌ | JSON error | c.json");
}

#[tokio::test]
async fn index_file_stores_one_chunk_per_player() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = create_test_store(temp_dir.path()).await;

    let path = temp_dir.path().join("data/m.json");
    write_json(
        &path,
        &match_file(json!([
            {"player": {"id": 1, "name": "One"}, "statistics": {"touches": 10}},
            {"player": {"id": 2, "name": "Two"}, "statistics": {"touches": 4}},
            {"player": {"id": 3, "name": "Bench"}}
        ])),
    );

    let outcome = index_file(&store, &path, None)
        .await
        .expect("should index file");
    assert_eq!(outcome, FileOutcome::Stored(2));
    assert_eq!(store.count().await.expect("should count"), 2);

    let documents = store
        .documents_by_metadata("parent_id", &json!("10"))
        .await
        .expect("should list documents");
    assert_eq!(documents.len(), 2);
    assert!(documents.iter().all(|d| d.metadata["sourceFile"] == json!("m.json")));
}

#[tokio::test]
async fn embedding_failures_are_partial() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = create_test_store(temp_dir.path()).await;

    let path = temp_dir.path().join("m.json");
    write_json(
        &path,
        &match_file(json!([
            {"player": {"id": 1, "name": "Fine"}, "statistics": {"touches": 10}},
            {"player": {"id": 2, "name": "reject me"}, "statistics": {"touches": 4}}
        ])),
    );

    let outcome = index_file(&store, &path, None)
        .await
        .expect("should index file");
    assert_eq!(outcome, FileOutcome::Partial { stored: 1, failed: 1 });
    assert_eq!(store.count().await.expect("should count"), 1);
}

#[tokio::test]
async fn directory_pass_continues_past_bad_files() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = create_test_store(temp_dir.path()).await;
    let data = temp_dir.path().join("data");

    write_json(
        &data.join("rounds/r01/good.json"),
        &match_file(json!([{"player": {"name": "A"}, "statistics": {"goals": 1}}])),
    );
    write_json(&data.join("rounds/r01/no-stats.json"), &match_file(json!([])));
    write_json(&data.join("rounds/r02/no-raw.json"), &json!({"eventId": 3}));
    fs::write(data.join("rounds/r02/broken.json"), "{").expect("should write broken file");
    write_json(&data.join(INDEX_FILE), &json!([]));

    let report = index_directory(&store, &data, None).await;

    assert_eq!(report.files.len(), 4);
    assert_eq!(report.chunks_stored, 1);
    assert_eq!(report.failed_files(), 1);

    let outcome_of = |name: &str| {
        report
            .files
            .iter()
            .find(|f| f.path.ends_with(name))
            .map(|f| f.outcome.clone())
    };
    assert_eq!(outcome_of("good.json"), Some(FileOutcome::Stored(1)));
    assert_eq!(outcome_of("no-stats.json"), Some(FileOutcome::Empty));
    assert_eq!(outcome_of("no-raw.json"), Some(FileOutcome::Skipped));
    assert_eq!(
        outcome_of("broken.json"),
        Some(FileOutcome::Failed("JSON error".to_string()))
    );
}
