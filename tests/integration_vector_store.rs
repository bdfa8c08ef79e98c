#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Vector store behavior through the public API with a deterministic embedder

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use match_rag::database::{EMBEDDING_DIMENSION, Metadata, SearchOptions, VectorStore};
use match_rag::embeddings::Embedder;

/// Letter-frequency vectors padded with zeros: identical texts embed identically
struct LetterEmbedder {
    truncate_to: Option<usize>,
}

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; EMBEDDING_DIMENSION];
        for c in text.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
            vector[usize::from(c - b'a')] += 1.0;
        }
        if let Some(len) = self.truncate_to {
            vector.truncate(len);
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }

    fn model_name(&self) -> &str {
        "letters"
    }
}

async fn open_store(dir: &Path, truncate_to: Option<usize>) -> VectorStore {
    VectorStore::open(
        &dir.join("vectors"),
        Arc::new(LetterEmbedder { truncate_to }),
    )
    .await
    .expect("should open store")
}

fn metadata(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map,
        _ => Metadata::new(),
    }
}

async fn seed(store: &VectorStore) {
    let documents = [
        ("Villasanti completed forty passes in midfield", json!({"teamName": "Grêmio", "round": 5})),
        ("Alan Patrick scored a penalty and hit the bar", json!({"teamName": "Internacional", "round": 5})),
        ("Goalkeeper made seven saves under heavy pressure", json!({"teamName": "Grêmio", "round": 6})),
    ];
    for (text, meta) in documents {
        let ids = store.add_document(text, &metadata(meta), None).await;
        assert_eq!(ids.len(), 1);
    }
}

#[tokio::test]
async fn wrong_dimension_stores_nothing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = open_store(temp_dir.path(), Some(3)).await;

    let ids = store
        .add_document("any text at all", &Metadata::new(), None)
        .await;

    assert!(ids.is_empty());
    assert_eq!(store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn verbatim_query_ranks_first() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = open_store(temp_dir.path(), None).await;
    seed(&store).await;

    let hits = store
        .search_with_score(
            "Alan Patrick scored a penalty and hit the bar",
            &Metadata::new(),
            5,
            None,
        )
        .await;

    assert_eq!(hits.len(), 3);
    assert_eq!(
        hits[0].document.text,
        "Alan Patrick scored a penalty and hit the bar"
    );
    assert!(hits[0].score > 0.999);
    assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
}

#[tokio::test]
async fn empty_query_returns_nothing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = open_store(temp_dir.path(), None).await;
    seed(&store).await;

    assert!(store.search("", &Metadata::new(), 5).await.is_empty());
    assert!(store.search("   ", &Metadata::new(), 5).await.is_empty());
}

#[tokio::test]
async fn filters_match_every_entry() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = open_store(temp_dir.path(), None).await;
    seed(&store).await;

    let by_team = store
        .search("passes", &metadata(json!({"teamName": "Grêmio"})), 5)
        .await;
    assert_eq!(by_team.len(), 2);
    assert!(by_team.iter().all(|d| d.metadata["teamName"] == json!("Grêmio")));

    // numbers compare by their text form
    let by_both = store
        .search(
            "passes",
            &metadata(json!({"teamName": "Grêmio", "round": "5"})),
            5,
        )
        .await;
    assert_eq!(by_both.len(), 1);
    assert_eq!(by_both[0].metadata["round"], json!(5));

    let none = store
        .search("passes", &metadata(json!({"teamName": "Nobody"})), 5)
        .await;
    assert!(none.is_empty());
}

#[tokio::test]
async fn delete_and_reopen() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let ids = {
        let store = open_store(temp_dir.path(), None).await;
        let ids = store
            .add_document("kept across restarts", &Metadata::new(), None)
            .await;
        let doomed = store
            .add_document("removed before restart", &Metadata::new(), None)
            .await;
        assert_eq!(doomed.len(), 1);
        assert!(store.delete_document(&doomed[0]).await);
        assert!(!store.delete_document(&doomed[0]).await);
        ids
    };

    let store = open_store(temp_dir.path(), None).await;
    assert_eq!(store.count().await.expect("should count"), 1);

    let retriever = store.as_retriever(SearchOptions {
        k: 1,
        ..SearchOptions::default()
    });
    let found = retriever.retrieve("kept across restarts").await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, ids[0]);
}
