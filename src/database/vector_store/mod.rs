
use arrow::array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::embeddings::Embedder;

/// Structured fields stored next to each vector
pub type Metadata = Map<String, Value>;

/// Length of every stored vector
pub const EMBEDDING_DIMENSION: usize = 768;

const TABLE_NAME: &str = "embeddings";

/// Metadata keys that can be filtered on, and the column holding each one's text form
const FILTER_COLUMNS: &[(&str, &str)] = &[
    ("eventId", "event_id"),
    ("playerId", "player_id"),
    ("playerName", "player_name"),
    ("teamId", "team_id"),
    ("teamName", "team_name"),
    ("season", "season"),
    ("round", "round"),
    ("sourceFile", "source_file"),
    ("parent_id", "parent_id"),
    ("chunk_index", "chunk_index"),
];

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),
    #[error("embedding service returned an empty vector")]
    EmptyEmbedding,
    #[error("embedding has {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },
    #[error("embedding contains non-finite values")]
    NonFinite,
    #[error("metadata key {0:?} cannot be filtered on")]
    InvalidFilterKey(String),
    #[error("unexpected table layout: {0}")]
    Schema(String),
    #[error("metadata serialization failed: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] lancedb::Error),
    #[error("failed to build record batch: {0}")]
    Arrow(#[from] ArrowError),
    #[error("failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored text window and its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// A search hit; `score` is cosine similarity, higher is closer
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f64,
}

/// Default options applied by a [`Retriever`]
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub k: usize,
    pub filter: Metadata,
    pub score_threshold: Option<f64>,
}

impl Default for SearchOptions {
    #[inline]
    fn default() -> Self {
        Self {
            k: 5,
            filter: Metadata::new(),
            score_threshold: None,
        }
    }
}

/// Embeds text windows into a LanceDB table and serves nearest-neighbour search over them.
///
/// Every operation opens the table afresh. Each write is a single commit, so a
/// failed write leaves no partial rows behind.
#[derive(Clone)]
pub struct VectorStore {
    connection: Connection,
    embedder: Arc<dyn Embedder>,
    max_chunk_size: usize,
}

impl fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStore")
            .field("model", &self.embedder.model_name())
            .field("dimension", &self.embedder.dimension())
            .field("max_chunk_size", &self.max_chunk_size)
            .finish_non_exhaustive()
    }
}

/// A window waiting to be written
struct PendingRow {
    id: String,
    text: String,
    metadata: Metadata,
    vector: Vec<f32>,
}

/// Split `text` into windows of at most `max_chars` characters
#[inline]
pub fn split_windows(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|window| window.iter().collect())
        .collect()
}

/// Text form used for equality filters. Booleans read as 1/0.
fn filter_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => String::from(if *flag { "1" } else { "0" }),
        other => other.to_string(),
    }
}

fn filter_column(key: &str) -> Option<&'static str> {
    FILTER_COLUMNS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, column)| *column)
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn equality_clause(key: &str, value: &Value) -> Result<String, VectorStoreError> {
    let column =
        filter_column(key).ok_or_else(|| VectorStoreError::InvalidFilterKey(key.to_string()))?;
    Ok(format!("`{}` = {}", column, quote(&filter_text(value))))
}

/// `only_if` predicate matching every filter entry, `None` for an empty filter
fn filter_predicate(filter: &Metadata) -> Result<Option<String>, VectorStoreError> {
    let clauses = filter
        .iter()
        .map(|(key, value)| equality_clause(key, value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((!clauses.is_empty()).then(|| clauses.join(" AND ")))
}

fn vector_item() -> Arc<Field> {
    Arc::new(Field::new("item", DataType::Float32, true))
}

fn table_schema() -> SchemaRef {
    let mut fields = vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(vector_item(), EMBEDDING_DIMENSION as i32),
            false,
        ),
        Field::new("text", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ];
    fields.extend(
        FILTER_COLUMNS
            .iter()
            .map(|(_, column)| Field::new(*column, DataType::Utf8, true)),
    );
    Arc::new(Schema::new(fields))
}

fn record_batch(rows: &[PendingRow]) -> Result<RecordBatch, VectorStoreError> {
    let created_at = chrono::Utc::now().to_rfc3339();

    let mut flat = Vec::with_capacity(rows.len() * EMBEDDING_DIMENSION);
    for row in rows {
        flat.extend_from_slice(&row.vector);
    }
    let vectors = FixedSizeListArray::try_new(
        vector_item(),
        EMBEDDING_DIMENSION as i32,
        Arc::new(Float32Array::from(flat)),
        None,
    )?;

    let metadata = rows
        .iter()
        .map(|row| serde_json::to_string(&row.metadata))
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|row| row.id.as_str()))),
        Arc::new(vectors),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|row| row.text.as_str()))),
        Arc::new(StringArray::from(metadata)),
        Arc::new(StringArray::from(vec![created_at.as_str(); rows.len()])),
    ];
    for (key, _) in FILTER_COLUMNS {
        let values: Vec<Option<String>> = rows
            .iter()
            .map(|row| {
                row.metadata
                    .get(*key)
                    .filter(|value| !value.is_null())
                    .map(filter_text)
            })
            .collect();
        columns.push(Arc::new(StringArray::from(values)));
    }

    Ok(RecordBatch::try_new(table_schema(), columns)?)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, VectorStoreError> {
    batch
        .column_by_name(name)
        .and_then(|column| column.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| VectorStoreError::Schema(format!("missing or mistyped column {name}")))
}

/// Documents of one result batch with their `_distance`, if the batch has one.
/// Rows whose stored metadata is not a JSON object are logged and left out.
fn batch_documents(batch: &RecordBatch) -> Result<Vec<(Document, Option<f32>)>, VectorStoreError> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let metadata_column = string_column(batch, "metadata")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|column| column.as_any().downcast_ref::<Float32Array>());

    let mut documents = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let id = ids.value(row).to_string();
        let metadata = match serde_json::from_str::<Value>(metadata_column.value(row)) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                warn!("Skipping {}: metadata is not an object: {}", id, other);
                continue;
            }
            Err(e) => {
                warn!("Skipping {}: unreadable metadata: {}", id, e);
                continue;
            }
        };
        let distance = distances
            .filter(|column| !column.is_null(row))
            .map(|column| column.value(row));

        documents.push((
            Document {
                id,
                text: texts.value(row).to_string(),
                metadata,
            },
            distance,
        ));
    }
    Ok(documents)
}

async fn collect_documents(
    mut stream: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<(Document, Option<f32>)>, VectorStoreError> {
    let mut documents = Vec::new();
    while let Some(batch) = stream.try_next().await? {
        documents.extend(batch_documents(&batch)?);
    }
    Ok(documents)
}

impl VectorStore {
    /// Open (creating if missing) the database directory at `path`.
    /// The embedder must produce [`EMBEDDING_DIMENSION`]-long vectors.
    #[inline]
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, VectorStoreError> {
        if embedder.dimension() != EMBEDDING_DIMENSION {
            return Err(VectorStoreError::Dimension {
                expected: EMBEDDING_DIMENSION,
                actual: embedder.dimension(),
            });
        }

        std::fs::create_dir_all(path)?;
        let uri = path.to_string_lossy().into_owned();
        let connection = lancedb::connect(&uri).execute().await?;

        let store = Self {
            connection,
            embedder,
            max_chunk_size: crate::config::StoreConfig::default().max_chunk_size,
        };
        store.ensure_table().await?;

        info!("Vector store opened at {}", path.display());
        Ok(store)
    }

    /// Open the database named in the configuration
    #[inline]
    pub async fn from_config(
        config: &Config,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, VectorStoreError> {
        let store = Self::open(&config.database_path(), embedder).await?;
        Ok(store.with_max_chunk_size(config.store.max_chunk_size))
    }

    #[inline]
    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size.max(1);
        self
    }

    async fn ensure_table(&self) -> Result<(), VectorStoreError> {
        let names = self.connection.table_names().execute().await?;
        if !names.iter().any(|name| name == TABLE_NAME) {
            self.connection
                .create_empty_table(TABLE_NAME, table_schema())
                .execute()
                .await?;
            info!("Created {} table ({} dimensions)", TABLE_NAME, EMBEDDING_DIMENSION);
            return Ok(());
        }

        let schema = self.table().await?.schema().await?;
        let width = schema
            .field_with_name("vector")
            .ok()
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            });
        if width != Some(EMBEDDING_DIMENSION) {
            return Err(VectorStoreError::Schema(format!(
                "stored vectors have {:?} dimensions, expected {}",
                width, EMBEDDING_DIMENSION
            )));
        }
        debug!("Using existing {} table", TABLE_NAME);
        Ok(())
    }

    async fn table(&self) -> Result<Table, VectorStoreError> {
        Ok(self.connection.open_table(TABLE_NAME).execute().await?)
    }

    /// Embed one text, rejecting empty, wrongly sized or non-finite vectors
    #[inline]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, VectorStoreError> {
        let vector = self
            .embedder
            .embed(text)
            .await
            .map_err(VectorStoreError::Embedding)?;

        if vector.is_empty() {
            return Err(VectorStoreError::EmptyEmbedding);
        }
        if vector.len() != EMBEDDING_DIMENSION {
            return Err(VectorStoreError::Dimension {
                expected: EMBEDDING_DIMENSION,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|value| !value.is_finite()) {
            return Err(VectorStoreError::NonFinite);
        }
        Ok(vector)
    }

    /// Split, embed and upsert a document, returning the new row ids.
    ///
    /// Every window is embedded before anything is written, and all windows
    /// land in one commit, so a failure leaves the table untouched.
    #[inline]
    pub async fn try_add_document(
        &self,
        text: &str,
        metadata: &Metadata,
        max_chunk_size: Option<usize>,
    ) -> Result<Vec<String>, VectorStoreError> {
        let windows = split_windows(text, max_chunk_size.unwrap_or(self.max_chunk_size));
        debug!("Document split into {} windows", windows.len());
        if windows.is_empty() {
            return Ok(Vec::new());
        }

        let parent_id = metadata
            .get("parent_id")
            .filter(|id| match id {
                Value::Null => false,
                Value::String(s) => !s.is_empty(),
                _ => true,
            })
            .cloned()
            .unwrap_or_else(|| Value::String(Uuid::new_v4().to_string()));

        let mut rows = Vec::with_capacity(windows.len());
        for (index, window) in windows.into_iter().enumerate() {
            let vector = self.embed(&window).await?;

            let mut window_metadata = metadata.clone();
            window_metadata.insert("chunk_index".to_string(), Value::from(index));
            window_metadata.insert("parent_id".to_string(), parent_id.clone());

            rows.push(PendingRow {
                id: Uuid::new_v4().to_string(),
                text: window,
                metadata: window_metadata,
                vector,
            });
        }

        let batch = record_batch(&rows)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let table = self.table().await?;
        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge.execute(Box::new(reader)).await?;
        debug!("Upserted {} windows", rows.len());

        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    /// [`Self::try_add_document`] that logs failures and returns no ids
    #[inline]
    pub async fn add_document(
        &self,
        text: &str,
        metadata: &Metadata,
        max_chunk_size: Option<usize>,
    ) -> Vec<String> {
        match self.try_add_document(text, metadata, max_chunk_size).await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to add document: {}", e);
                Vec::new()
            }
        }
    }

    /// The `k` stored windows nearest to `query` by cosine distance among those
    /// matching every `filter` entry, scored as `1 - distance`
    #[inline]
    pub async fn try_search_with_score(
        &self,
        query: &str,
        filter: &Metadata,
        k: usize,
        score_threshold: Option<f64>,
    ) -> Result<Vec<ScoredDocument>, VectorStoreError> {
        if query.trim().is_empty() {
            warn!("Empty query, returning no results");
            return Ok(Vec::new());
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let predicate = filter_predicate(filter)?;
        let query_vector = self.embed(query).await?;

        let table = self.table().await?;
        let mut search = table
            .vector_search(query_vector.as_slice())?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(k);
        if let Some(predicate) = predicate {
            search = search.only_if(predicate);
        }

        let mut hits = Vec::new();
        for (document, distance) in collect_documents(search.execute().await?).await? {
            let Some(distance) = distance.filter(|d| d.is_finite()) else {
                debug!("Skipping {}: no comparable distance", document.id);
                continue;
            };
            let score = 1.0 - f64::from(distance);
            if score_threshold.is_some_and(|threshold| score < threshold) {
                continue;
            }
            hits.push(ScoredDocument { document, score });
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));

        info!("Vector search returned {} hits", hits.len());
        Ok(hits)
    }

    /// [`Self::try_search_with_score`] that logs failures and returns no hits
    #[inline]
    pub async fn search_with_score(
        &self,
        query: &str,
        filter: &Metadata,
        k: usize,
        score_threshold: Option<f64>,
    ) -> Vec<ScoredDocument> {
        match self
            .try_search_with_score(query, filter, k, score_threshold)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                error!("Vector search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Search without scores
    #[inline]
    pub async fn search(&self, query: &str, filter: &Metadata, k: usize) -> Vec<Document> {
        self.search_with_score(query, filter, k, None)
            .await
            .into_iter()
            .map(|hit| hit.document)
            .collect()
    }

    /// Every stored window whose metadata `key` equals `value`
    #[inline]
    pub async fn documents_by_metadata(
        &self,
        key: &str,
        value: &Value,
    ) -> Result<Vec<Document>, VectorStoreError> {
        let predicate = equality_clause(key, value)?;
        let table = self.table().await?;

        let total = table.count_rows(Some(predicate.clone())).await?;
        if total == 0 {
            return Ok(Vec::new());
        }

        let stream = table.query().only_if(predicate).limit(total).execute().await?;
        Ok(collect_documents(stream)
            .await?
            .into_iter()
            .map(|(document, _)| document)
            .collect())
    }

    /// Remove one row. Returns whether a row was deleted; failures are logged.
    #[inline]
    pub async fn delete_document(&self, id: &str) -> bool {
        let result = async {
            let table = self.table().await?;
            let predicate = format!("`id` = {}", quote(id));
            let matching = table.count_rows(Some(predicate.clone())).await?;
            if matching > 0 {
                table.delete(&predicate).await?;
            }
            Ok::<_, VectorStoreError>(matching)
        }
        .await;

        match result {
            Ok(0) => {
                warn!("No document with id {} to remove", id);
                false
            }
            Ok(_) => {
                info!("Removed document {}", id);
                true
            }
            Err(e) => {
                error!("Failed to remove document {}: {}", id, e);
                false
            }
        }
    }

    #[inline]
    pub async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.table().await?.count_rows(None).await?)
    }

    #[inline]
    pub fn as_retriever(&self, options: SearchOptions) -> Retriever<'_> {
        Retriever {
            store: self,
            options,
        }
    }
}

/// A store paired with fixed search options
#[derive(Debug, Clone)]
pub struct Retriever<'a> {
    store: &'a VectorStore,
    options: SearchOptions,
}

impl Retriever<'_> {
    #[inline]
    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    #[inline]
    pub async fn retrieve_with_scores(&self, query: &str) -> Vec<ScoredDocument> {
        self.store
            .search_with_score(
                query,
                &self.options.filter,
                self.options.k,
                self.options.score_threshold,
            )
            .await
    }

    #[inline]
    pub async fn retrieve(&self, query: &str) -> Vec<Document> {
        self.retrieve_with_scores(query)
            .await
            .into_iter()
            .map(|hit| hit.document)
            .collect()
    }
}
