// Database module
// LanceDB-backed vector storage for player-performance chunks

pub mod vector_store;

pub use vector_store::{
    Document, EMBEDDING_DIMENSION, Metadata, Retriever, ScoredDocument, SearchOptions,
    VectorStore, VectorStoreError,
};
