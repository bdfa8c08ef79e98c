use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Vector store error: {0}")]
    Store(#[from] database::VectorStoreError),

    #[error("Collection error: {0}")]
    Collection(#[from] collector::CollectError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0:#}")]
    Other(#[from] anyhow::Error),
}

pub mod cleaner;
pub mod collector;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod normalizer;
pub mod storage;
