// Embeddings module
// Ollama integration and player-performance chunk building

pub mod chunking;
pub mod ollama;

use anyhow::Result;
use async_trait::async_trait;

pub use chunking::{ChunkError, MatchContext, PlayerChunk, build_chunks};
pub use ollama::OllamaClient;

/// Turns text into a fixed-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder is expected to return
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}
