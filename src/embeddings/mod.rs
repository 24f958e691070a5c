// Embeddings module
// Text chunking and the embedding function used by the vector store

pub mod chunking;
#[cfg(test)]
pub(crate) mod testing;

pub use chunking::{ChunkingConfig, chunk_windows, split_text};

use crate::Result;

/// Turns text into vectors for similarity search.
///
/// Documents and queries are embedded separately because providers tune the
/// vectors for their role in retrieval.
pub trait EmbeddingFunction: Send + Sync {
    /// Embed a batch of stored texts, returning one vector per input in order
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
