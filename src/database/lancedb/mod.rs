// LanceDB vector database module
// Handles vector storage and similarity search for chunk embeddings


pub mod vector_store;

pub use vector_store::VectorStore;

use serde::{Deserialize, Serialize};

/// Metadata stored alongside every chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// File name of the document the chunk was cut from
    pub source: String,
    /// Position of this chunk within its document
    pub chunk_index: u32,
    /// Number of chunks the document was split into
    pub total_chunks: u32,
}

/// Embedding record written to LanceDB
#[derive(Debug, Clone)]
pub(crate) struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub created_at: String,
}

/// A stored chunk returned by a similarity query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// L2 distance to the query vector, when LanceDB reports one
    pub distance: Option<f32>,
}
