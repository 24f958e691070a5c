
use tracing::{debug, error, info, warn};

use super::RetrievedChunk;
use crate::Result;
use crate::database::{ChunkMetadata, VectorStore};
use crate::documents::Document;
use crate::embeddings::ChunkingConfig;

/// Chunks documents into the vector store and retrieves them by similarity
pub struct KnowledgeBase {
    store: VectorStore,
    chunking: ChunkingConfig,
}

/// Parallel columns of one ingestion batch
#[derive(Debug, Default)]
struct ChunkBatch {
    documents: Vec<String>,
    ids: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
}

impl KnowledgeBase {
    /// Wrap `store`, cutting documents with `chunking`.
    ///
    /// An invalid chunking configuration is rejected here rather than on the
    /// first ingestion.
    #[inline]
    pub fn new(store: VectorStore, chunking: ChunkingConfig) -> Result<Self> {
        chunking.stride()?;
        Ok(Self { store, chunking })
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.store.name()
    }

    /// Chunk `documents` and write every chunk to the store in one batch.
    ///
    /// Chunks previously stored for any of the batch's sources are replaced.
    /// Returns the number of chunks written.
    #[inline]
    pub async fn add_documents(&mut self, documents: &[Document]) -> Result<usize> {
        if documents.is_empty() {
            warn!("No documents to add");
            return Ok(0);
        }

        let batch = self.chunk_documents(documents)?;
        if batch.ids.is_empty() {
            warn!("Documents produced no chunks, nothing to add");
            return Ok(0);
        }

        let mut sources: Vec<String> = batch
            .metadatas
            .iter()
            .map(|metadata| metadata.source.clone())
            .collect();
        sources.sort();
        sources.dedup();

        self.store
            .replace_sources(&batch.documents, &batch.ids, &batch.metadatas, &sources)
            .await?;

        info!(
            "Added {} chunks from {} documents to collection '{}'",
            batch.ids.len(),
            documents.len(),
            self.store.name()
        );
        Ok(batch.ids.len())
    }

    fn chunk_documents(&self, documents: &[Document]) -> Result<ChunkBatch> {
        let mut batch = ChunkBatch::default();

        for document in documents {
            let chunks = self.chunking.split(&document.text)?;
            let total_chunks = u32::try_from(chunks.len()).unwrap_or(u32::MAX);
            debug!("Document '{}' split into {} chunks", document.id, chunks.len());

            for (index, chunk) in chunks.into_iter().enumerate() {
                batch.ids.push(format!("{}_chunk_{}", document.id, index));
                batch.metadatas.push(ChunkMetadata {
                    source: document.id.clone(),
                    chunk_index: u32::try_from(index).unwrap_or(u32::MAX),
                    total_chunks,
                });
                batch.documents.push(chunk);
            }
        }

        Ok(batch)
    }

    /// Retrieve up to `n_results` chunks for `query`, nearest first.
    ///
    /// Failures are logged and reported as no results.
    #[inline]
    pub async fn retrieve(&self, query: &str, n_results: usize) -> Vec<RetrievedChunk> {
        match self.try_retrieve(query, n_results).await {
            Ok(chunks) => chunks,
            Err(e) => {
                error!("Error retrieving documents: {}", e);
                Vec::new()
            }
        }
    }

    #[inline]
    pub async fn try_retrieve(&self, query: &str, n_results: usize) -> Result<Vec<RetrievedChunk>> {
        let matches = self.store.query(query, n_results).await?;
        debug!("Retrieved {} chunks for query", matches.len());
        Ok(matches.into_iter().map(RetrievedChunk::from).collect())
    }

    /// Human-readable summary of the collection
    #[inline]
    pub async fn collection_info(&self) -> String {
        match self.chunk_count().await {
            Ok(count) => format!(
                "Collection '{}' contains {} documents/chunks",
                self.store.name(),
                count
            ),
            Err(e) => format!("Error getting collection info: {e}"),
        }
    }

    #[inline]
    pub async fn chunk_count(&self) -> Result<u64> {
        self.store.count().await
    }
}
