// RAG module
// Ingestion, retrieval and grounded answer generation

pub mod generator;
pub mod knowledge_base;


use std::sync::Arc;

use tracing::{debug, info};

use crate::Result;
use crate::config::Config;
use crate::database::{ChunkMetadata, QueryMatch, VectorStore};
use crate::documents::Document;
use crate::embeddings::EmbeddingFunction;
use crate::gemini::GeminiClient;
use crate::generation::TextGenerator;

pub use generator::{AnswerGenerator, NO_CONTEXT_ANSWER, build_context, build_prompt};
pub use knowledge_base::KnowledgeBase;

pub const NO_RESULTS_ANSWER: &str =
    "I couldn't find any relevant information to answer your question.";

/// A chunk returned for a query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Distance to the query, smaller is closer
    pub distance: Option<f32>,
}

impl From<QueryMatch> for RetrievedChunk {
    #[inline]
    fn from(query_match: QueryMatch) -> Self {
        Self {
            content: query_match.content,
            metadata: query_match.metadata,
            distance: query_match.distance,
        }
    }
}

/// The question answering pipeline: a knowledge base and an answer generator
/// sharing one configuration.
pub struct RagSystem {
    knowledge_base: KnowledgeBase,
    generator: AnswerGenerator,
    n_results: usize,
}

impl RagSystem {
    /// Build the pipeline on the Gemini API, using one client for both
    /// embeddings and generation
    #[inline]
    pub async fn from_config(config: &Config, api_key: impl Into<String>) -> Result<Self> {
        let client = Arc::new(GeminiClient::new(&config.gemini, api_key)?);
        Self::new(config, client.clone(), client).await
    }

    /// Build the pipeline with the given embedding function and model
    #[inline]
    pub async fn new(
        config: &Config,
        embedder: Arc<dyn EmbeddingFunction>,
        model: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        let store = VectorStore::new(config, embedder).await?;
        let knowledge_base = KnowledgeBase::new(store, config.chunking)?;
        let generator = AnswerGenerator::new(model, config.retrieval.max_context_length);

        info!("RAG system ready on collection '{}'", knowledge_base.name());

        Ok(Self {
            knowledge_base,
            generator,
            n_results: config.retrieval.n_results,
        })
    }

    #[inline]
    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    #[inline]
    pub fn generator(&self) -> &AnswerGenerator {
        &self.generator
    }

    /// Chunk and store `documents`, returning the number of chunks written
    #[inline]
    pub async fn ingest(&mut self, documents: &[Document]) -> Result<usize> {
        self.knowledge_base.add_documents(documents).await
    }

    /// Answer `query` from the `n_results` nearest chunks
    #[inline]
    pub async fn answer(&self, query: &str, n_results: usize) -> String {
        let chunks = self.knowledge_base.retrieve(query, n_results).await;

        if chunks.is_empty() {
            debug!("No chunks retrieved for query");
            return NO_RESULTS_ANSWER.to_string();
        }

        self.generator.generate_answer(query, &chunks)
    }

    /// Answer `query` using the configured number of results
    #[inline]
    pub async fn answer_question(&self, query: &str) -> String {
        self.answer(query, self.n_results).await
    }

    #[inline]
    pub async fn collection_info(&self) -> String {
        self.knowledge_base.collection_info().await
    }

    #[inline]
    pub async fn chunk_count(&self) -> Result<u64> {
        self.knowledge_base.chunk_count().await
    }
}
