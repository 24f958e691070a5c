use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error(
        "Invalid chunking configuration: overlap {chunk_overlap} must be smaller than chunk size {chunk_size}"
    )]
    InvalidChunking {
        chunk_size: usize,
        chunk_overlap: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<config::ConfigError> for RagError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod documents;
pub mod embeddings;
pub mod gemini;
pub mod generation;
pub mod rag;
pub mod session;
