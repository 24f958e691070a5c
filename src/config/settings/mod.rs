
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;

pub const CONFIG_FILE_NAME: &str = "rag.toml";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const FALLBACK_API_KEY_ENV: &str = "GOOGLE_API_KEY";

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Directory scanned for `.txt` documents, relative to the base directory
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub batch_size: u32,
    pub timeout_seconds: u64,
    pub embedding_dimension: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    pub n_results: usize,
    /// Upper bound in characters for the context handed to the model
    pub max_context_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// LanceDB directory, relative to the base directory
    pub persist_directory: PathBuf,
    pub collection_name: String,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("news_articles")
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            gemini: GeminiConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            store: StoreConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl Default for GeminiConfig {
    #[inline]
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            embedding_model: "embedding-001".to_string(),
            generation_model: "gemini-1.5-flash".to_string(),
            batch_size: 100,
            timeout_seconds: 60,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            n_results: 5,
            max_context_length: 4000,
        }
    }
}

impl Default for StoreConfig {
    #[inline]
    fn default() -> Self {
        Self {
            persist_directory: PathBuf::from("lancedb_database"),
            collection_name: "rag_collection".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing API key: set {0} in the environment or in a .env file")]
    MissingApiKey(&'static str),
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 100)")]
    InvalidBatchSize(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid result count: {0} (must be between 1 and 100)")]
    InvalidResultCount(usize),
    #[error("Invalid max context length: {0} (must be greater than 0)")]
    InvalidContextLength(usize),
    #[error(
        "Invalid collection name: '{0}' (letters, digits, '_', '-' and '.' only, cannot be empty)"
    )]
    InvalidCollectionName(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load `rag.toml` from `config_dir`, falling back to defaults when absent
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gemini.validate()?;
        validate_chunking(&self.chunking)?;
        self.retrieval.validate()?;
        self.store.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Get the path for the vector database directory
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join(&self.store.persist_directory)
    }

    /// Get the directory documents are loaded from
    #[inline]
    pub fn documents_path(&self) -> PathBuf {
        self.get_base_dir().join(&self.documents_dir)
    }
}

fn validate_chunking(config: &ChunkingConfig) -> Result<(), ConfigError> {
    if config.chunk_size == 0 {
        return Err(ConfigError::InvalidChunkSize(config.chunk_size));
    }

    if config.chunk_overlap >= config.chunk_size {
        return Err(ConfigError::OverlapTooLarge(
            config.chunk_overlap,
            config.chunk_size,
        ));
    }

    Ok(())
}

impl GeminiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_url()?;

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 100 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if self.timeout_seconds == 0 || self.timeout_seconds > 600 {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    /// Base URL of the API, always ending in `/` so model paths join onto it
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let mut url_str = self.base_url.trim().to_string();
        if !url_str.ends_with('/') {
            url_str.push('/');
        }

        let url = Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }

        Ok(url)
    }

    pub fn set_base_url(&mut self, base_url: String) -> Result<(), ConfigError> {
        let temp_config = GeminiConfig {
            base_url: base_url.clone(),
            ..self.clone()
        };
        temp_config.api_url()?;
        self.base_url = base_url;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_generation_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.generation_model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 100 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_results == 0 || self.n_results > 100 {
            return Err(ConfigError::InvalidResultCount(self.n_results));
        }

        if self.max_context_length == 0 {
            return Err(ConfigError::InvalidContextLength(self.max_context_length));
        }

        Ok(())
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_name = !self.collection_name.is_empty()
            && self
                .collection_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

        if !valid_name {
            return Err(ConfigError::InvalidCollectionName(
                self.collection_name.clone(),
            ));
        }

        Ok(())
    }

    pub fn set_collection_name(&mut self, name: String) -> Result<(), ConfigError> {
        let temp_config = StoreConfig {
            collection_name: name.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.collection_name = name;
        Ok(())
    }
}

/// Read the Gemini API key from the process environment
#[inline]
pub fn api_key_from_env() -> Result<String, ConfigError> {
    resolve_api_key(|name| std::env::var(name).ok())
}

/// Resolve the API key through `lookup`, preferring `GEMINI_API_KEY`.
///
/// Blank values count as missing.
#[inline]
pub fn resolve_api_key<F>(lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    [API_KEY_ENV, FALLBACK_API_KEY_ENV]
        .into_iter()
        .filter_map(|name| lookup(name))
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
        .ok_or(ConfigError::MissingApiKey(API_KEY_ENV))
}
