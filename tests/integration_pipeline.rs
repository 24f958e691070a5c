#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! End-to-end tests for loading, ingesting and answering over an on-disk
//! collection, with in-process embedding and generation.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use gemini_rag::Result;
use gemini_rag::commands::ingest_directory;
use gemini_rag::config::Config;
use gemini_rag::database::ChunkMetadata;
use gemini_rag::documents::load_docs;
use gemini_rag::embeddings::{ChunkingConfig, EmbeddingFunction};
use gemini_rag::generation::TextGenerator;
use gemini_rag::rag::{NO_RESULTS_ANSWER, RagSystem};
use tempfile::TempDir;

const DIMENSION: usize = 64;

/// Bag-of-words embedding over hashed lowercase words
struct WordHashEmbedder;

fn word_hash_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(5381_u64, |hash, byte| {
                hash.wrapping_mul(33) ^ u64::from(byte)
            });
        vector[(hash % DIMENSION as u64) as usize] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    } else {
        vector[0] = 1.0;
    }
    vector
}

impl EmbeddingFunction for WordHashEmbedder {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| word_hash_embedding(text)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(word_hash_embedding(text))
    }
}

/// Echoes how many sources it was shown and keeps the prompts
#[derive(Default)]
struct EchoGenerator {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl TextGenerator for EchoGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        Ok(format!(
            "Answer drawn from {} sources",
            prompt.matches("Source: ").count()
        ))
    }
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn create_test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::create_dir_all(temp_dir.path().join("news_articles")).expect("should create docs dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    (config, temp_dir)
}

fn write_article(config: &Config, name: &str, text: &str) {
    fs::write(config.documents_path().join(name), text).expect("should write article");
}

async fn build_system(config: &Config, model: Arc<EchoGenerator>) -> RagSystem {
    RagSystem::new(config, Arc::new(WordHashEmbedder), model)
        .await
        .expect("should build RAG system")
}

#[tokio::test]
async fn single_file_round_trip() {
    init_test_tracing();
    let (config, _temp_dir) = create_test_config();
    write_article(&config, "a.txt", "AI is transforming industries.");

    let model = Arc::new(EchoGenerator::default());
    let mut system = build_system(&config, model.clone()).await;

    let (documents, chunks) = ingest_directory(&mut system, &config.documents_path())
        .await
        .expect("should ingest");
    assert_eq!((documents, chunks), (1, 1));

    let retrieved = system
        .knowledge_base()
        .retrieve("What does AI do?", 5)
        .await;
    assert_eq!(retrieved.len(), 1);
    assert_eq!(retrieved[0].content, "AI is transforming industries.");
    assert_eq!(
        retrieved[0].metadata,
        ChunkMetadata {
            source: "a.txt".to_string(),
            chunk_index: 0,
            total_chunks: 1,
        }
    );

    let answer = system.answer("What does AI do?", 5).await;
    assert_eq!(answer, "Answer drawn from 1 sources");
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn loader_skips_non_text_and_empty_files() {
    let (config, _temp_dir) = create_test_config();
    write_article(&config, "b.txt", "Second article about chips.");
    write_article(&config, "a.TXT", "First article about models.");
    write_article(&config, "empty.txt", "   \n\t");
    write_article(&config, "notes.md", "# not loaded");
    fs::write(config.documents_path().join("binary.txt"), [0xff, 0xfe, 0x00])
        .expect("should write binary file");

    let documents = load_docs(config.documents_path()).expect("should load documents");

    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a.TXT", "b.txt"]);
    assert_eq!(documents[0].text, "First article about models.");
}

#[tokio::test]
async fn missing_documents_directory_is_an_error() {
    let (config, temp_dir) = create_test_config();
    let model = Arc::new(EchoGenerator::default());
    let mut system = build_system(&config, model).await;

    let result = ingest_directory(&mut system, &temp_dir.path().join("missing")).await;

    assert!(result.is_err());
    assert_eq!(system.chunk_count().await.expect("should count"), 0);
}

#[tokio::test]
async fn empty_directory_ingests_nothing() {
    let (config, _temp_dir) = create_test_config();
    let model = Arc::new(EchoGenerator::default());
    let mut system = build_system(&config, model.clone()).await;

    let counts = ingest_directory(&mut system, &config.documents_path())
        .await
        .expect("empty directory is not an error");

    assert_eq!(counts, (0, 0));
    assert_eq!(system.answer_question("What is AI?").await, NO_RESULTS_ANSWER);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn long_articles_are_chunked_and_bounded_in_prompt() {
    let (mut config, _temp_dir) = create_test_config();
    config.chunking = ChunkingConfig {
        chunk_size: 200,
        chunk_overlap: 50,
    };
    config.retrieval.max_context_length = 500;

    let article = "Investors poured money into AI startups building language models. "
        .repeat(20);
    write_article(&config, "investments.txt", &article);
    write_article(&config, "weather.txt", "Rain is expected across the region tomorrow.");

    let model = Arc::new(EchoGenerator::default());
    let mut system = build_system(&config, model.clone()).await;
    let (_, chunks) = ingest_directory(&mut system, &config.documents_path())
        .await
        .expect("should ingest");

    let article_len = article.trim().chars().count();
    let expected_article_chunks = (article_len - 50).div_ceil(150);
    assert_eq!(chunks, expected_article_chunks + 1);

    system
        .answer("Investors poured money into AI startups", 5)
        .await;

    let prompts = model.prompts.lock().expect("prompt log poisoned");
    let prompt = prompts.last().expect("model was called");
    let context = prompt
        .split("Context:\n")
        .nth(1)
        .and_then(|rest| rest.split("\n\nQuestion: ").next())
        .expect("prompt contains context");
    assert!(context.chars().count() <= 500);
    assert!(context.starts_with("Source: investments.txt\n"));
}

#[tokio::test]
async fn reingesting_does_not_duplicate_chunks() {
    let (config, _temp_dir) = create_test_config();
    write_article(&config, "a.txt", "AI is transforming industries.");
    write_article(&config, "b.txt", "ChatGPT is a chatbot.");

    let model = Arc::new(EchoGenerator::default());
    let mut system = build_system(&config, model).await;

    for _ in 0..3 {
        ingest_directory(&mut system, &config.documents_path())
            .await
            .expect("should ingest");
    }

    assert_eq!(system.chunk_count().await.expect("should count"), 2);
    let retrieved = system.knowledge_base().retrieve("chatbot", 10).await;
    assert_eq!(retrieved.len(), 2);
}

#[tokio::test]
async fn collection_survives_restart() {
    let (config, _temp_dir) = create_test_config();
    write_article(&config, "a.txt", "AI is transforming industries.");

    {
        let mut system = build_system(&config, Arc::new(EchoGenerator::default())).await;
        ingest_directory(&mut system, &config.documents_path())
            .await
            .expect("should ingest");
    }

    let model = Arc::new(EchoGenerator::default());
    let system = build_system(&config, model.clone()).await;

    assert_eq!(
        system.collection_info().await,
        "Collection 'rag_collection' contains 1 documents/chunks"
    );
    assert_eq!(
        system.answer_question("What does AI do?").await,
        "Answer drawn from 1 sources"
    );
}
