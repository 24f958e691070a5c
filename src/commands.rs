use anyhow::{Context, Result};
use console::style;
use std::io::{self, BufReader};
use std::path::Path;
use tracing::{error, info};

use crate::config::{Config, api_key_from_env, resolve_api_key};
use crate::documents::load_docs;
use crate::rag::RagSystem;
use crate::session;

const VALIDATION_RETRIEVAL_QUERY: &str = "What is AI?";
const VALIDATION_ANSWER_QUERY: &str = "What is ChatGPT?";
const PREVIEW_LENGTH: usize = 100;

/// Build the pipeline from `config` and the API key in the environment
#[inline]
pub async fn open_system(config: &Config) -> Result<RagSystem> {
    let api_key = api_key_from_env()?;
    RagSystem::from_config(config, api_key)
        .await
        .context("Failed to initialize RAG system")
}

/// Load every document in `directory` and ingest it, returning the number of
/// documents and chunks
#[inline]
pub async fn ingest_directory(system: &mut RagSystem, directory: &Path) -> Result<(usize, usize)> {
    let documents = load_docs(directory)
        .with_context(|| format!("Failed to load documents from {}", directory.display()))?;

    if documents.is_empty() {
        return Ok((0, 0));
    }

    let chunks = system
        .ingest(&documents)
        .await
        .context("Failed to add documents to the collection")?;

    Ok((documents.len(), chunks))
}

/// Start the interactive question session, loading documents first if the
/// collection is empty
#[inline]
pub async fn run_chat(config: &Config) -> Result<()> {
    println!("{}", style("🤖 RAG System with Gemini AI").bold().cyan());
    println!("{}", "=".repeat(50));
    println!("Initializing RAG system...");

    let mut system = open_system(config).await?;
    println!("✓ {}", system.collection_info().await);

    if system.chunk_count().await? == 0 {
        let documents_path = config.documents_path();
        println!();
        println!("Loading documents from {}...", documents_path.display());

        let (documents, chunks) = ingest_directory(&mut system, &documents_path).await?;
        if documents == 0 {
            println!(
                "{}",
                style(format!(
                    "✗ No documents found in {}",
                    documents_path.display()
                ))
                .red()
            );
            return Ok(());
        }

        println!(
            "{}",
            style(format!(
                "✓ Added {documents} documents ({chunks} chunks) to the system"
            ))
            .green()
        );
    } else {
        println!("✓ Collection already contains data");
    }

    session::run(&system, BufReader::new(io::stdin()), io::stdout()).await
}

/// Ingest a directory of documents regardless of the collection state
#[inline]
pub async fn ingest_documents(config: &Config, directory: Option<&Path>) -> Result<()> {
    let directory = directory.map_or_else(|| config.documents_path(), Path::to_path_buf);
    info!("Ingesting documents from {}", directory.display());

    let mut system = open_system(config).await?;
    let (documents, chunks) = ingest_directory(&mut system, &directory).await?;

    if documents == 0 {
        println!("No documents found in {}", directory.display());
        return Ok(());
    }

    println!("Ingested {documents} documents as {chunks} chunks");
    println!("{}", system.collection_info().await);
    Ok(())
}

/// Answer a single question and exit
#[inline]
pub async fn ask(config: &Config, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        println!("Please enter a valid question.");
        return Ok(());
    }

    let system = open_system(config).await?;
    println!("{}", system.answer_question(question).await);
    Ok(())
}

/// Print the collection summary
#[inline]
pub async fn show_info(config: &Config) -> Result<()> {
    let system = open_system(config).await?;
    println!("{}", system.collection_info().await);
    Ok(())
}

/// Check document loading, initialization, retrieval and generation in turn
#[inline]
pub async fn validate_system(config: &Config) -> Result<()> {
    validate_with_key_lookup(config, |name| std::env::var(name).ok()).await
}

/// Run the validation steps, failing on a missing API key before any of them
async fn validate_with_key_lookup<F>(config: &Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String> + Send,
{
    let api_key = resolve_api_key(lookup)?;

    println!("{}", style("🔍 Validating RAG System Components...").bold());
    println!("{}", "=".repeat(50));

    println!("1. Testing document loading...");
    let documents = load_docs(config.documents_path()).context("Document loading failed")?;
    println!("   ✓ Loaded {} documents", documents.len());

    println!("2. Testing RAG system initialization...");
    let system = RagSystem::from_config(config, api_key)
        .await
        .context("Failed to initialize RAG system")?;
    println!("   ✓ {}", system.collection_info().await);

    println!("3. Testing document retrieval...");
    let chunks = match system
        .knowledge_base()
        .try_retrieve(VALIDATION_RETRIEVAL_QUERY, 3)
        .await
    {
        Ok(chunks) => chunks,
        Err(e) => {
            error!("Retrieval check failed: {}", e);
            println!("   {}", style(format!("✗ Retrieval failed: {e}")).red());
            return Err(e).context("Document retrieval failed");
        }
    };
    println!("   ✓ Retrieved {} relevant documents", chunks.len());

    println!("4. Testing answer generation...");
    let answer = system.answer_question(VALIDATION_ANSWER_QUERY).await;
    println!(
        "   ✓ Generated answer ({} characters)",
        answer.chars().count()
    );
    println!("   Preview: {}...", preview(&answer, PREVIEW_LENGTH));

    println!();
    println!(
        "{}",
        style("✅ All components validated successfully!")
            .bold()
            .green()
    );
    println!("To start asking questions, run: gemini-rag");
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .and_then(|(offset, _)| text.get(..offset))
        .unwrap_or(text)
}
