
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use std::path::{Path, PathBuf};

use super::{Config, ConfigError, GeminiConfig, api_key_from_env};
use crate::embeddings::chunking::ChunkingConfig;
use crate::gemini::GeminiClient;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Gemini RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Gemini Configuration").bold().yellow());
    eprintln!("Models used for embeddings and answer generation.");
    eprintln!();

    configure_gemini(&mut config.gemini)?;

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());
    eprintln!();

    configure_retrieval(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    match test_gemini_connection(&config) {
        Ok(()) => eprintln!("{}", style("✓ Gemini API reachable!").green()),
        Err(e) => {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not reach the Gemini API").yellow()
            );
            eprintln!("  {e:#}");
            eprintln!("You can continue, but set GEMINI_API_KEY before asking questions.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Gemini Settings:").bold().yellow());
    match config.gemini.api_url() {
        Ok(url) => eprintln!("  API URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  API URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  Embedding Model: {}",
        style(&config.gemini.embedding_model).cyan()
    );
    eprintln!(
        "  Generation Model: {}",
        style(&config.gemini.generation_model).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.gemini.batch_size).cyan());
    eprintln!(
        "  Timeout: {}s",
        style(config.gemini.timeout_seconds).cyan()
    );
    let key_status = if api_key_from_env().is_ok() {
        style("set").green()
    } else {
        style("missing").red()
    };
    eprintln!("  API Key: {key_status}");

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!(
        "  Chunk Size: {} characters",
        style(config.chunking.chunk_size).cyan()
    );
    eprintln!(
        "  Chunk Overlap: {} characters",
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Results: {}", style(config.retrieval.n_results).cyan());
    eprintln!(
        "  Max Context: {} characters",
        style(config.retrieval.max_context_length).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Storage:").bold().yellow());
    eprintln!(
        "  Documents: {}",
        style(config.documents_path().display()).cyan()
    );
    eprintln!(
        "  Vector Store: {}",
        style(config.vector_database_path().display()).cyan()
    );
    eprintln!(
        "  Collection: {}",
        style(&config.store.collection_name).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    let existed = config_dir.join(super::settings::CONFIG_FILE_NAME).exists();

    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("Existing configuration is invalid. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            if existed {
                eprintln!("{}", style("Found existing configuration.").green());
            } else {
                eprintln!(
                    "{}",
                    style("No existing configuration found. Using defaults.").yellow()
                );
            }
            Ok(config)
        },
    )
}

fn configure_gemini(gemini: &mut GeminiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Gemini API base URL")
        .default(gemini.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = GeminiConfig {
                base_url: input.clone(),
                ..GeminiConfig::default()
            };
            temp_config.api_url()?;
            Ok(())
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(gemini.embedding_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let generation_model: String = Input::new()
        .with_prompt("Generation model")
        .default(gemini.generation_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding requests")
        .default(gemini.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 100 {
                Err("Batch size must be 100 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    gemini.set_base_url(base_url)?;
    gemini.set_embedding_model(embedding_model)?;
    gemini.set_generation_model(generation_model)?;
    gemini.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    let documents_dir: String = Input::new()
        .with_prompt("Documents directory")
        .default(config.documents_dir.display().to_string())
        .interact_text()?;

    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(config.chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Chunk size must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(config.chunking.chunk_overlap.min(chunk_size.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), String> {
            if *input >= chunk_size {
                Err(format!("Overlap must be smaller than {chunk_size}"))
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let n_results: usize = Input::new()
        .with_prompt("Chunks retrieved per question")
        .default(config.retrieval.n_results)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 || *input > 100 {
                Err("Must be between 1 and 100")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let max_context_length: usize = Input::new()
        .with_prompt("Max context length (characters)")
        .default(config.retrieval.max_context_length)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Context length must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let collection_name: String = Input::new()
        .with_prompt("Collection name")
        .default(config.store.collection_name.clone())
        .interact_text()?;

    config.documents_dir = PathBuf::from(documents_dir);
    config.chunking = ChunkingConfig {
        chunk_size,
        chunk_overlap,
    };
    config.retrieval.n_results = n_results;
    config.retrieval.max_context_length = max_context_length;
    config.store.set_collection_name(collection_name)?;

    Ok(())
}

fn test_gemini_connection(config: &Config) -> Result<()> {
    let api_key = api_key_from_env()?;
    let client = GeminiClient::new(&config.gemini, api_key)?
        .with_timeout(std::time::Duration::from_secs(5));
    client.health_check()
}
