use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gemini_rag::commands::{ask, ingest_documents, run_chat, show_info, validate_system};
use gemini_rag::config::{Config, get_config_dir, run_interactive_config, show_config};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gemini-rag")]
#[command(about = "Ask questions about a folder of text files, answered by Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and index the documents directory
    Ingest {
        /// Directory to load instead of the configured one
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Answer a single question
    Ask {
        /// The question to answer
        question: String,
    },
    /// Show how many chunks the collection holds
    Info,
    /// Check that loading, retrieval and generation all work
    Validate,
    /// Configure the Gemini models and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config_dir = get_config_dir()?;

    match cli.command {
        Some(Commands::Config { show }) => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        None => {
            run_chat(&Config::load(&config_dir)?).await?;
        }
        Some(Commands::Ingest { dir }) => {
            ingest_documents(&Config::load(&config_dir)?, dir.as_deref()).await?;
        }
        Some(Commands::Ask { question }) => {
            ask(&Config::load(&config_dir)?, &question).await?;
        }
        Some(Commands::Info) => {
            show_info(&Config::load(&config_dir)?).await?;
        }
        Some(Commands::Validate) => {
            validate_system(&Config::load(&config_dir)?).await?;
        }
    }

    Ok(())
}
