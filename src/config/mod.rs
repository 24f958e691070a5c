// Configuration management module
// TOML settings, credentials and the interactive editor

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, GeminiConfig, RetrievalConfig, StoreConfig, api_key_from_env,
    resolve_api_key,
};

/// Get the configuration directory path, which is the working directory
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Ok(std::env::current_dir()?)
}
