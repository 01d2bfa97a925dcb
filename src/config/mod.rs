// Configuration management module
// Handles secret resolution and TOML settings for the chat CLI

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, KeyResolver, KeySource, OPENAI_API_KEY, OpenAiConfig, QDRANT_API_KEY,
    QDRANT_URL, QdrantConfig, Settings, save_secrets,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
