use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::ChatError;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const QDRANT_URL: &str = "QDRANT_URL";
pub const QDRANT_API_KEY: &str = "QDRANT_API_KEY";

const SETTINGS_FILE: &str = "config.toml";
const SECRETS_FILE: &str = "secrets.toml";

/// Fully resolved runtime configuration. Secrets come from the ordered
/// key sources, tunables from the optional settings file.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub qdrant: QdrantConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: String,
    pub collection: String,
    pub top_k: usize,
    pub vector_dimension: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Missing required key '{key}' (consulted sources: {sources})")]
    MissingKey { key: String, sources: String },
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid vector dimension: {0} (must be nonzero)")]
    InvalidDimension(u64),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for ChatError {
    #[inline]
    fn from(err: ConfigError) -> Self {
        ChatError::Config(err.to_string())
    }
}

/// Tunable settings, all optional in the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub openai: OpenAiSettings,
    pub qdrant: QdrantSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiSettings {
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QdrantSettings {
    pub collection: String,
    pub top_k: usize,
    pub vector_dimension: u64,
}

impl Default for OpenAiSettings {
    #[inline]
    fn default() -> Self {
        Self {
            chat_model: "gpt-4".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            temperature: 0.1,
        }
    }
}

impl Default for QdrantSettings {
    #[inline]
    fn default() -> Self {
        Self {
            collection: "kimia-assess".to_string(),
            top_k: 5,
            vector_dimension: 1536,
        }
    }
}

/// A named source of secret values.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Flat `KEY = "value"` table loaded from the secrets file.
    SecretsFile { path: PathBuf, table: toml::Table },
    /// Process environment variables.
    Environment,
}

impl KeySource {
    #[inline]
    pub fn name(&self) -> String {
        match self {
            KeySource::SecretsFile { path, .. } => format!("secrets file {}", path.display()),
            KeySource::Environment => "environment".to_string(),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        let value = match self {
            KeySource::SecretsFile { table, .. } => table
                .get(key)
                .and_then(|v| v.as_str())
                .map(ToString::to_string),
            KeySource::Environment => env::var(key).ok(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

/// Ordered list of key sources; the first source holding a non-empty
/// value for a key wins.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    sources: Vec<KeySource>,
}

impl KeyResolver {
    /// Build the default resolver for a config directory: the secrets
    /// file (if present), then the process environment.
    #[inline]
    pub fn from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let mut sources = Vec::new();

        let secrets_path = dir.join(SECRETS_FILE);
        if secrets_path.exists() {
            let content = fs::read_to_string(&secrets_path)?;
            let table: toml::Table = toml::from_str(&content)?;
            sources.push(KeySource::SecretsFile {
                path: secrets_path,
                table,
            });
        }

        sources.push(KeySource::Environment);

        Ok(Self { sources })
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|source| source.get(key))
    }

    #[inline]
    pub fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
            sources: self.source_names(),
        })
    }

    fn source_names(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Config {
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".kimia-chat"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn settings_file_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(SETTINGS_FILE))
    }

    #[inline]
    pub fn secrets_file_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(SECRETS_FILE))
    }

    /// Resolve the full configuration from the default config directory.
    ///
    /// Fails before any provider call is made when a required key is
    /// missing from every source.
    #[inline]
    pub fn resolve() -> Result<Self> {
        let dir = Self::config_dir().context("Failed to determine config directory")?;
        Self::resolve_from(&dir)
    }

    /// Resolve using an explicit config directory. Used directly by tests.
    #[inline]
    pub fn resolve_from(dir: &Path) -> Result<Self> {
        let settings = Settings::load_from(dir).context("Failed to load settings file")?;
        let resolver = KeyResolver::from_dir(dir).context("Failed to read secrets file")?;

        let config = Self {
            openai: OpenAiConfig {
                api_key: resolver.require(OPENAI_API_KEY)?,
                chat_model: settings.openai.chat_model,
                embedding_model: settings.openai.embedding_model,
                temperature: settings.openai.temperature,
            },
            qdrant: QdrantConfig {
                url: resolver.require(QDRANT_URL)?,
                api_key: resolver.require(QDRANT_API_KEY)?,
                collection: settings.qdrant.collection,
                top_k: settings.qdrant.top_k,
                vector_dimension: settings.qdrant.vector_dimension,
            },
        };

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.openai.validate()?;
        self.qdrant.validate()
    }

    #[inline]
    pub fn qdrant_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.qdrant.url).map_err(|_| ConfigError::InvalidUrl(self.qdrant.url.clone()))
    }
}

impl OpenAiConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        Ok(())
    }
}

impl QdrantConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.url).map_err(|_| ConfigError::InvalidUrl(self.url.clone()))?;

        if self.top_k == 0 || self.top_k > 100 {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        if self.vector_dimension == 0 {
            return Err(ConfigError::InvalidDimension(self.vector_dimension));
        }

        Ok(())
    }
}

impl Settings {
    #[inline]
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }
}

/// Write the secrets file, creating the config directory if needed.
#[inline]
pub fn save_secrets(
    dir: &Path,
    openai_api_key: &str,
    qdrant_url: &str,
    qdrant_api_key: &str,
) -> Result<PathBuf, ConfigError> {
    fs::create_dir_all(dir)?;

    let mut table = toml::Table::new();
    table.insert(
        OPENAI_API_KEY.to_string(),
        toml::Value::String(openai_api_key.to_string()),
    );
    table.insert(
        QDRANT_URL.to_string(),
        toml::Value::String(qdrant_url.to_string()),
    );
    table.insert(
        QDRANT_API_KEY.to_string(),
        toml::Value::String(qdrant_api_key.to_string()),
    );

    let path = dir.join(SECRETS_FILE);
    let content = toml::to_string_pretty(&table)?;
    fs::write(&path, content)?;

    Ok(path)
}
