//! # configs
//!
//! Typed application settings, layered as: built-in defaults, then an
//! optional `content.toml`, then `CONTENT__SECTION__KEY` environment
//! variables (a `.env` file is read first when present).

use std::time::Duration;

use config::{Config, ConfigBuilder, Environment, File};
use domains::MediaIndexPolicy;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// May carry credentials for remote backends.
    pub database_url: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionConfig {
    /// Optimistic commit attempts before giving up with a conflict.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl TransactionConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    pub story_duration_secs: u64,
    pub media_index_policy: MediaIndexPolicy,
}

impl ContentConfig {
    pub fn story_duration(&self) -> Duration {
        Duration::from_secs(self.story_duration_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub transaction: TransactionConfig,
    pub content: ContentConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Reads `.env`, `content.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        let builder = defaults()?
            .add_source(File::with_name("content").required(false))
            .add_source(
                Environment::with_prefix("CONTENT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self, ConfigError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.transaction.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "transaction.max_attempts must be at least 1".into(),
            ));
        }
        if self.content.story_duration_secs == 0 {
            return Err(ConfigError::Invalid(
                "content.story_duration_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database_url: SecretString::from("sqlite://content.db".to_string()),
            },
            transaction: TransactionConfig {
                max_attempts: 5,
                backoff_base_ms: 10,
            },
            content: ContentConfig {
                story_duration_secs: 24 * 60 * 60,
                media_index_policy: MediaIndexPolicy::Ignore,
            },
            log: LogConfig {
                filter: "info".into(),
                json: false,
            },
        }
    }
}

fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Ok(Config::builder()
        .set_default("store.backend", "memory")?
        .set_default("store.database_url", "sqlite://content.db")?
        .set_default("transaction.max_attempts", 5_i64)?
        .set_default("transaction.backoff_base_ms", 10_i64)?
        .set_default("content.story_duration_secs", 86_400_i64)?
        .set_default("content.media_index_policy", "ignore")?
        .set_default("log.filter", "info")?
        .set_default("log.json", false)?)
}
