use config::{ConfigError, Environment};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

// Главная структура конфигурации
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageConfig,
    pub allocation: AllocationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

// Настройки хранилища снапшотов
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory of the `fs` backend.
    pub data_dir: PathBuf,
    pub redis_url: String,
    /// Prepended to every Redis key.
    pub key_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    Memory,
    Redis,
}

/// Defaults applied to generation requests that leave them out.
#[derive(Debug, Clone, Deserialize)]
pub struct AllocationConfig {
    pub default_block_width: usize,
    pub allow_adjacent_same_batch: bool,
}

impl Config {
    /// Defaults, then `SEATING_*` variables (`SEATING_STORAGE__BACKEND=redis`).
    /// `RUST_LOG` wins over `SEATING_APP__RUST_LOG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("app.environment", "development")?
            .set_default("app.rust_log", "exam_seating=info")?
            .set_default("app.log_format", "text")?
            .set_default("storage.backend", "fs")?
            .set_default("storage.data_dir", "./data")?
            .set_default("storage.redis_url", "redis://127.0.0.1:6379")?
            .set_default("storage.key_prefix", "exam_seating:")?
            .set_default("allocation.default_block_width", 2)?
            .set_default("allocation.allow_adjacent_same_batch", false)?
            .add_source(
                Environment::with_prefix("SEATING")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        if let Ok(level) = env::var("RUST_LOG") {
            builder = builder.set_override("app.rust_log", level)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        if config.allocation.default_block_width == 0 {
            return Err(ConfigError::Message(
                "allocation.default_block_width must be positive".to_string(),
            ));
        }
        Ok(config)
    }

    /// In-memory storage and stock defaults, for tests and benchmarks.
    pub fn in_memory() -> Self {
        Config {
            app: AppConfig {
                environment: "test".to_string(),
                rust_log: "exam_seating=debug".to_string(),
                log_format: LogFormat::Text,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                data_dir: PathBuf::from("./data"),
                redis_url: "redis://127.0.0.1:6379".to_string(),
                key_prefix: "exam_seating:".to_string(),
            },
            allocation: AllocationConfig {
                default_block_width: crate::seating::blocks::DEFAULT_BLOCK_WIDTH,
                allow_adjacent_same_batch: false,
            },
        }
    }
}
