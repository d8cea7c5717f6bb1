//! Configuration for the review application.

use crate::database::{MatrixStore, SqliteStore};
use crate::error::{Error, Result};
use crate::export::JsonMatrixFile;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

const APP_NAME: &str = "sm5-review";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Reads the config file, falling back to defaults when it is missing or invalid.
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|s| Self::from_toml(&s).ok())
            .unwrap_or_default()
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", APP_NAME)
            .map(|d| d.config_dir().join("config.toml"))
    }

    fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", APP_NAME)
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("review.sqlite3"))
    }

    pub fn matrix_file_path(&self) -> PathBuf {
        self.matrix
            .file_path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("difficulty-matrix.json"))
    }

    /// Durable matrix store selected by `matrix.storage`.
    pub fn matrix_store(&self, database: Arc<SqliteStore>) -> Arc<dyn MatrixStore> {
        match self.matrix.storage {
            MatrixStorage::Database => database as Arc<dyn MatrixStore>,
            MatrixStorage::File => Arc::new(JsonMatrixFile::new(self.matrix_file_path())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Where the difficulty matrix is persisted. A dedicated file per collection
/// keeps matrices separate; the database backend shares one per database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatrixStorage {
    #[default]
    Database,
    File,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixConfig {
    #[serde(default)]
    pub storage: MatrixStorage,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_cards_limit")]
    pub cards_limit: usize,
    #[serde(default)]
    pub start_read_only: bool,
}

fn default_cards_limit() -> usize {
    50
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            cards_limit: default_cards_limit(),
            start_read_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}
