//! Error type shared by the scheduler, the review session and the stores.

use crate::models::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Action not allowed: {0}")]
    ActionNotAllowed(&'static str),

    #[error("Difficulty matrix lock poisoned")]
    LockPoisoned,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
