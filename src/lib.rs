pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod models;

pub use error::{Error, Result};
pub use models::{
    DifficultyMatrix, ItemProperties, ItemVariant, Outcome, Phase, ReviewItem, ReviewSession,
    SessionSummary, Tally, compute_next,
};
