//! Error types for the Promoflow core

use std::io;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Database error: {0}")]
    Db(#[from] promoflow_db::DbError),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// No resolution rule produced an existing path for the asset.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// The path is known to the catalog but unreadable/unwritable.
    /// Distinct from `AssetNotFound`.
    #[error("Filesystem error: {0}")]
    Filesystem(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;
