//! Storage configuration for the asset catalog.
//!
//! Two generic roots (upload and output) plus the allow-listed image
//! extension set. Loaded from an optional TOML file with environment
//! overrides; per-asset-type default locations live in the database, not
//! here.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extensions the scanner and upload intake accept by default.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Storage roots and intake rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for files pushed through the upload intake.
    pub upload_dir: PathBuf,
    /// Root for files produced by the generation workflow.
    pub output_dir: PathBuf,
    /// Lowercase extensions accepted by scans and uploads.
    pub allowed_extensions: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data = Self::data_dir();
        Self {
            upload_dir: data.join("upload/images"),
            output_dir: data.join("output/images"),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl StorageConfig {
    /// `~/.promoflow`, falling back to the current directory.
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".promoflow")
    }

    /// Default database location.
    pub fn default_db_path() -> PathBuf {
        Self::data_dir().join("promoflow.sqlite3")
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults with environment overrides applied
    /// (`PROMOFLOW_UPLOAD_DIR`, `PROMOFLOW_OUTPUT_DIR`,
    /// `PROMOFLOW_ALLOWED_EXTENSIONS` as a comma list).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("PROMOFLOW_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("PROMOFLOW_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Ok(exts) = std::env::var("PROMOFLOW_ALLOWED_EXTENSIONS") {
            config.allowed_extensions = exts
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        config
    }

    /// Create the configured roots if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// True when the file's extension is on the allow list
    /// (case-insensitive).
    pub fn is_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_lowercase();
                self.allowed_extensions.iter().any(|a| a == &e)
            })
            .unwrap_or(false)
    }
}
