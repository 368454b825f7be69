//! Directory scan & reconcile
//!
//! Synchronous recursive traversal; the catalog has no background workers.
//! Concurrent scans of the same directory are not mutually excluded - they
//! may create overlapping rows, which the next reclassify pass corrects.

use super::resolver::normalize_path;
use crate::config::StorageConfig;
use crate::error::{CoreError, Result};
use promoflow_db::{AssetType, PromoDb, ReclassifyReport, ScanEntry, ScanReport};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::info;
use walkdir::WalkDir;

/// Scans directories into the catalog and reconciles classification drift.
pub struct Scanner {
    db: PromoDb,
    config: StorageConfig,
}

impl Scanner {
    pub fn new(db: PromoDb, config: StorageConfig) -> Self {
        Self { db, config }
    }

    /// Scan a directory, adding any image file not yet catalogued.
    ///
    /// Files already known by local path are skipped (or retyped when a
    /// different asset type is requested). Same-named upload records under a
    /// managed root get their asset type corrected. Re-running on an
    /// unchanged directory reports `added = 0`.
    pub async fn scan(
        &self,
        directory: &Path,
        asset_type: Option<AssetType>,
    ) -> Result<ScanReport> {
        if !directory.is_dir() {
            return Err(CoreError::Validation(format!(
                "not a directory: {}",
                directory.display()
            )));
        }

        let entries = self.collect_entries(directory)?;
        let prefixes = self.managed_prefixes().await?;
        let report = self
            .db
            .catalog_apply_scan(&entries, asset_type, &prefixes)
            .await?;

        info!(
            directory = %directory.display(),
            added = report.added,
            updated = report.updated,
            skipped = report.skipped,
            total = report.total_files,
            "Directory scan complete"
        );
        Ok(report)
    }

    /// Retype everything under a directory and collapse upload duplicates.
    ///
    /// Local records under the directory move to the requested asset type;
    /// upload records sharing any filename found below the directory are
    /// deduplicated to one survivor per filename, which also gets the
    /// requested type. Idempotent on an unchanged tree.
    pub async fn reclassify(
        &self,
        directory: &Path,
        asset_type: AssetType,
    ) -> Result<ReclassifyReport> {
        if !directory.is_dir() {
            return Err(CoreError::Validation(format!(
                "not a directory: {}",
                directory.display()
            )));
        }

        let mut filenames = BTreeSet::new();
        for entry in WalkDir::new(directory) {
            let entry = entry?;
            if entry.file_type().is_file() {
                filenames.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        let filenames: Vec<String> = filenames.into_iter().collect();

        let dir = normalize_path(&directory.to_string_lossy());
        let report = self
            .db
            .catalog_apply_reclassify(&dir, &filenames, asset_type)
            .await?;

        info!(
            directory = %directory.display(),
            asset_type = %asset_type,
            updated_local = report.updated_local,
            updated_upload = report.updated_upload,
            "Reclassify complete"
        );
        Ok(report)
    }

    /// Walk a directory for allow-listed files, sorted for deterministic
    /// batch application.
    fn collect_entries(&self, directory: &Path) -> Result<Vec<ScanEntry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(directory) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if !self.config.is_allowed(entry.path()) {
                continue;
            }

            let metadata = entry.metadata()?;
            let mtime_millis = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or_else(PromoDb::now_millis);

            entries.push(ScanEntry {
                path: normalize_path(&entry.path().to_string_lossy()),
                filename: entry.file_name().to_string_lossy().into_owned(),
                mtime_millis,
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Root prefixes an upload record's storage path may sit under for its
    /// asset type to be corrected during a scan: the bare markers, the
    /// configured roots, and every default-location directory.
    async fn managed_prefixes(&self) -> Result<Vec<String>> {
        let mut prefixes = vec![
            "uploads/".to_string(),
            "upload/".to_string(),
            "output/".to_string(),
            normalize_path(&self.config.upload_dir.to_string_lossy()),
            normalize_path(&self.config.output_dir.to_string_lossy()),
        ];
        prefixes.extend(self.db.location_map().await?.into_values().map(|d| normalize_path(&d)));
        Ok(prefixes)
    }
}
