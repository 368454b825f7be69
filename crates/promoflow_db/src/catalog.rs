//! Catalog database operations (images & default locations)

use crate::error::{DbError, Result};
use crate::types::*;
use crate::PromoDb;
use sqlx::Row;
use std::collections::{BTreeMap, HashMap};

/// True when a logical storage path sits under one of the managed root
/// prefixes (upload root, output root, a configured default location, or a
/// bare `uploads/` / `upload/` / `output/` marker).
fn storage_under(storage_path: &str, prefixes: &[String]) -> bool {
    let s = storage_path.replace('\\', "/");
    prefixes.iter().any(|p| {
        let p = p.replace('\\', "/");
        let p = p.trim_end_matches('/');
        if p.is_empty() {
            return false;
        }
        s == p || s.starts_with(&format!("{}/", p))
    })
}

impl PromoDb {
    // ========================================================================
    // Image Operations
    // ========================================================================

    /// Insert a new image record.
    ///
    /// Enforces the source-kind invariant: `local_path` is populated iff the
    /// source kind is `local_dir`.
    pub async fn image_create(&self, new: &NewImage) -> Result<Image> {
        match (new.source_kind, &new.local_path) {
            (SourceKind::LocalDir, None) => {
                return Err(DbError::validation(
                    "local_dir images require a local_path",
                ));
            }
            (SourceKind::Upload | SourceKind::Generated, Some(_)) => {
                return Err(DbError::validation(
                    "local_path is only valid for local_dir images",
                ));
            }
            _ => {}
        }
        if new.filename.is_empty() {
            return Err(DbError::validation("filename must not be empty"));
        }

        let attributes = new
            .attributes
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let created_at = new
            .created_at
            .map(|t| t.timestamp_millis())
            .unwrap_or_else(Self::now_millis);

        let result = sqlx::query(
            r#"
            INSERT INTO images (filename, source_kind, asset_type, storage_path,
                                local_path, participated, attributes, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&new.filename)
        .bind(new.source_kind.as_str())
        .bind(new.asset_type.as_str())
        .bind(&new.storage_path)
        .bind(&new.local_path)
        .bind(&attributes)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.image_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("image {id}")))
    }

    /// Get an image by ID.
    pub async fn image_get(&self, id: i64) -> Result<Option<Image>> {
        let row = sqlx::query("SELECT * FROM images WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_image(&r)).transpose()
    }

    /// Get the image whose local path is exactly the given (normalized) path.
    pub async fn image_get_by_local_path(&self, local_path: &str) -> Result<Option<Image>> {
        let row = sqlx::query("SELECT * FROM images WHERE local_path = ? LIMIT 1")
            .bind(local_path)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_image(&r)).transpose()
    }

    /// List images, newest first.
    pub async fn image_list(&self, filter: ImageFilter) -> Result<Vec<Image>> {
        let mut sql = String::from("SELECT * FROM images WHERE 1=1");
        if filter.source_kind.is_some() {
            sql.push_str(" AND source_kind = ?");
        }
        if filter.asset_type.is_some() {
            sql.push_str(" AND asset_type = ?");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");
        sql.push_str(&format!(" LIMIT {}", filter.limit.unwrap_or(100)));
        if let Some(offset) = filter.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        let mut query = sqlx::query(&sql);
        if let Some(kind) = filter.source_kind {
            query = query.bind(kind.as_str());
        }
        if let Some(asset_type) = filter.asset_type {
            query = query.bind(asset_type.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_image).collect()
    }

    /// Update an image's asset type.
    pub async fn image_set_asset_type(&self, id: i64, asset_type: AssetType) -> Result<()> {
        let result = sqlx::query("UPDATE images SET asset_type = ? WHERE id = ?")
            .bind(asset_type.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("image {id}")));
        }
        Ok(())
    }

    /// Toggle an image's participated flag.
    pub async fn image_set_participated(&self, id: i64, participated: bool) -> Result<()> {
        let result = sqlx::query("UPDATE images SET participated = ? WHERE id = ?")
            .bind(participated)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("image {id}")));
        }
        Ok(())
    }

    /// Delete an image record, returning it so the caller can decide what to
    /// do with the backing file. Physical deletion is not this layer's job.
    pub async fn image_delete(&self, id: i64) -> Result<Image> {
        let image = self
            .image_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("image {id}")))?;

        sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(image)
    }

    /// Remove every local_dir record without touching the filesystem.
    pub async fn image_clear_local(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM images WHERE source_kind = 'local_dir'")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Default Location Operations
    // ========================================================================

    /// Upsert the default directory for an asset type.
    ///
    /// Existence of the directory on disk is not validated here; consumers
    /// check lazily at resolution time.
    pub async fn location_set(
        &self,
        asset_type: AssetType,
        directory: &str,
    ) -> Result<DefaultLocation> {
        if directory.trim().is_empty() {
            return Err(DbError::validation("directory must not be empty"));
        }

        let now = Self::now_millis();
        sqlx::query(
            r#"
            INSERT INTO image_default_locations (asset_type, directory, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(asset_type) DO UPDATE SET
                directory = excluded.directory,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(asset_type.as_str())
        .bind(directory)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.location_get(asset_type)
            .await?
            .ok_or_else(|| DbError::not_found(format!("default location for {asset_type}")))
    }

    /// Get the default location for an asset type.
    pub async fn location_get(&self, asset_type: AssetType) -> Result<Option<DefaultLocation>> {
        let row = sqlx::query("SELECT * FROM image_default_locations WHERE asset_type = ?")
            .bind(asset_type.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_location(&r)).transpose()
    }

    /// List all default locations.
    pub async fn location_list(&self) -> Result<Vec<DefaultLocation>> {
        let rows = sqlx::query("SELECT * FROM image_default_locations ORDER BY asset_type")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_location).collect()
    }

    /// Delete a default location by ID.
    pub async fn location_delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM image_default_locations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("default location {id}")));
        }
        Ok(())
    }

    /// Snapshot of asset type → directory, for the path resolver.
    pub async fn location_map(&self) -> Result<HashMap<AssetType, String>> {
        let locations = self.location_list().await?;
        Ok(locations
            .into_iter()
            .map(|loc| (loc.asset_type, loc.directory))
            .collect())
    }

    // ========================================================================
    // Scan & Reclassify Batches
    // ========================================================================

    /// Apply a directory-scan batch in a single transaction.
    ///
    /// `managed_prefixes` are the normalized root prefixes an upload record's
    /// storage path may sit under for its asset type to be corrected.
    pub async fn catalog_apply_scan(
        &self,
        entries: &[ScanEntry],
        requested: Option<AssetType>,
        managed_prefixes: &[String],
    ) -> Result<ScanReport> {
        let mut report = ScanReport {
            total_files: entries.len() as u64,
            ..Default::default()
        };

        let mut tx = self.pool.begin().await?;

        for entry in entries {
            // Already catalogued as a local_dir record for this exact path?
            let existing = sqlx::query("SELECT id, asset_type FROM images WHERE local_path = ?")
                .bind(&entry.path)
                .fetch_optional(&mut *tx)
                .await?;

            if let Some(row) = existing {
                let current = AssetType::from_str(&row.get::<String, _>("asset_type"));
                match requested {
                    Some(req) if req != current => {
                        sqlx::query("UPDATE images SET asset_type = ? WHERE id = ?")
                            .bind(req.as_str())
                            .bind(row.get::<i64, _>("id"))
                            .execute(&mut *tx)
                            .await?;
                        report.updated += 1;
                    }
                    _ => report.skipped += 1,
                }
                continue;
            }

            // A same-named upload whose storage path sits under a managed
            // root gets its asset type corrected. This does not suppress the
            // new local_dir record below; duplicate source kinds per
            // filename are allowed by design.
            if let Some(req) = requested {
                let uploads = sqlx::query(
                    "SELECT id, asset_type, storage_path FROM images \
                     WHERE filename = ? AND source_kind = 'upload' ORDER BY id",
                )
                .bind(&entry.filename)
                .fetch_all(&mut *tx)
                .await?;

                let candidate = uploads.iter().find(|row| {
                    storage_under(&row.get::<String, _>("storage_path"), managed_prefixes)
                });
                if let Some(row) = candidate {
                    let current = AssetType::from_str(&row.get::<String, _>("asset_type"));
                    if current != req {
                        sqlx::query("UPDATE images SET asset_type = ? WHERE id = ?")
                            .bind(req.as_str())
                            .bind(row.get::<i64, _>("id"))
                            .execute(&mut *tx)
                            .await?;
                        report.updated += 1;
                    }
                }
            }

            sqlx::query(
                r#"
                INSERT INTO images (filename, source_kind, asset_type, storage_path,
                                    local_path, participated, created_at)
                VALUES (?, 'local_dir', ?, ?, ?, 0, ?)
                "#,
            )
            .bind(&entry.filename)
            .bind(requested.unwrap_or_default().as_str())
            .bind(&entry.path)
            .bind(&entry.path)
            .bind(entry.mtime_millis)
            .execute(&mut *tx)
            .await?;
            report.added += 1;
        }

        tx.commit().await?;
        Ok(report)
    }

    /// Apply a reclassify pass in a single transaction.
    ///
    /// `dir_prefix` is the normalized scan directory; `filenames` is every
    /// filename present anywhere under it.
    pub async fn catalog_apply_reclassify(
        &self,
        dir_prefix: &str,
        filenames: &[String],
        target: AssetType,
    ) -> Result<ReclassifyReport> {
        let prefix = {
            let p = dir_prefix.replace('\\', "/");
            format!("{}/", p.trim_end_matches('/'))
        };

        let mut report = ReclassifyReport::default();
        let mut tx = self.pool.begin().await?;

        // Local records under the directory follow the requested type.
        let locals = sqlx::query(
            "SELECT id, asset_type, local_path FROM images \
             WHERE source_kind = 'local_dir' AND local_path IS NOT NULL",
        )
        .fetch_all(&mut *tx)
        .await?;

        for row in &locals {
            let local_path: String = row.get("local_path");
            if !local_path.replace('\\', "/").starts_with(&prefix) {
                continue;
            }
            let current = AssetType::from_str(&row.get::<String, _>("asset_type"));
            if current != target {
                sqlx::query("UPDATE images SET asset_type = ? WHERE id = ?")
                    .bind(target.as_str())
                    .bind(row.get::<i64, _>("id"))
                    .execute(&mut *tx)
                    .await?;
                report.updated_local += 1;
            }
        }

        // Upload-sourced duplicates sharing a filename under the directory
        // collapse to exactly one survivor per filename.
        let mut groups: BTreeMap<String, Vec<(i64, AssetType)>> = BTreeMap::new();
        for chunk in filenames.chunks(500) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT id, filename, asset_type FROM images \
                 WHERE source_kind = 'upload' AND filename IN ({placeholders})"
            );
            let mut query = sqlx::query(&sql);
            for name in chunk {
                query = query.bind(name);
            }
            for row in query.fetch_all(&mut *tx).await? {
                groups.entry(row.get("filename")).or_default().push((
                    row.get::<i64, _>("id"),
                    AssetType::from_str(&row.get::<String, _>("asset_type")),
                ));
            }
        }

        for (_, mut group) in groups {
            // Deterministic survivor selection: prefer a duplicate already
            // matching the target type, then highest id. Explicit sort, not
            // iteration order.
            group.sort_by_key(|&(id, asset_type)| {
                (std::cmp::Reverse(asset_type == target), std::cmp::Reverse(id))
            });
            let (survivor_id, survivor_type) = group[0];

            for &(loser_id, _) in &group[1..] {
                sqlx::query("DELETE FROM images WHERE id = ?")
                    .bind(loser_id)
                    .execute(&mut *tx)
                    .await?;
            }

            if survivor_type != target {
                sqlx::query("UPDATE images SET asset_type = ? WHERE id = ?")
                    .bind(target.as_str())
                    .bind(survivor_id)
                    .execute(&mut *tx)
                    .await?;
                report.updated_upload += 1;
            }
        }

        tx.commit().await?;
        Ok(report)
    }
}

fn row_to_image(row: &sqlx::sqlite::SqliteRow) -> Result<Image> {
    let attributes = row
        .get::<Option<String>, _>("attributes")
        .map(|s| serde_json::from_str(&s))
        .transpose()?;

    Ok(Image {
        id: row.get("id"),
        filename: row.get("filename"),
        source_kind: SourceKind::from_str(&row.get::<String, _>("source_kind")),
        asset_type: AssetType::from_str(&row.get::<String, _>("asset_type")),
        storage_path: row.get("storage_path"),
        local_path: row.get("local_path"),
        participated: row.get("participated"),
        attributes,
        created_at: PromoDb::millis_to_datetime(row.get("created_at")),
    })
}

fn row_to_location(row: &sqlx::sqlite::SqliteRow) -> Result<DefaultLocation> {
    Ok(DefaultLocation {
        id: row.get("id"),
        asset_type: AssetType::from_str(&row.get::<String, _>("asset_type")),
        directory: row.get("directory"),
        created_at: PromoDb::millis_to_datetime(row.get("created_at")),
        updated_at: PromoDb::millis_to_datetime(row.get("updated_at")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_image(path: &str) -> NewImage {
        NewImage {
            filename: path.rsplit('/').next().unwrap().to_string(),
            source_kind: SourceKind::LocalDir,
            asset_type: AssetType::General,
            storage_path: path.to_string(),
            local_path: Some(path.to_string()),
            attributes: None,
            created_at: None,
        }
    }

    #[test]
    fn test_storage_under() {
        let prefixes = vec!["uploads/".to_string(), "/data/uploads".to_string()];
        assert!(storage_under("uploads/a.png", &prefixes));
        assert!(storage_under("/data/uploads/b.png", &prefixes));
        assert!(storage_under("\\data\\uploads\\b.png", &prefixes));
        assert!(!storage_under("/data/output/c.png", &prefixes));
        assert!(!storage_under("uploads_old/a.png", &prefixes));
    }

    #[tokio::test]
    async fn test_image_invariant_enforced() {
        let db = PromoDb::open_in_memory().await.unwrap();

        let mut bad = local_image("/tmp/a.png");
        bad.local_path = None;
        assert!(matches!(
            db.image_create(&bad).await,
            Err(DbError::Validation(_))
        ));

        let mut bad = local_image("/tmp/a.png");
        bad.source_kind = SourceKind::Upload;
        assert!(matches!(
            db.image_create(&bad).await,
            Err(DbError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_location_upsert_is_single_row() {
        let db = PromoDb::open_in_memory().await.unwrap();

        db.location_set(AssetType::AdvertisingRule, "/data/rules")
            .await
            .unwrap();
        let loc = db
            .location_set(AssetType::AdvertisingRule, "/data/rules2")
            .await
            .unwrap();

        assert_eq!(loc.directory, "/data/rules2");
        assert_eq!(db.location_list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_location_rejects_empty_directory() {
        let db = PromoDb::open_in_memory().await.unwrap();
        assert!(matches!(
            db.location_set(AssetType::General, "  ").await,
            Err(DbError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_local_leaves_uploads() {
        let db = PromoDb::open_in_memory().await.unwrap();

        db.image_create(&local_image("/tmp/x.png")).await.unwrap();
        db.image_create(&NewImage {
            filename: "y.png".into(),
            source_kind: SourceKind::Upload,
            asset_type: AssetType::General,
            storage_path: "uploads/y.png".into(),
            local_path: None,
            attributes: None,
            created_at: None,
        })
        .await
        .unwrap();

        assert_eq!(db.image_clear_local().await.unwrap(), 1);
        let remaining = db.image_list(Default::default()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].source_kind, SourceKind::Upload);
    }
}
