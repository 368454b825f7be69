//! Asset Catalog - image records, storage resolution & reconciliation

pub mod mime;
pub mod resolver;
pub mod scanner;

pub use mime::mime_for_path;
pub use resolver::{normalize_path, PathResolver};
pub use scanner::Scanner;

use crate::config::StorageConfig;
use crate::error::{CoreError, Result};
use promoflow_db::{AssetType, Image, NewImage, PromoDb, SourceKind};
use std::path::Path;
use tracing::{info, warn};

/// Outcome of deleting an image record.
///
/// The database delete always committed by the time this is returned; file
/// removal is best-effort and reported, never fatal.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub image: Image,
    pub file_removed: bool,
    pub file_error: Option<String>,
}

/// Register a file handed over by the upload intake.
///
/// `source_kind` and `asset_type` arrive as free text from the HTTP layer;
/// unrecognized asset types fall back to `general` after case-normalization.
pub async fn register_upload(
    db: &PromoDb,
    config: &StorageConfig,
    saved_path: &Path,
    source_kind: &str,
    asset_type: &str,
) -> Result<Image> {
    if !config.is_allowed(saved_path) {
        return Err(CoreError::Validation(format!(
            "file type not allowed: {}",
            saved_path.display()
        )));
    }
    // The HTTP layer claims it saved this file; an unreadable path here is a
    // storage problem, not a missing catalog entry.
    if let Err(e) = std::fs::metadata(saved_path) {
        return Err(CoreError::Filesystem(format!(
            "{}: {e}",
            saved_path.display()
        )));
    }
    let filename = saved_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CoreError::Validation("saved path has no filename".into()))?
        .to_string();

    let kind = SourceKind::from_str(source_kind);
    let normalized = normalize_path(&saved_path.to_string_lossy());
    let (storage_path, local_path) = match kind {
        // Uploads are addressed root-relative so the record survives a root
        // move
        SourceKind::Upload => (format!("uploads/{filename}"), None),
        SourceKind::LocalDir => (normalized.clone(), Some(normalized)),
        SourceKind::Generated => (format!("output/{filename}"), None),
    };

    let image = db
        .image_create(&NewImage {
            filename,
            source_kind: kind,
            asset_type: AssetType::from_str(asset_type),
            storage_path,
            local_path,
            attributes: None,
            created_at: None,
        })
        .await?;

    info!(id = image.id, filename = %image.filename, kind = %image.source_kind, "Image registered");
    Ok(image)
}

/// Register an image produced by the generation workflow collaborator.
pub async fn register_generated(
    db: &PromoDb,
    filename: &str,
    output_rel_path: &str,
    attributes: Option<serde_json::Value>,
) -> Result<Image> {
    let image = db
        .image_create(&NewImage {
            filename: filename.to_string(),
            source_kind: SourceKind::Generated,
            asset_type: AssetType::General,
            storage_path: normalize_path(output_rel_path),
            local_path: None,
            attributes,
            created_at: None,
        })
        .await?;

    info!(id = image.id, filename = %image.filename, "Generated image registered");
    Ok(image)
}

/// Delete an image record and, for uploads only, its backing file.
///
/// The file removal happens after the database delete committed; a failure
/// there is reported in the outcome and logged, not raised.
pub async fn delete_image(db: &PromoDb, config: &StorageConfig, id: i64) -> Result<DeleteOutcome> {
    let locations = db.location_map().await?;
    let image = db.image_delete(id).await?;

    if image.source_kind != SourceKind::Upload {
        return Ok(DeleteOutcome {
            image,
            file_removed: false,
            file_error: None,
        });
    }

    let resolver = PathResolver::new(config);
    let (file_removed, file_error) = match resolver.resolve(&image, &locations) {
        Ok(path) => match std::fs::remove_file(&path) {
            Ok(()) => (true, None),
            Err(e) => {
                warn!(id = image.id, path = %path.display(), error = %e, "Failed to remove uploaded file");
                (false, Some(e.to_string()))
            }
        },
        // Nothing on disk to remove
        Err(CoreError::AssetNotFound(_)) => (false, None),
        Err(e) => return Err(e),
    };

    Ok(DeleteOutcome {
        image,
        file_removed,
        file_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use promoflow_db::ImageFilter;
    use tempfile::TempDir;

    async fn env() -> (TempDir, PromoDb, StorageConfig) {
        let tmp = TempDir::new().unwrap();
        let db = PromoDb::open_in_memory().await.unwrap();
        let config = StorageConfig {
            upload_dir: tmp.path().join("uploads"),
            output_dir: tmp.path().join("output"),
            ..Default::default()
        };
        config.ensure_dirs().unwrap();
        (tmp, db, config)
    }

    #[tokio::test]
    async fn test_register_upload_falls_back_to_general() {
        let (tmp, db, config) = env().await;
        let saved = tmp.path().join("uploads/pic.png");
        std::fs::write(&saved, b"x").unwrap();

        let image = register_upload(&db, &config, &saved, "upload", "Banner-Ads")
            .await
            .unwrap();

        assert_eq!(image.asset_type, AssetType::General);
        assert_eq!(image.storage_path, "uploads/pic.png");
        assert!(image.local_path.is_none());
    }

    #[tokio::test]
    async fn test_register_upload_rejects_disallowed_extension() {
        let (tmp, db, config) = env().await;
        let saved = tmp.path().join("uploads/evil.exe");
        std::fs::write(&saved, b"x").unwrap();

        let err = register_upload(&db, &config, &saved, "upload", "general").await;
        assert!(matches!(err, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_upload_removes_backing_file() {
        let (tmp, db, config) = env().await;
        let saved = tmp.path().join("uploads/gone.png");
        std::fs::write(&saved, b"x").unwrap();

        let image = register_upload(&db, &config, &saved, "upload", "general")
            .await
            .unwrap();
        let outcome = delete_image(&db, &config, image.id).await.unwrap();

        assert!(outcome.file_removed);
        assert!(!saved.exists());
        assert!(db.image_get(image.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_local_dir_keeps_file() {
        let (tmp, db, config) = env().await;
        let file = tmp.path().join("library/keep.png");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"x").unwrap();

        let scanner = Scanner::new(db.clone(), config.clone());
        scanner.scan(&tmp.path().join("library"), None).await.unwrap();
        let image = db.image_list(ImageFilter::default()).await.unwrap()[0].clone();

        let outcome = delete_image(&db, &config, image.id).await.unwrap();
        assert!(!outcome.file_removed);
        assert!(file.exists());
    }

    #[tokio::test]
    async fn test_delete_upload_with_missing_file_still_deletes_record() {
        let (_tmp, db, config) = env().await;
        let image = db
            .image_create(&NewImage {
                filename: "ghost.png".into(),
                source_kind: SourceKind::Upload,
                asset_type: AssetType::General,
                storage_path: "uploads/ghost.png".into(),
                local_path: None,
                attributes: None,
                created_at: None,
            })
            .await
            .unwrap();

        let outcome = delete_image(&db, &config, image.id).await.unwrap();
        assert!(!outcome.file_removed);
        assert!(outcome.file_error.is_none());
        assert!(db.image_get(image.id).await.unwrap().is_none());
    }
}
