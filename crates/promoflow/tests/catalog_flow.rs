//! End-to-end catalog flow: scan, reconcile, resolve, delete.

use promoflow::catalog::{self, mime_for_path, PathResolver, Scanner};
use promoflow::StorageConfig;
use promoflow_db::{AssetType, ImageFilter, PromoDb, SourceKind};
use std::path::Path;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, content: &[u8]) {
    let path = dir.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

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
async fn scan_then_resolve_through_default_location() {
    let (tmp, db, config) = env().await;
    let library = tmp.path().join("library");
    write_file(&library, "spring.png", b"x");

    let scanner = Scanner::new(db.clone(), config.clone());
    let report = scanner
        .scan(&library, Some(AssetType::AdvertisingCampaign))
        .await
        .unwrap();
    assert_eq!(report.added, 1);

    // Point the campaign default location somewhere else entirely; the
    // record's explicit local path still wins.
    let elsewhere = tmp.path().join("elsewhere");
    std::fs::create_dir_all(&elsewhere).unwrap();
    write_file(&elsewhere, "spring.png", b"decoy");
    db.location_set(
        AssetType::AdvertisingCampaign,
        &elsewhere.to_string_lossy(),
    )
    .await
    .unwrap();

    let image = db.image_list(ImageFilter::default()).await.unwrap()[0].clone();
    let locations = db.location_map().await.unwrap();
    let resolved = PathResolver::new(&config)
        .resolve(&image, &locations)
        .unwrap();

    assert_eq!(resolved, library.join("spring.png"));
    assert_eq!(mime_for_path(&resolved), "image/png");
}

#[tokio::test]
async fn scan_twice_reports_zero_added() {
    let (tmp, db, config) = env().await;
    let library = tmp.path().join("library");
    write_file(&library, "a.png", b"x");
    write_file(&library, "b/c.jpg", b"x");

    let scanner = Scanner::new(db, config);
    scanner.scan(&library, None).await.unwrap();
    let second = scanner.scan(&library, None).await.unwrap();

    assert_eq!(second.added, 0);
    assert_eq!(second.total_files, 2);
}

#[tokio::test]
async fn reclassify_twice_is_stable_and_dedupes() {
    let (tmp, db, config) = env().await;
    let library = tmp.path().join("library");
    write_file(&library, "rule.png", b"x");

    // Two competing upload records for the same filename
    for _ in 0..2 {
        catalog::register_upload(
            &db,
            &config,
            &{
                let p = config.upload_dir.join("rule.png");
                std::fs::write(&p, b"x").unwrap();
                p
            },
            "upload",
            "general",
        )
        .await
        .unwrap();
    }

    let scanner = Scanner::new(db.clone(), config);
    let first = scanner
        .reclassify(&library, AssetType::AdvertisingRule)
        .await
        .unwrap();
    assert_eq!(first.updated_upload, 1);

    let second = scanner
        .reclassify(&library, AssetType::AdvertisingRule)
        .await
        .unwrap();
    assert_eq!(second.updated_local, 0);
    assert_eq!(second.updated_upload, 0);

    let uploads = db
        .image_list(ImageFilter {
            source_kind: Some(SourceKind::Upload),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].asset_type, AssetType::AdvertisingRule);
}

#[tokio::test]
async fn delete_semantics_differ_by_source_kind() {
    let (tmp, db, config) = env().await;

    // Uploaded image: backing file goes with the record
    let uploaded = config.upload_dir.join("up.png");
    std::fs::write(&uploaded, b"x").unwrap();
    let upload = catalog::register_upload(&db, &config, &uploaded, "upload", "general")
        .await
        .unwrap();

    // Scanned image: file is operator-owned
    let library = tmp.path().join("library");
    write_file(&library, "keep.png", b"x");
    let scanner = Scanner::new(db.clone(), config.clone());
    scanner.scan(&library, None).await.unwrap();
    let local = db
        .image_list(ImageFilter {
            source_kind: Some(SourceKind::LocalDir),
            ..Default::default()
        })
        .await
        .unwrap()[0]
        .clone();

    let outcome = catalog::delete_image(&db, &config, upload.id).await.unwrap();
    assert!(outcome.file_removed);
    assert!(!uploaded.exists());

    let outcome = catalog::delete_image(&db, &config, local.id).await.unwrap();
    assert!(!outcome.file_removed);
    assert!(library.join("keep.png").exists());
}
