//! Asset path resolution
//!
//! Deterministic lookup of the absolute file path behind a catalog record.
//! Resolution is a pure function of (record, registry snapshot, filesystem
//! existence checks) - no caching between calls. Separators are normalized
//! to forward slashes before any comparison.

use crate::config::StorageConfig;
use crate::error::{CoreError, Result};
use promoflow_db::{AssetType, CampaignTask, Image, RuleCard};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Normalize a path string to forward slashes. Callers on Windows hand the
/// catalog backslash paths; comparisons only work on one canonical form.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Marker segments a logical storage path may carry in front of the actual
/// root-relative path (`uploads/x.png` is served out of the upload root).
const ROOT_MARKERS: &[&str] = &["uploads/", "upload/", "output/"];

fn strip_root_marker(path: &str) -> &str {
    for marker in ROOT_MARKERS {
        if let Some(rest) = path.strip_prefix(marker) {
            return rest;
        }
    }
    path
}

/// Resolves catalog records to absolute on-disk paths.
pub struct PathResolver {
    upload_root: PathBuf,
    output_root: PathBuf,
}

impl PathResolver {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            upload_root: config.upload_dir.clone(),
            output_root: config.output_dir.clone(),
        }
    }

    /// Resolve an image to an absolute existing path.
    ///
    /// Precedence, stopping at the first hit:
    /// 1. the storage path itself, when absolute and existing
    /// 2. the record's local path, when present and existing
    /// 3. the asset type's default location joined with the storage path
    /// 4. the upload root, then the output root, joined with the storage
    ///    path after stripping a recognized root marker
    pub fn resolve(
        &self,
        image: &Image,
        locations: &HashMap<AssetType, String>,
    ) -> Result<PathBuf> {
        let storage = normalize_path(&image.storage_path);

        let as_is = Path::new(&storage);
        if as_is.is_absolute() && as_is.exists() {
            return Ok(as_is.to_path_buf());
        }

        if let Some(local) = &image.local_path {
            let local = normalize_path(local);
            let candidate = Path::new(&local);
            if candidate.exists() {
                return Ok(candidate.to_path_buf());
            }
        }

        if let Some(dir) = locations.get(&image.asset_type) {
            let candidate = Path::new(&normalize_path(dir)).join(&storage);
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        let stripped = strip_root_marker(&storage);
        for root in [&self.upload_root, &self.output_root] {
            let candidate = root.join(stripped);
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        Err(CoreError::AssetNotFound(format!(
            "image {} ({})",
            image.id, image.storage_path
        )))
    }

    /// Resolve a campaign task's thumbnail out of the advertising_campaign
    /// default location.
    pub fn resolve_task_image(
        &self,
        task: &CampaignTask,
        locations: &HashMap<AssetType, String>,
    ) -> Result<PathBuf> {
        let rel = task
            .image_path
            .as_deref()
            .ok_or_else(|| CoreError::AssetNotFound(format!("task {} has no image", task.id)))?;
        Self::resolve_in_location(rel, AssetType::AdvertisingCampaign, locations)
    }

    /// Resolve a rule card's screenshot out of the advertising_rule default
    /// location.
    pub fn resolve_rule_card_image(
        &self,
        card: &RuleCard,
        locations: &HashMap<AssetType, String>,
    ) -> Result<PathBuf> {
        let rel = card.image_path.as_deref().ok_or_else(|| {
            CoreError::AssetNotFound(format!("rule card {} has no image", card.id))
        })?;
        Self::resolve_in_location(rel, AssetType::AdvertisingRule, locations)
    }

    fn resolve_in_location(
        rel: &str,
        asset_type: AssetType,
        locations: &HashMap<AssetType, String>,
    ) -> Result<PathBuf> {
        let dir = locations.get(&asset_type).ok_or_else(|| {
            CoreError::Config(format!("no default location configured for {asset_type}"))
        })?;
        let candidate = Path::new(&normalize_path(dir)).join(normalize_path(rel));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(CoreError::AssetNotFound(rel.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promoflow_db::SourceKind;
    use tempfile::TempDir;

    fn image(storage_path: &str, local_path: Option<&str>, asset_type: AssetType) -> Image {
        Image {
            id: 1,
            filename: "x.png".into(),
            source_kind: if local_path.is_some() {
                SourceKind::LocalDir
            } else {
                SourceKind::Upload
            },
            asset_type,
            storage_path: storage_path.into(),
            local_path: local_path.map(Into::into),
            participated: false,
            attributes: None,
            created_at: chrono::Utc::now(),
        }
    }

    fn resolver(tmp: &TempDir) -> PathResolver {
        let config = StorageConfig {
            upload_dir: tmp.path().join("uploads"),
            output_dir: tmp.path().join("output"),
            ..Default::default()
        };
        PathResolver::new(&config)
    }

    #[test]
    fn test_absolute_existing_path_wins() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("abs.png");
        std::fs::write(&file, b"x").unwrap();

        let img = image(&file.to_string_lossy(), None, AssetType::General);
        let resolved = resolver(&tmp).resolve(&img, &HashMap::new()).unwrap();
        assert_eq!(resolved, file);
    }

    #[test]
    fn test_local_path_beats_default_location() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local/x.png");
        std::fs::create_dir_all(local.parent().unwrap()).unwrap();
        std::fs::write(&local, b"x").unwrap();

        // A default location that also contains x.png
        let loc_dir = tmp.path().join("campaign");
        std::fs::create_dir_all(&loc_dir).unwrap();
        std::fs::write(loc_dir.join("x.png"), b"y").unwrap();
        let locations = HashMap::from([(
            AssetType::AdvertisingCampaign,
            loc_dir.to_string_lossy().into_owned(),
        )]);

        let img = image(
            "x.png",
            Some(&local.to_string_lossy()),
            AssetType::AdvertisingCampaign,
        );
        let resolved = resolver(&tmp).resolve(&img, &locations).unwrap();
        assert_eq!(resolved, local);
    }

    #[test]
    fn test_default_location_then_roots() {
        let tmp = TempDir::new().unwrap();
        let loc_dir = tmp.path().join("rules");
        std::fs::create_dir_all(&loc_dir).unwrap();
        std::fs::write(loc_dir.join("r.png"), b"x").unwrap();
        let locations = HashMap::from([(
            AssetType::AdvertisingRule,
            loc_dir.to_string_lossy().into_owned(),
        )]);

        let img = image("r.png", None, AssetType::AdvertisingRule);
        let resolved = resolver(&tmp).resolve(&img, &locations).unwrap();
        assert_eq!(resolved, loc_dir.join("r.png"));
    }

    #[test]
    fn test_upload_marker_stripped_against_upload_root() {
        let tmp = TempDir::new().unwrap();
        let uploads = tmp.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::write(uploads.join("u.png"), b"x").unwrap();

        let img = image("uploads/u.png", None, AssetType::General);
        let resolved = resolver(&tmp).resolve(&img, &HashMap::new()).unwrap();
        assert_eq!(resolved, uploads.join("u.png"));
    }

    #[test]
    fn test_backslash_storage_path_is_normalized() {
        let tmp = TempDir::new().unwrap();
        let loc_dir = tmp.path().join("campaign");
        std::fs::create_dir_all(loc_dir.join("sub")).unwrap();
        std::fs::write(loc_dir.join("sub/c.png"), b"x").unwrap();
        let locations = HashMap::from([(
            AssetType::AdvertisingCampaign,
            loc_dir.to_string_lossy().into_owned(),
        )]);

        let img = image("sub\\c.png", None, AssetType::AdvertisingCampaign);
        let resolved = resolver(&tmp).resolve(&img, &locations).unwrap();
        assert_eq!(resolved, loc_dir.join("sub/c.png"));
    }

    #[test]
    fn test_miss_is_asset_not_found() {
        let tmp = TempDir::new().unwrap();
        let img = image("ghost.png", None, AssetType::General);
        let err = resolver(&tmp).resolve(&img, &HashMap::new());
        assert!(matches!(err, Err(CoreError::AssetNotFound(_))));
    }
}
