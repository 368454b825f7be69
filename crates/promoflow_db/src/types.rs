//! Unified types for all Promoflow database entities.
//!
//! These types are the single source of truth. All interfaces (CLI,
//! collaborator facades) should use these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Enumerations
// ============================================================================
//
// All string-backed columns use closed enums with a strict `parse` and a
// total, lenient `from_str` that lower-cases input and maps anything
// unrecognized to one documented default. Free-form strings never leak into
// the database as a de-facto extra state.

/// Where an image record came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Pushed through the upload intake; the backing file lives under the
    /// upload root and is removed when the record is deleted.
    #[default]
    Upload,
    /// Discovered by a directory scan; the file is operator-owned and never
    /// deleted by the catalog.
    LocalDir,
    /// Produced by the generation workflow collaborator.
    Generated,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::LocalDir => "local_dir",
            Self::Generated => "generated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "upload" => Some(Self::Upload),
            "local_dir" => Some(Self::LocalDir),
            "generated" => Some(Self::Generated),
            _ => None,
        }
    }

    /// Parse from string, converting unknown values to the default.
    pub fn from_str(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of a catalogued asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    #[default]
    General,
    AdvertisingCampaign,
    AdvertisingRule,
    RuleCardScreenshot,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::AdvertisingCampaign => "advertising_campaign",
            Self::AdvertisingRule => "advertising_rule",
            Self::RuleCardScreenshot => "rule_card_screenshot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "general" => Some(Self::General),
            "advertising_campaign" => Some(Self::AdvertisingCampaign),
            "advertising_rule" => Some(Self::AdvertisingRule),
            "rule_card_screenshot" => Some(Self::RuleCardScreenshot),
            _ => None,
        }
    }

    /// Parse from string; unrecognized values fall back to `general`.
    pub fn from_str(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a campaign task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Active,
    Completed,
    Expired,
    Draft,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Draft => "draft",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            "draft" => Some(Self::Draft),
            _ => None,
        }
    }

    /// Parse from string, converting unknown values to `active`.
    pub fn from_str(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of a campaign task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Ordinary submission task (the feed calls these "normal").
    #[default]
    Submission,
    Community,
    CommunitySpecial,
    Buyer,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Community => "community",
            Self::CommunitySpecial => "community_special",
            Self::Buyer => "buyer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "submission" | "normal" => Some(Self::Submission),
            "community" => Some(Self::Community),
            "community_special" => Some(Self::CommunitySpecial),
            "buyer" => Some(Self::Buyer),
            _ => None,
        }
    }

    /// Parse from string, converting unknown values to `submission`.
    pub fn from_str(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    /// Interpret a source-provided category hint. Hints only supply a
    /// default classification; a title-keyword match always wins.
    pub fn from_hint(hint: &str) -> Option<Self> {
        Self::parse(hint)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Catalog Types
// ============================================================================

/// A catalogued media asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: i64,
    pub filename: String,
    pub source_kind: SourceKind,
    pub asset_type: AssetType,
    /// Logical path, root-relative or absolute.
    pub storage_path: String,
    /// Absolute path on disk; populated iff `source_kind` is `local_dir`.
    pub local_path: Option<String>,
    pub participated: bool,
    /// Opaque attribute map (generation variables etc.), stored verbatim.
    pub attributes: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an image record.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub filename: String,
    pub source_kind: SourceKind,
    pub asset_type: AssetType,
    pub storage_path: String,
    pub local_path: Option<String>,
    pub attributes: Option<serde_json::Value>,
    /// Defaults to now; directory scans pass the file mtime instead.
    pub created_at: Option<DateTime<Utc>>,
}

/// Filter for listing images.
#[derive(Debug, Clone, Default)]
pub struct ImageFilter {
    pub source_kind: Option<SourceKind>,
    pub asset_type: Option<AssetType>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Configured default directory for one asset type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultLocation {
    pub id: i64,
    pub asset_type: AssetType,
    pub directory: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One file handed to the catalog by the directory scanner.
///
/// Paths are normalized to forward slashes before they get here.
#[derive(Debug, Clone)]
pub struct ScanEntry {
    /// Absolute, normalized path of the file.
    pub path: String,
    /// Basename of `path`.
    pub filename: String,
    /// File modification time, milliseconds since the Unix epoch.
    pub mtime_millis: i64,
}

/// Result of a scan batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub added: u64,
    pub updated: u64,
    pub skipped: u64,
    pub total_files: u64,
}

/// Result of a reclassify pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReclassifyReport {
    pub updated_local: u64,
    pub updated_upload: u64,
}

// ============================================================================
// Campaign Task Types
// ============================================================================

/// An externally sourced advertising-task record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignTask {
    pub id: i64,
    /// The platform's task number; globally unique, sole dedup key for sync.
    pub external_task_id: String,
    pub task_title: String,
    pub card_title: Option<String>,
    pub submission_rules: Option<String>,
    pub tag_requirements: Option<String>,
    pub settlement_text: Option<String>,
    /// Ordered list, used verbatim in downstream prompts.
    pub hashtags: Vec<String>,
    /// Root-relative path under the advertising_campaign default location.
    pub image_path: Option<String>,
    /// External URL fallback.
    pub image_url: Option<String>,
    pub amount: f64,
    pub status: TaskStatus,
    pub task_type: TaskType,
    pub participated: bool,
    pub participation_count: i64,
    pub last_participated_at: Option<DateTime<Utc>>,
    /// Verbatim copy of the source feed record.
    pub extra_data: Option<serde_json::Value>,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a campaign task directly (not via feed sync).
#[derive(Debug, Clone, Default)]
pub struct NewCampaignTask {
    pub external_task_id: String,
    pub task_title: String,
    pub card_title: Option<String>,
    pub submission_rules: Option<String>,
    pub tag_requirements: Option<String>,
    pub settlement_text: Option<String>,
    pub hashtags: Vec<String>,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
    pub amount: f64,
    pub status: TaskStatus,
    pub task_type: TaskType,
    pub extra_data: Option<serde_json::Value>,
    pub deadline: Option<DateTime<Utc>>,
}

/// Field-wise patch for updating a task. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub task_title: Option<String>,
    pub card_title: Option<String>,
    pub submission_rules: Option<String>,
    pub tag_requirements: Option<String>,
    pub settlement_text: Option<String>,
    pub hashtags: Option<Vec<String>>,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub extra_data: Option<serde_json::Value>,
    pub deadline: Option<DateTime<Utc>>,
}

/// One validated feed record, ready for the sync transaction.
#[derive(Debug, Clone)]
pub struct FeedUpsert {
    pub external_task_id: String,
    pub task_title: String,
    pub card_title: Option<String>,
    pub submission_rules: Option<String>,
    pub tag_requirements: Option<String>,
    pub settlement_text: Option<String>,
    pub hashtags: Vec<String>,
    pub image_path: Option<String>,
    /// Thumbnail-derived URL; the only image field sync refreshes.
    pub image_url: Option<String>,
    pub amount: Option<f64>,
    pub task_type: TaskType,
    pub deadline: Option<DateTime<Utc>>,
    /// The raw feed record, stored verbatim as extra_data.
    pub extra_data: serde_json::Value,
}

/// Counters from applying a feed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedApplyStats {
    pub created: u64,
    pub updated: u64,
}

/// Full sync result, including records skipped before the transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub total: u64,
}

/// Filter for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Aggregate counts over the task store.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TaskStats {
    pub total: u64,
    /// Active and not yet participated.
    pub active: u64,
    /// Completed status or participated.
    pub completed: u64,
    pub expired: u64,
}

/// Participation counts over the task store.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ParticipationStats {
    pub total: u64,
    pub participated: u64,
    pub not_participated: u64,
}

// ============================================================================
// Rule Card Types
// ============================================================================

/// An independently trackable sub-requirement of a campaign task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCard {
    pub id: i64,
    pub task_id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
    pub display_order: i64,
    pub participated: bool,
    pub participation_count: i64,
    pub last_participated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a rule card.
#[derive(Debug, Clone, Default)]
pub struct NewRuleCard {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
    /// Defaults to max existing order for the task + 1.
    pub display_order: Option<i64>,
}

/// Field-wise patch for updating a rule card.
#[derive(Debug, Clone, Default)]
pub struct RuleCardPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
    pub display_order: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_roundtrip() {
        for kind in [SourceKind::Upload, SourceKind::LocalDir, SourceKind::Generated] {
            assert_eq!(SourceKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_asset_type_lenient_parse() {
        assert_eq!(AssetType::from_str("Advertising_Campaign"), AssetType::AdvertisingCampaign);
        assert_eq!(AssetType::from_str("banner"), AssetType::General);
        assert_eq!(AssetType::from_str(""), AssetType::General);
    }

    #[test]
    fn test_task_status_lenient_parse() {
        assert_eq!(TaskStatus::from_str("EXPIRED"), TaskStatus::Expired);
        assert_eq!(TaskStatus::from_str("???"), TaskStatus::Active);
    }

    #[test]
    fn test_task_type_hint() {
        assert_eq!(TaskType::from_hint("buyer"), Some(TaskType::Buyer));
        assert_eq!(TaskType::from_hint("NORMAL"), Some(TaskType::Submission));
        assert_eq!(TaskType::from_hint("OTHER"), None);
    }
}
