//! Database schema creation for all Promoflow tables.
//!
//! All CREATE TABLE statements live here - single source of truth.
//! Timestamps are stored as INTEGER milliseconds since the Unix epoch.

use crate::error::Result;
use crate::PromoDb;
use tracing::info;

impl PromoDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        // Enable WAL mode for better concurrent access
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&self.pool)
            .await?;

        self.create_catalog_tables().await?;
        self.create_campaign_tables().await?;

        info!("Database schema verified");
        Ok(())
    }

    /// Create asset catalog tables
    async fn create_catalog_tables(&self) -> Result<()> {
        // Images: catalogued media assets
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                source_kind TEXT NOT NULL DEFAULT 'upload'
                    CHECK (source_kind IN ('upload', 'local_dir', 'generated')),
                asset_type TEXT NOT NULL DEFAULT 'general'
                    CHECK (asset_type IN ('general', 'advertising_campaign',
                                          'advertising_rule', 'rule_card_screenshot')),
                storage_path TEXT NOT NULL,
                local_path TEXT,
                participated INTEGER NOT NULL DEFAULT 0,
                attributes TEXT,
                created_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Default locations: one directory per asset type at most
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS image_default_locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                asset_type TEXT NOT NULL UNIQUE,
                directory TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Catalog indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_images_local_path ON images(local_path)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_images_filename_source ON images(filename, source_kind)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_images_asset_type ON images(asset_type)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Create campaign task tables
    async fn create_campaign_tables(&self) -> Result<()> {
        // Campaign tasks: advertising-task records ingested via feed sync
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS campaign_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_task_id TEXT NOT NULL UNIQUE,
                task_title TEXT NOT NULL,
                card_title TEXT,
                submission_rules TEXT,
                tag_requirements TEXT,
                settlement_text TEXT,
                hashtags TEXT,
                image_path TEXT,
                image_url TEXT,
                amount REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'completed', 'expired', 'draft')),
                task_type TEXT NOT NULL DEFAULT 'submission'
                    CHECK (task_type IN ('submission', 'community',
                                         'community_special', 'buyer')),
                participated INTEGER NOT NULL DEFAULT 0,
                participation_count INTEGER NOT NULL DEFAULT 0,
                last_participated_at INTEGER,
                extra_data TEXT,
                deadline INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Rule cards: per-task sub-requirements, removed with their task
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS task_rule_cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL
                    REFERENCES campaign_tasks(id) ON DELETE CASCADE,
                name TEXT,
                description TEXT,
                image_path TEXT,
                image_url TEXT,
                display_order INTEGER NOT NULL DEFAULT 0,
                participated INTEGER NOT NULL DEFAULT 0,
                participation_count INTEGER NOT NULL DEFAULT 0,
                last_participated_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Campaign indexes
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_external_id ON campaign_tasks(external_task_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_status ON campaign_tasks(status)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rule_cards_task ON task_rule_cards(task_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
