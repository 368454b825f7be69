//! Campaign task database operations (CRUD, stats & feed sync)

use crate::error::{DbError, Result};
use crate::types::*;
use crate::PromoDb;
use sqlx::Row;

impl PromoDb {
    // ========================================================================
    // Task CRUD
    // ========================================================================

    /// Create a campaign task directly (operator entry, not feed sync).
    ///
    /// A duplicate external task id surfaces as a conflict.
    pub async fn task_create(&self, new: &NewCampaignTask) -> Result<CampaignTask> {
        if new.external_task_id.trim().is_empty() {
            return Err(DbError::validation("external_task_id must not be empty"));
        }

        let hashtags = serde_json::to_string(&new.hashtags)?;
        let extra_data = new
            .extra_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = Self::now_millis();

        let result = sqlx::query(
            r#"
            INSERT INTO campaign_tasks (
                external_task_id, task_title, card_title, submission_rules,
                tag_requirements, settlement_text, hashtags, image_path, image_url,
                amount, status, task_type, participated, participation_count,
                extra_data, deadline, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.external_task_id)
        .bind(&new.task_title)
        .bind(&new.card_title)
        .bind(&new.submission_rules)
        .bind(&new.tag_requirements)
        .bind(&new.settlement_text)
        .bind(&hashtags)
        .bind(&new.image_path)
        .bind(&new.image_url)
        .bind(new.amount)
        .bind(new.status.as_str())
        .bind(new.task_type.as_str())
        .bind(&extra_data)
        .bind(new.deadline.map(|t| t.timestamp_millis()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DbError::on_insert(
                e,
                &format!("task with external id {} already exists", new.external_task_id),
            )
        })?;

        let id = result.last_insert_rowid();
        self.task_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("task {id}")))
    }

    /// Get a task by ID.
    pub async fn task_get(&self, id: i64) -> Result<Option<CampaignTask>> {
        let row = sqlx::query("SELECT * FROM campaign_tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_task(&r)).transpose()
    }

    /// Get a task by its external (platform) task id.
    pub async fn task_get_by_external_id(&self, external_id: &str) -> Result<Option<CampaignTask>> {
        let row = sqlx::query("SELECT * FROM campaign_tasks WHERE external_task_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_task(&r)).transpose()
    }

    /// List tasks, newest first.
    pub async fn task_list(&self, filter: TaskFilter) -> Result<Vec<CampaignTask>> {
        let mut sql = String::from("SELECT * FROM campaign_tasks WHERE 1=1");
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.task_type.is_some() {
            sql.push_str(" AND task_type = ?");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");
        sql.push_str(&format!(" LIMIT {}", filter.limit.unwrap_or(100)));
        if let Some(offset) = filter.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(task_type) = filter.task_type {
            query = query.bind(task_type.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_task).collect()
    }

    /// Update task fields; `None` entries are left untouched.
    pub async fn task_update(&self, id: i64, patch: &TaskPatch) -> Result<CampaignTask> {
        let existing = self
            .task_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("task {id}")))?;

        let hashtags = match &patch.hashtags {
            Some(tags) => serde_json::to_string(tags)?,
            None => serde_json::to_string(&existing.hashtags)?,
        };
        let extra_data = match &patch.extra_data {
            Some(value) => Some(serde_json::to_string(value)?),
            None => existing
                .extra_data
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        };

        sqlx::query(
            r#"
            UPDATE campaign_tasks SET
                task_title = ?, card_title = ?, submission_rules = ?,
                tag_requirements = ?, settlement_text = ?, hashtags = ?,
                image_path = ?, image_url = ?, amount = ?, status = ?,
                task_type = ?, extra_data = ?, deadline = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(
            patch
                .task_title
                .as_deref()
                .unwrap_or(existing.task_title.as_str()),
        )
        .bind(patch.card_title.as_deref().or(existing.card_title.as_deref()))
        .bind(
            patch
                .submission_rules
                .as_deref()
                .or(existing.submission_rules.as_deref()),
        )
        .bind(
            patch
                .tag_requirements
                .as_deref()
                .or(existing.tag_requirements.as_deref()),
        )
        .bind(
            patch
                .settlement_text
                .as_deref()
                .or(existing.settlement_text.as_deref()),
        )
        .bind(&hashtags)
        .bind(patch.image_path.as_deref().or(existing.image_path.as_deref()))
        .bind(patch.image_url.as_deref().or(existing.image_url.as_deref()))
        .bind(patch.amount.unwrap_or(existing.amount))
        .bind(patch.status.unwrap_or(existing.status).as_str())
        .bind(patch.task_type.unwrap_or(existing.task_type).as_str())
        .bind(&extra_data)
        .bind(
            patch
                .deadline
                .or(existing.deadline)
                .map(|t| t.timestamp_millis()),
        )
        .bind(Self::now_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.task_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("task {id}")))
    }

    /// Delete a task. Its rule cards go with it (ON DELETE CASCADE).
    pub async fn task_delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM campaign_tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("task {id}")));
        }
        Ok(())
    }

    // ========================================================================
    // Stats
    // ========================================================================

    /// Aggregate counts over the task store.
    pub async fn task_stats(&self) -> Result<TaskStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                SUM(CASE WHEN status = 'active' AND participated = 0 THEN 1 ELSE 0 END) AS active,
                SUM(CASE WHEN status = 'completed' OR participated = 1 THEN 1 ELSE 0 END) AS completed,
                SUM(CASE WHEN status = 'expired' THEN 1 ELSE 0 END) AS expired
            FROM campaign_tasks
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(TaskStats {
            total: row.get::<i64, _>("total") as u64,
            active: row.get::<Option<i64>, _>("active").unwrap_or(0) as u64,
            completed: row.get::<Option<i64>, _>("completed").unwrap_or(0) as u64,
            expired: row.get::<Option<i64>, _>("expired").unwrap_or(0) as u64,
        })
    }

    /// Participation counts over the task store.
    pub async fn participation_status(&self) -> Result<ParticipationStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, \
             SUM(CASE WHEN participated = 1 THEN 1 ELSE 0 END) AS participated \
             FROM campaign_tasks",
        )
        .fetch_one(&self.pool)
        .await?;

        let total = row.get::<i64, _>("total") as u64;
        let participated = row.get::<Option<i64>, _>("participated").unwrap_or(0) as u64;
        Ok(ParticipationStats {
            total,
            participated,
            not_participated: total - participated,
        })
    }

    /// Record a task-level participation (used by the submission workflow).
    pub async fn task_mark_participated(&self, id: i64) -> Result<CampaignTask> {
        let now = Self::now_millis();
        let result = sqlx::query(
            r#"
            UPDATE campaign_tasks SET
                participated = 1,
                participation_count = participation_count + 1,
                last_participated_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("task {id}")));
        }
        self.task_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("task {id}")))
    }

    // ========================================================================
    // Feed Sync
    // ========================================================================

    /// Apply a validated feed batch in a single all-or-nothing transaction.
    ///
    /// Existing tasks (matched on external_task_id) only get their
    /// feed-derived projection refreshed: title, amount, computed task type,
    /// and thumbnail URL. Operator-entered fields, rule cards, and all
    /// participation state stay untouched. New tasks are created active and
    /// unparticipated.
    pub async fn campaign_apply_feed(&self, records: &[FeedUpsert]) -> Result<FeedApplyStats> {
        let mut stats = FeedApplyStats::default();
        let mut tx = self.pool.begin().await?;

        for record in records {
            let existing =
                sqlx::query("SELECT id FROM campaign_tasks WHERE external_task_id = ?")
                    .bind(&record.external_task_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            match existing {
                Some(row) => {
                    sqlx::query(
                        r#"
                        UPDATE campaign_tasks SET
                            task_title = ?,
                            amount = COALESCE(?, amount),
                            task_type = ?,
                            image_url = COALESCE(?, image_url),
                            updated_at = ?
                        WHERE id = ?
                        "#,
                    )
                    .bind(&record.task_title)
                    .bind(record.amount)
                    .bind(record.task_type.as_str())
                    .bind(&record.image_url)
                    .bind(Self::now_millis())
                    .bind(row.get::<i64, _>("id"))
                    .execute(&mut *tx)
                    .await?;
                    stats.updated += 1;
                }
                None => {
                    let hashtags = serde_json::to_string(&record.hashtags)?;
                    let extra_data = serde_json::to_string(&record.extra_data)?;
                    let now = Self::now_millis();
                    sqlx::query(
                        r#"
                        INSERT INTO campaign_tasks (
                            external_task_id, task_title, card_title, submission_rules,
                            tag_requirements, settlement_text, hashtags, image_path,
                            image_url, amount, status, task_type, participated,
                            participation_count, extra_data, deadline, created_at, updated_at)
                        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, 0, 0, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(&record.external_task_id)
                    .bind(&record.task_title)
                    .bind(&record.card_title)
                    .bind(&record.submission_rules)
                    .bind(&record.tag_requirements)
                    .bind(&record.settlement_text)
                    .bind(&hashtags)
                    .bind(&record.image_path)
                    .bind(&record.image_url)
                    .bind(record.amount.unwrap_or(0.0))
                    .bind(record.task_type.as_str())
                    .bind(&extra_data)
                    .bind(record.deadline.map(|t| t.timestamp_millis()))
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        DbError::on_insert(
                            e,
                            &format!(
                                "task with external id {} already exists",
                                record.external_task_id
                            ),
                        )
                    })?;
                    stats.created += 1;
                }
            }
        }

        tx.commit().await?;
        Ok(stats)
    }
}

pub(crate) fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<CampaignTask> {
    let hashtags = row
        .get::<Option<String>, _>("hashtags")
        .map(|s| serde_json::from_str(&s))
        .transpose()?
        .unwrap_or_default();
    let extra_data = row
        .get::<Option<String>, _>("extra_data")
        .map(|s| serde_json::from_str(&s))
        .transpose()?;

    Ok(CampaignTask {
        id: row.get("id"),
        external_task_id: row.get("external_task_id"),
        task_title: row.get("task_title"),
        card_title: row.get("card_title"),
        submission_rules: row.get("submission_rules"),
        tag_requirements: row.get("tag_requirements"),
        settlement_text: row.get("settlement_text"),
        hashtags,
        image_path: row.get("image_path"),
        image_url: row.get("image_url"),
        amount: row.get("amount"),
        status: TaskStatus::from_str(&row.get::<String, _>("status")),
        task_type: TaskType::from_str(&row.get::<String, _>("task_type")),
        participated: row.get("participated"),
        participation_count: row.get("participation_count"),
        last_participated_at: row
            .get::<Option<i64>, _>("last_participated_at")
            .map(PromoDb::millis_to_datetime),
        extra_data,
        deadline: row
            .get::<Option<i64>, _>("deadline")
            .map(PromoDb::millis_to_datetime),
        created_at: PromoDb::millis_to_datetime(row.get("created_at")),
        updated_at: PromoDb::millis_to_datetime(row.get("updated_at")),
    })
}
