//! Rule card database operations (CRUD & participation cascade)
//!
//! Two participation mutations exist with deliberately different cascade
//! rules (see `rule_card_mark_participated` vs `rule_card_set_participation`).
//! They are kept distinct on purpose; do not unify them.

use crate::error::{DbError, Result};
use crate::types::*;
use crate::PromoDb;
use sqlx::Row;

impl PromoDb {
    /// Create a rule card under a task.
    ///
    /// When no display order is given, the card goes after the task's
    /// current highest order.
    pub async fn rule_card_create(&self, task_id: i64, new: &NewRuleCard) -> Result<RuleCard> {
        let mut tx = self.pool.begin().await?;

        let task = sqlx::query("SELECT id FROM campaign_tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?;
        if task.is_none() {
            return Err(DbError::not_found(format!("task {task_id}")));
        }

        let display_order = match new.display_order {
            Some(order) => order,
            None => {
                let row = sqlx::query(
                    "SELECT COALESCE(MAX(display_order), 0) AS max_order \
                     FROM task_rule_cards WHERE task_id = ?",
                )
                .bind(task_id)
                .fetch_one(&mut *tx)
                .await?;
                row.get::<i64, _>("max_order") + 1
            }
        };

        let now = Self::now_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO task_rule_cards (
                task_id, name, description, image_path, image_url, display_order,
                participated, participation_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
            "#,
        )
        .bind(task_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.image_path)
        .bind(&new.image_url)
        .bind(display_order)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        tx.commit().await?;

        self.rule_card_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("rule card {id}")))
    }

    /// Get a rule card by ID.
    pub async fn rule_card_get(&self, id: i64) -> Result<Option<RuleCard>> {
        let row = sqlx::query("SELECT * FROM task_rule_cards WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_rule_card(&r)).transpose()
    }

    /// List a task's rule cards in display order.
    pub async fn rule_card_list(&self, task_id: i64) -> Result<Vec<RuleCard>> {
        let rows = sqlx::query(
            "SELECT * FROM task_rule_cards WHERE task_id = ? ORDER BY display_order, id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_rule_card).collect()
    }

    /// Count of a task's cards that have not been participated yet.
    pub async fn rule_card_available_count(&self, task_id: i64) -> Result<u64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS available FROM task_rule_cards \
             WHERE task_id = ? AND participated = 0",
        )
        .bind(task_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("available") as u64)
    }

    /// Update rule card fields; `None` entries are left untouched.
    pub async fn rule_card_update(&self, id: i64, patch: &RuleCardPatch) -> Result<RuleCard> {
        let existing = self
            .rule_card_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("rule card {id}")))?;

        sqlx::query(
            r#"
            UPDATE task_rule_cards SET
                name = ?, description = ?, image_path = ?, image_url = ?,
                display_order = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(patch.name.as_deref().or(existing.name.as_deref()))
        .bind(
            patch
                .description
                .as_deref()
                .or(existing.description.as_deref()),
        )
        .bind(patch.image_path.as_deref().or(existing.image_path.as_deref()))
        .bind(patch.image_url.as_deref().or(existing.image_url.as_deref()))
        .bind(patch.display_order.unwrap_or(existing.display_order))
        .bind(Self::now_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.rule_card_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("rule card {id}")))
    }

    /// Delete a rule card.
    pub async fn rule_card_delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM task_rule_cards WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("rule card {id}")));
        }
        Ok(())
    }

    /// Record a participation against a rule card.
    ///
    /// The parent task's participation counter and timestamp are bumped
    /// unconditionally. The task's participated flag flips to true only when
    /// every OTHER card of the task (this one excluded by id, not by its
    /// just-written state) is already participated.
    pub async fn rule_card_mark_participated(&self, id: i64) -> Result<RuleCard> {
        let mut tx = self.pool.begin().await?;

        let card = sqlx::query("SELECT task_id FROM task_rule_cards WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found(format!("rule card {id}")))?;
        let task_id: i64 = card.get("task_id");

        let now = Self::now_millis();
        sqlx::query(
            r#"
            UPDATE task_rule_cards SET
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
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE campaign_tasks SET
                participation_count = participation_count + 1,
                last_participated_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

        let remaining = sqlx::query(
            "SELECT COUNT(*) AS remaining FROM task_rule_cards \
             WHERE task_id = ? AND id != ? AND participated = 0",
        )
        .bind(task_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if remaining.get::<i64, _>("remaining") == 0 {
            sqlx::query("UPDATE campaign_tasks SET participated = 1 WHERE id = ?")
                .bind(task_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.rule_card_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("rule card {id}")))
    }

    /// Set a rule card's participated flag to an explicit value
    /// (supports un-marking).
    ///
    /// A false→true transition bumps the card's counter and timestamp; a
    /// transition to false decrements nothing. The task's participated flag
    /// is recomputed as the AND over ALL current cards, including this one.
    /// Unlike `rule_card_mark_participated`, the task's counter and
    /// timestamp are not touched.
    pub async fn rule_card_set_participation(
        &self,
        id: i64,
        participated: bool,
    ) -> Result<RuleCard> {
        let mut tx = self.pool.begin().await?;

        let card = sqlx::query(
            "SELECT task_id, participated FROM task_rule_cards WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found(format!("rule card {id}")))?;
        let task_id: i64 = card.get("task_id");
        let was_participated: bool = card.get("participated");

        let now = Self::now_millis();
        if participated && !was_participated {
            sqlx::query(
                r#"
                UPDATE task_rule_cards SET
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
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "UPDATE task_rule_cards SET participated = ?, updated_at = ? WHERE id = ?",
            )
            .bind(participated)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let unparticipated = sqlx::query(
            "SELECT COUNT(*) AS unparticipated FROM task_rule_cards \
             WHERE task_id = ? AND participated = 0",
        )
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await?;
        let all_participated = unparticipated.get::<i64, _>("unparticipated") == 0;

        sqlx::query("UPDATE campaign_tasks SET participated = ?, updated_at = ? WHERE id = ?")
            .bind(all_participated)
            .bind(now)
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.rule_card_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("rule card {id}")))
    }
}

fn row_to_rule_card(row: &sqlx::sqlite::SqliteRow) -> Result<RuleCard> {
    Ok(RuleCard {
        id: row.get("id"),
        task_id: row.get("task_id"),
        name: row.get("name"),
        description: row.get("description"),
        image_path: row.get("image_path"),
        image_url: row.get("image_url"),
        display_order: row.get("display_order"),
        participated: row.get("participated"),
        participation_count: row.get("participation_count"),
        last_participated_at: row
            .get::<Option<i64>, _>("last_participated_at")
            .map(PromoDb::millis_to_datetime),
        created_at: PromoDb::millis_to_datetime(row.get("created_at")),
        updated_at: PromoDb::millis_to_datetime(row.get("updated_at")),
    })
}
