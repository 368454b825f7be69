//! Feed sync
//!
//! Takes the raw task list handed over by the scraper collaborator and
//! upserts it into the task store. Records without an external task id are
//! counted as skipped; everything that validates is applied in one
//! all-or-nothing database transaction. Sync only refreshes feed-derived
//! projection fields on existing tasks - operator-entered text and
//! participation state are never touched here.

use super::classifier::classify_with_hint;
use crate::error::Result;
use chrono::{DateTime, Utc};
use promoflow_db::{FeedUpsert, PromoDb, SyncReport};
use serde_json::Value;
use tracing::{debug, info};

/// First non-empty string among the given keys. Numeric values stringify,
/// so task numbers survive feeds that send them as integers.
fn string_field(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn number_field(record: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match record.get(*key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn hashtags_field(record: &Value) -> Vec<String> {
    record
        .get("hashtags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Deadlines arrive either as epoch milliseconds or an RFC 3339 string.
fn deadline_field(record: &Value) -> Option<DateTime<Utc>> {
    match record.get("deadline") {
        Some(Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}

/// Build the upsert for one feed record, or `None` when it lacks an
/// external task id.
fn parse_record(raw: &Value) -> Option<FeedUpsert> {
    let external_task_id = string_field(raw, &["externalId", "taskNo"])?;
    let task_title = string_field(raw, &["title", "taskTitle"]).unwrap_or_default();
    let hint = string_field(raw, &["categoryHint", "category"]);
    let task_type = classify_with_hint(&task_title, hint.as_deref());

    Some(FeedUpsert {
        external_task_id,
        task_title,
        card_title: string_field(raw, &["cardTitle"]),
        submission_rules: string_field(raw, &["submissionRules"]),
        tag_requirements: string_field(raw, &["hashtagRequirements", "tagRequirements"]),
        settlement_text: string_field(raw, &["settlementMethod", "settlementText"]),
        hashtags: hashtags_field(raw),
        image_path: string_field(raw, &["imagePath"]),
        image_url: string_field(raw, &["thumbnailUrl", "imageUrl"]),
        amount: number_field(raw, &["amount", "bonusPoolAmount"]),
        task_type,
        deadline: deadline_field(raw),
        extra_data: raw.clone(),
    })
}

/// Sync a feed batch into the task store.
pub async fn sync(db: &PromoDb, records: &[Value]) -> Result<SyncReport> {
    let mut upserts = Vec::with_capacity(records.len());
    let mut skipped = 0u64;

    for raw in records {
        match parse_record(raw) {
            Some(upsert) => upserts.push(upsert),
            None => {
                debug!("feed record without external task id, skipping");
                skipped += 1;
            }
        }
    }

    let applied = db.campaign_apply_feed(&upserts).await?;
    let report = SyncReport {
        created: applied.created,
        updated: applied.updated,
        skipped,
        total: records.len() as u64,
    };

    info!(
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        total = report.total,
        "Feed sync complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use promoflow_db::{TaskStatus, TaskType};
    use serde_json::json;

    #[tokio::test]
    async fn test_sync_creates_and_classifies() {
        let db = PromoDb::open_in_memory().await.unwrap();

        let records = vec![json!({
            "externalId": "T1",
            "title": "社群活动征集",
            "categoryHint": "OTHER",
            "amount": 100
        })];
        let report = sync(&db, &records).await.unwrap();

        assert_eq!(
            report,
            SyncReport {
                created: 1,
                updated: 0,
                skipped: 0,
                total: 1
            }
        );

        let task = db.task_get_by_external_id("T1").await.unwrap().unwrap();
        assert_eq!(task.task_type, TaskType::Community);
        assert_eq!(task.amount, 100.0);
        assert_eq!(task.status, TaskStatus::Active);
        assert!(!task.participated);
        assert_eq!(task.extra_data, Some(records[0].clone()));
    }

    #[tokio::test]
    async fn test_sync_skips_records_without_external_id() {
        let db = PromoDb::open_in_memory().await.unwrap();

        let records = vec![
            json!({"title": "no id"}),
            json!({"externalId": "T2", "title": "ok"}),
        ];
        let report = sync(&db, &records).await.unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total, 2);
    }

    #[tokio::test]
    async fn test_second_sync_only_refreshes_projection() {
        let db = PromoDb::open_in_memory().await.unwrap();

        sync(
            &db,
            &[json!({
                "externalId": "T3",
                "title": "初稿",
                "amount": 10,
                "submissionRules": "first rules",
                "thumbnailUrl": "http://cdn/a.jpg"
            })],
        )
        .await
        .unwrap();

        // Operator touches participation between syncs
        let task = db.task_get_by_external_id("T3").await.unwrap().unwrap();
        db.task_mark_participated(task.id).await.unwrap();

        let report = sync(
            &db,
            &[json!({
                "externalId": "T3",
                "title": "社群活动新标题",
                "amount": 25,
                "submissionRules": "second rules",
                "thumbnailUrl": "http://cdn/b.jpg"
            })],
        )
        .await
        .unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.created, 0);

        let task = db.task_get_by_external_id("T3").await.unwrap().unwrap();
        // Projection fields refreshed
        assert_eq!(task.task_title, "社群活动新标题");
        assert_eq!(task.amount, 25.0);
        assert_eq!(task.task_type, TaskType::Community);
        assert_eq!(task.image_url.as_deref(), Some("http://cdn/b.jpg"));
        // Operator/participation fields untouched
        assert_eq!(task.submission_rules.as_deref(), Some("first rules"));
        assert!(task.participated);
        assert_eq!(task.participation_count, 1);
    }

    #[tokio::test]
    async fn test_sync_never_duplicates_external_id() {
        let db = PromoDb::open_in_memory().await.unwrap();

        let batch = vec![json!({"externalId": "T4", "title": "a"})];
        sync(&db, &batch).await.unwrap();
        sync(&db, &batch).await.unwrap();

        let tasks = db.task_list(Default::default()).await.unwrap();
        assert_eq!(tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_numeric_external_id_and_original_feed_keys() {
        let db = PromoDb::open_in_memory().await.unwrap();

        let records = vec![json!({
            "taskNo": 90210,
            "taskTitle": "买家秀任务",
            "category": "buyer",
            "bonusPoolAmount": "88.5",
            "hashtags": ["春日", "好物"]
        })];
        let report = sync(&db, &records).await.unwrap();
        assert_eq!(report.created, 1);

        let task = db.task_get_by_external_id("90210").await.unwrap().unwrap();
        assert_eq!(task.task_type, TaskType::Buyer);
        assert_eq!(task.amount, 88.5);
        assert_eq!(task.hashtags, vec!["春日", "好物"]);
    }
}
