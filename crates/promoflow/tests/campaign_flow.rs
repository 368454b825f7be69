//! End-to-end campaign flow: feed sync, rule cards, participation cascade.

use promoflow::campaign::{build_task_prompt, sync_feed};
use promoflow_db::{NewRuleCard, PromoDb, TaskType};
use serde_json::json;

#[tokio::test]
async fn feed_to_participation_lifecycle() {
    let db = PromoDb::open_in_memory().await.unwrap();

    let report = sync_feed(
        &db,
        &[json!({
            "externalId": "T1",
            "title": "社群SP委托活动",
            "amount": 200,
            "hashtags": ["春日"],
            "submissionRules": "图文原创"
        })],
    )
    .await
    .unwrap();
    assert_eq!(report.created, 1);

    let task = db.task_get_by_external_id("T1").await.unwrap().unwrap();
    assert_eq!(task.task_type, TaskType::CommunitySpecial);

    let prompt = build_task_prompt(&task);
    assert!(prompt.contains("社群SP委托活动"));
    assert!(prompt.contains("图文原创"));

    // Two rule cards; marking both completes the task
    let first = db
        .rule_card_create(task.id, &NewRuleCard::default())
        .await
        .unwrap();
    let second = db
        .rule_card_create(task.id, &NewRuleCard::default())
        .await
        .unwrap();
    assert_eq!(second.display_order, first.display_order + 1);

    db.rule_card_mark_participated(first.id).await.unwrap();
    assert!(!db.task_get(task.id).await.unwrap().unwrap().participated);
    assert_eq!(db.rule_card_available_count(task.id).await.unwrap(), 1);

    db.rule_card_mark_participated(second.id).await.unwrap();
    let task = db.task_get(task.id).await.unwrap().unwrap();
    assert!(task.participated);
    assert_eq!(task.participation_count, 2);

    // Un-marking any card flips the task back
    db.rule_card_set_participation(first.id, false)
        .await
        .unwrap();
    let task = db.task_get(task.id).await.unwrap().unwrap();
    assert!(!task.participated);
    // set_participation never touches the task counter
    assert_eq!(task.participation_count, 2);
}

#[tokio::test]
async fn resync_after_participation_keeps_state() {
    let db = PromoDb::open_in_memory().await.unwrap();

    sync_feed(&db, &[json!({"externalId": "T9", "title": "首发"})])
        .await
        .unwrap();
    let task = db.task_get_by_external_id("T9").await.unwrap().unwrap();

    let card = db
        .rule_card_create(task.id, &NewRuleCard::default())
        .await
        .unwrap();
    db.rule_card_mark_participated(card.id).await.unwrap();

    let report = sync_feed(
        &db,
        &[json!({"externalId": "T9", "title": "改标题", "amount": 5})],
    )
    .await
    .unwrap();
    assert_eq!(report.updated, 1);

    let task = db.task_get_by_external_id("T9").await.unwrap().unwrap();
    assert_eq!(task.task_title, "改标题");
    // Participation and rule cards survive resync
    assert!(task.participated);
    assert_eq!(db.rule_card_list(task.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn mixed_batch_counts_each_outcome() {
    let db = PromoDb::open_in_memory().await.unwrap();

    sync_feed(&db, &[json!({"externalId": "A", "title": "既有"})])
        .await
        .unwrap();

    let report = sync_feed(
        &db,
        &[
            json!({"externalId": "A", "title": "既有更新"}),
            json!({"externalId": "B", "title": "新任务"}),
            json!({"title": "缺编号"}),
        ],
    )
    .await
    .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.total, 3);
}
