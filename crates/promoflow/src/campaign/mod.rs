//! Campaign Tasks - feed ingestion, classification & participation

pub mod classifier;
pub mod sync;

pub use classifier::{classify, classify_with_hint};
pub use sync::sync as sync_feed;

use promoflow_db::CampaignTask;

/// Build the text prompt the submission workflow feeds to the caption
/// generator: title, hashtags, tag requirements and submission rules,
/// separated by blank lines. Empty fields are left out.
pub fn build_task_prompt(task: &CampaignTask) -> String {
    let mut parts = Vec::new();

    if !task.task_title.is_empty() {
        parts.push(format!("任务: {}", task.task_title));
    }
    if !task.hashtags.is_empty() {
        parts.push(format!("话题标签: {}", task.hashtags.join(" ")));
    }
    if let Some(tags) = task.tag_requirements.as_deref() {
        parts.push(format!("话题要求: {tags}"));
    }
    if let Some(rules) = task.submission_rules.as_deref() {
        parts.push(format!("投稿规则: {rules}"));
    }

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use promoflow_db::{TaskStatus, TaskType};

    fn task() -> CampaignTask {
        CampaignTask {
            id: 1,
            external_task_id: "T1".into(),
            task_title: "春日穿搭".into(),
            card_title: None,
            submission_rules: Some("原创图文".into()),
            tag_requirements: None,
            settlement_text: None,
            hashtags: vec!["穿搭".into(), "春天".into()],
            image_path: None,
            image_url: None,
            amount: 0.0,
            status: TaskStatus::Active,
            task_type: TaskType::Submission,
            participated: false,
            participation_count: 0,
            last_participated_at: None,
            extra_data: None,
            deadline: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_skips_empty_fields() {
        let prompt = build_task_prompt(&task());
        assert_eq!(prompt, "任务: 春日穿搭\n\n话题标签: 穿搭 春天\n\n投稿规则: 原创图文");
    }
}
