//! Campaign task classification
//!
//! Pure title-keyword classification. The feed's category hint only supplies
//! a default; a keyword match always wins.

use promoflow_db::TaskType;

/// Community indicators, most specific first. The bare "社群" must stay
/// last: the longer markers have to fail before the generic one is tested,
/// keeping the SP stage scoped to genuinely community-flavored titles.
const COMMUNITY_MARKERS: &[&str] = &[
    "社群专属任务",
    "社群专属",
    "社群SP委托",
    "社群征集活动",
    "社群活动",
    "社群",
];

/// Classify a task title.
///
/// A community marker plus "SP" anywhere in the title means a special
/// community commission; a marker alone means community; no marker means an
/// ordinary submission task.
pub fn classify(title: &str) -> TaskType {
    let marker = COMMUNITY_MARKERS
        .iter()
        .find(|marker| title.contains(*marker));
    match marker {
        None => TaskType::Submission,
        Some(_) => {
            if title.contains("SP") {
                TaskType::CommunitySpecial
            } else {
                TaskType::Community
            }
        }
    }
}

/// Classify with an optional feed category hint as the fallback default.
pub fn classify_with_hint(title: &str, hint: Option<&str>) -> TaskType {
    match classify(title) {
        TaskType::Submission => hint
            .and_then(TaskType::from_hint)
            .unwrap_or(TaskType::Submission),
        keyword_match => keyword_match,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_commission() {
        assert_eq!(classify("社群SP委托活动"), TaskType::CommunitySpecial);
        assert_eq!(classify("社群活动SP专场"), TaskType::CommunitySpecial);
    }

    #[test]
    fn test_community() {
        assert_eq!(classify("社群专属任务"), TaskType::Community);
        assert_eq!(classify("社群"), TaskType::Community);
        assert_eq!(classify("春日社群征集活动"), TaskType::Community);
    }

    #[test]
    fn test_submission() {
        assert_eq!(classify("新年活动"), TaskType::Submission);
        assert_eq!(classify(""), TaskType::Submission);
        // "SP" without a community marker is not special
        assert_eq!(classify("SP限定投稿"), TaskType::Submission);
    }

    #[test]
    fn test_hint_is_only_a_default() {
        assert_eq!(
            classify_with_hint("社群活动征集", Some("OTHER")),
            TaskType::Community
        );
        assert_eq!(
            classify_with_hint("好物推荐", Some("buyer")),
            TaskType::Buyer
        );
        assert_eq!(
            classify_with_hint("好物推荐", Some("mystery")),
            TaskType::Submission
        );
        assert_eq!(classify_with_hint("好物推荐", None), TaskType::Submission);
    }
}
