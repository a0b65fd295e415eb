//! Intent classification for consultation messages.
//!
//! Deterministic keyword + pattern scoring over a fixed taxonomy, no LLM
//! involved. A keyword hit scores 1, a pattern hit scores 2; the primary
//! intent is the highest scorer with confidence max/sum. A message that
//! matches nothing is a general inquiry at confidence 0.5.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fixed intent taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    GrantSearch,
    EligibilityCheck,
    ApplicationGuidance,
    DeadlineInquiry,
    AmountInquiry,
    Consultation,
    /// No taxonomy match.
    GeneralInquiry,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::GrantSearch => "grant_search",
            Intent::EligibilityCheck => "eligibility_check",
            Intent::ApplicationGuidance => "application_guidance",
            Intent::DeadlineInquiry => "deadline_inquiry",
            Intent::AmountInquiry => "amount_inquiry",
            Intent::Consultation => "consultation",
            Intent::GeneralInquiry => "general_inquiry",
        }
    }
}

/// Classification result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentScore {
    pub primary: Intent,
    /// In [0, 1]: share of the total score held by the primary intent.
    pub confidence: f32,
    pub all_scores: HashMap<Intent, u32>,
}

struct IntentRule {
    intent: Intent,
    keywords: &'static [&'static str],
    patterns: Vec<Regex>,
}

// Scored in declaration order; on a tie the earlier intent wins. That
// ordering is an implementation detail, not a contract.
static RULES: Lazy<Vec<IntentRule>> = Lazy::new(|| {
    vec![
        IntentRule {
            intent: Intent::GrantSearch,
            keywords: &["助成金", "補助金", "支援金", "探して", "検索", "募集", "見つけ"],
            patterns: compile(&[
                r"助成金.*(探|さが)",
                r"補助金.*(探|検索)",
                r"(おすすめ|最適|使える)の?(助成金|補助金)",
            ]),
        },
        IntentRule {
            intent: Intent::EligibilityCheck,
            keywords: &["対象", "条件", "資格", "該当", "要件", "当てはま"],
            patterns: compile(&[r"(対象|条件|資格).{0,8}か", r"(該当|当てはま)(します|りますか)"]),
        },
        IntentRule {
            intent: Intent::ApplicationGuidance,
            keywords: &["申請", "手続き", "書類", "応募", "提出", "流れ"],
            patterns: compile(&[r"申請.*(方法|手順|流れ|仕方)", r"どう(やって|すれば).*(申請|応募)"]),
        },
        IntentRule {
            intent: Intent::DeadlineInquiry,
            keywords: &["締切", "締め切り", "期限", "期日", "いつまで"],
            patterns: compile(&[r"いつまでに?", r"(締切|締め切り|期限).*(いつ|近い)"]),
        },
        IntentRule {
            intent: Intent::AmountInquiry,
            keywords: &["金額", "いくら", "上限", "補助額", "助成額", "万円"],
            patterns: compile(&[r"いくら(まで|もらえ)", r"(最大|上限).*(金額|額|万円)"]),
        },
        IntentRule {
            intent: Intent::Consultation,
            keywords: &["相談", "アドバイス", "教えて", "助けて", "サポート"],
            patterns: compile(&[r"相談(したい|に乗って|できます)", r"(教えて|アドバイス)(ください|ほしい)"]),
        },
    ]
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

/// Classify a (sanitized) consultation message.
pub fn classify(message: &str) -> IntentScore {
    let mut all_scores = HashMap::new();
    let mut best: Option<(Intent, u32)> = None;
    let mut total: u32 = 0;

    for rule in RULES.iter() {
        let mut score = 0u32;
        for keyword in rule.keywords {
            if message.contains(keyword) {
                score += 1;
            }
        }
        for pattern in &rule.patterns {
            if pattern.is_match(message) {
                score += 2;
            }
        }

        all_scores.insert(rule.intent, score);
        total += score;
        // Strict > keeps the first intent on ties.
        if score > 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((rule.intent, score));
        }
    }

    match best {
        Some((intent, score)) => IntentScore {
            primary: intent,
            confidence: score as f32 / total as f32,
            all_scores,
        },
        None => IntentScore {
            primary: Intent::GeneralInquiry,
            confidence: 0.5,
            all_scores,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_search_message() {
        let score = classify("創業支援の助成金を探しています");
        assert_eq!(score.primary, Intent::GrantSearch);
        assert!(score.confidence > 0.0);
        assert!(score.all_scores[&Intent::GrantSearch] > 0);
    }

    #[test]
    fn test_deadline_inquiry() {
        let score = classify("申請の締切はいつまでですか");
        // 締切 + いつまで keywords and two patterns outscore the lone
        // 申請 keyword of application guidance.
        assert_eq!(score.primary, Intent::DeadlineInquiry);
    }

    #[test]
    fn test_amount_inquiry() {
        let score = classify("補助の上限金額はいくらまで出ますか");
        assert_eq!(score.primary, Intent::AmountInquiry);
    }

    #[test]
    fn test_eligibility_check() {
        let score = classify("小規模事業者は対象になりますか");
        assert_eq!(score.primary, Intent::EligibilityCheck);
    }

    #[test]
    fn test_unmatched_message_is_general_inquiry() {
        let score = classify("こんにちは");
        assert_eq!(score.primary, Intent::GeneralInquiry);
        assert!((score.confidence - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_confidence_is_share_of_total() {
        let score = classify("助成金の申請書類について相談したい");
        let total: u32 = score.all_scores.values().sum();
        let max = score.all_scores[&score.primary];
        assert!((score.confidence - max as f32 / total as f32).abs() < f32::EPSILON);
        assert!(score.confidence > 0.0 && score.confidence <= 1.0);
    }
}
