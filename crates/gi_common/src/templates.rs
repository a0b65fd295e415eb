//! Rule-based response templates and the fallback cascade.
//!
//! The rule-based path serves every consultation when the external AI is
//! disabled or failing; the fallback provider sits below it and cannot
//! fail. No I/O, no lookups, just fixed text.

use crate::intent::Intent;
use std::collections::HashMap;

/// Confidence of a rule-based template reply.
pub const TEMPLATE_CONFIDENCE: f32 = 0.7;
/// Confidence of a degraded fallback reply.
pub const FALLBACK_CONFIDENCE: f32 = 0.3;

/// A canned reply before contextual augmentation.
#[derive(Debug, Clone)]
pub struct TemplateReply {
    pub text: String,
    pub suggestions: Vec<String>,
    pub follow_up_questions: Vec<String>,
    pub confidence: f32,
}

/// Canned template for one intent.
pub fn response_for(intent: Intent) -> TemplateReply {
    let (text, suggestions, follow_ups): (&str, &[&str], &[&str]) = match intent {
        Intent::GrantSearch => (
            "ご希望に合う助成金・補助金をお探しします。業種や目的を教えていただくと、より適切な制度をご案内できます。",
            &["キーワードで検索する", "カテゴリから探す", "人気の助成金を見る"],
            &["どのような事業をされていますか？", "ご希望の支援金額はどのくらいですか？"],
        ),
        Intent::EligibilityCheck => (
            "対象条件の確認ですね。多くの制度では業種・従業員数・所在地が主な要件になります。気になる制度名を教えてください。",
            &["対象条件を診断する", "業種別の制度を見る"],
            &["従業員数は何名ですか？", "事業所の所在地はどちらですか？"],
        ),
        Intent::ApplicationGuidance => (
            "申請手続きのご案内です。一般的な流れは、公募要領の確認 → 必要書類の準備 → 電子申請、の3ステップです。",
            &["申請の流れを見る", "必要書類のチェックリスト", "電子申請の準備"],
            &["どの制度への申請をお考えですか？", "申請期限は確認済みですか？"],
        ),
        Intent::DeadlineInquiry => (
            "締切・期限のご確認ですね。制度ごとに公募期間が異なりますので、検索結果の締切欄をご確認ください。",
            &["締切が近い助成金を見る", "公募中の制度を探す"],
            &["どの制度の締切をお調べですか？", "申請準備はどの段階ですか？"],
        ),
        Intent::AmountInquiry => (
            "支援金額のご質問ですね。制度によって上限額と補助率が異なります。目的の事業規模を教えていただくと絞り込めます。",
            &["金額の大きい順に見る", "補助率で比較する"],
            &["想定している事業費はどのくらいですか？", "対象経費はお決まりですか？"],
        ),
        Intent::Consultation => (
            "ご相談ありがとうございます。事業の状況に合わせて、活用できる支援制度を一緒に整理していきましょう。",
            &["まず助成金を探す", "対象条件を確認する", "申請の流れを知る"],
            &["現在の事業ステージを教えてください。", "特に知りたいことは何ですか？"],
        ),
        Intent::GeneralInquiry => (
            "助成金・補助金に関するご質問にお答えします。制度探し、対象条件、申請方法、締切、金額など、お気軽にお尋ねください。",
            &["助成金を探す", "よくある質問を見る"],
            &["どのようなことにお困りですか？", "事業の業種を教えていただけますか？"],
        ),
    };

    TemplateReply {
        text: text.to_string(),
        suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        follow_up_questions: follow_ups.iter().map(|s| s.to_string()).collect(),
        confidence: TEMPLATE_CONFIDENCE,
    }
}

/// Append context-derived sentences to a template reply.
pub fn augment_with_context(reply: &mut TemplateReply, context: &HashMap<String, String>) {
    if let Some(business_type) = context.get("business_type") {
        if !business_type.trim().is_empty() {
            reply
                .text
                .push_str(&format!("{}向けの制度を優先してご案内します。", business_type));
        }
    }
    if context.get("urgency").map(String::as_str) == Some("high") {
        reply
            .text
            .push_str("お急ぎとのことですので、締切が近い制度から確認することをおすすめします。");
    }
}

// ============================================================================
// Fallback provider
// ============================================================================

/// Why the normal paths gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// External AI provider unreachable or circuit open.
    ProviderUnavailable,
    /// Content store unreachable or circuit open.
    ContentStoreUnavailable,
    /// Unexpected internal failure.
    Internal,
}

/// Degraded reply for a failure. This path performs no I/O and cannot fail.
pub fn fallback_for(kind: FailureKind) -> TemplateReply {
    let text = match kind {
        FailureKind::ProviderUnavailable => {
            "申し訳ございません。AI応答が一時的に利用できないため、基本的なご案内のみとなります。助成金の検索は引き続きご利用いただけます。"
        }
        FailureKind::ContentStoreUnavailable => {
            "申し訳ございません。助成金データの取得が一時的にできません。しばらく待ってから再度お試しください。"
        }
        FailureKind::Internal => {
            "申し訳ございません。処理中に問題が発生しました。お手数ですが、もう一度お試しください。"
        }
    };

    TemplateReply {
        text: text.to_string(),
        suggestions: vec![
            "もう一度試す".to_string(),
            "助成金を検索する".to_string(),
            "よくある質問を見る".to_string(),
        ],
        follow_up_questions: vec![
            "他にお手伝いできることはありますか？".to_string(),
            "お探しの制度のキーワードを教えてください。".to_string(),
        ],
        confidence: FALLBACK_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_intent_has_a_complete_template() {
        let intents = [
            Intent::GrantSearch,
            Intent::EligibilityCheck,
            Intent::ApplicationGuidance,
            Intent::DeadlineInquiry,
            Intent::AmountInquiry,
            Intent::Consultation,
            Intent::GeneralInquiry,
        ];
        for intent in intents {
            let reply = response_for(intent);
            assert!(!reply.text.is_empty(), "{:?} has empty text", intent);
            assert!(
                (2..=3).contains(&reply.suggestions.len()),
                "{:?} suggestion count",
                intent
            );
            assert_eq!(reply.follow_up_questions.len(), 2, "{:?} follow-ups", intent);
            assert!((0.0..=1.0).contains(&reply.confidence));
        }
    }

    #[test]
    fn test_grant_search_has_three_suggestions() {
        assert_eq!(response_for(Intent::GrantSearch).suggestions.len(), 3);
    }

    #[test]
    fn test_context_augmentation() {
        let mut reply = response_for(Intent::GrantSearch);
        let base_len = reply.text.chars().count();

        let mut context = HashMap::new();
        context.insert("business_type".to_string(), "製造業".to_string());
        context.insert("urgency".to_string(), "high".to_string());
        augment_with_context(&mut reply, &context);

        assert!(reply.text.chars().count() > base_len);
        assert!(reply.text.contains("製造業"));
        assert!(reply.text.contains("締切が近い"));
    }

    #[test]
    fn test_no_context_leaves_text_unchanged() {
        let mut reply = response_for(Intent::Consultation);
        let before = reply.text.clone();
        augment_with_context(&mut reply, &HashMap::new());
        assert_eq!(reply.text, before);
    }

    #[test]
    fn test_fallback_never_empty() {
        for kind in [
            FailureKind::ProviderUnavailable,
            FailureKind::ContentStoreUnavailable,
            FailureKind::Internal,
        ] {
            let reply = fallback_for(kind);
            assert!(!reply.text.is_empty());
            assert!(!reply.suggestions.is_empty());
            assert!((0.0..=1.0).contains(&reply.confidence));
        }
    }
}
