//! Query expansion and relevance scoring.
//!
//! A fixed synonym table widens the query term set before the content-store
//! search, then a weighted additive scorer ranks what comes back. Plain
//! case-insensitive substring containment throughout; no stemming, no
//! fuzzy matching.

use crate::content::{GrantRecord, SearchFilter};
use serde::Serialize;

/// Weight per matching field.
const WEIGHT_TITLE: u32 = 3;
const WEIGHT_EXCERPT: u32 = 2;
const WEIGHT_CATEGORY: u32 = 2;
const WEIGHT_META_FIELD: u32 = 1;
const WEIGHT_FILTER_MATCH: u32 = 1;

/// Fixed synonym table. Keys are matched case-insensitively against the
/// raw query.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("IT", &["情報技術", "デジタル", "システム", "ソフトウェア"]),
    ("DX", &["デジタル", "デジタル変革", "システム"]),
    ("創業", &["起業", "スタートアップ", "開業"]),
    ("製造", &["ものづくり", "生産", "設備"]),
    ("雇用", &["採用", "人材", "求人"]),
    ("環境", &["省エネ", "エネルギー", "脱炭素"]),
];

/// Domain vocabulary recognized inside free-form consultation messages.
/// Ordered roughly by specificity; scanning is substring-based since
/// Japanese text carries no word boundaries.
const VOCABULARY: &[&str] = &[
    "助成金", "補助金", "支援金", "創業", "起業", "スタートアップ", "開業",
    "IT", "DX", "デジタル", "システム", "ソフトウェア", "情報技術",
    "製造", "ものづくり", "設備", "生産", "雇用", "人材", "採用",
    "環境", "省エネ", "エネルギー", "脱炭素", "販路", "経営",
];

/// Pull searchable terms out of a free-form message: vocabulary hits plus
/// their synonyms. Returns an empty set for a message with no domain
/// vocabulary at all.
pub fn extract_terms(message: &str) -> Vec<String> {
    let lower = message.to_lowercase();
    let mut terms: Vec<String> = Vec::new();

    for word in VOCABULARY {
        if lower.contains(&word.to_lowercase()) && !terms.iter().any(|t| t == word) {
            terms.push((*word).to_string());
        }
    }
    for (key, related) in SYNONYMS {
        if lower.contains(&key.to_lowercase()) {
            for term in *related {
                if !terms.iter().any(|t| t == term) {
                    terms.push((*term).to_string());
                }
            }
        }
    }
    terms
}

/// Expand a query into the term set backing the content-store search.
/// The original query always comes first; synonym terms follow in table
/// order, deduplicated.
pub fn expand_query(query: &str) -> Vec<String> {
    let trimmed = query.trim();
    let mut terms: Vec<String> = vec![trimmed.to_string()];
    let lower = trimmed.to_lowercase();

    for (key, related) in SYNONYMS {
        if lower.contains(&key.to_lowercase()) {
            for term in *related {
                if !terms.iter().any(|t| t == term) {
                    terms.push((*term).to_string());
                }
            }
        }
    }
    terms
}

/// A record paired with its relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct RankedGrant {
    #[serde(flatten)]
    pub record: GrantRecord,
    pub relevance_score: u32,
}

fn contains_any(haystack: &str, terms: &[String]) -> bool {
    let lower = haystack.to_lowercase();
    terms.iter().any(|t| lower.contains(&t.to_lowercase()))
}

/// Weighted additive score for one candidate.
pub fn score(record: &GrantRecord, terms: &[String], filters: &SearchFilter) -> u32 {
    let mut total = 0;

    if contains_any(&record.title, terms) {
        total += WEIGHT_TITLE;
    }
    if contains_any(&record.excerpt, terms) {
        total += WEIGHT_EXCERPT;
    }
    for category in &record.meta.categories {
        if contains_any(category, terms) {
            total += WEIGHT_CATEGORY;
        }
    }

    let meta_fields = [
        record.meta.target_business_type.as_deref().unwrap_or(""),
        record.meta.difficulty.as_deref().unwrap_or(""),
        &record.meta.prefectures.join(" "),
    ];
    for field in meta_fields {
        if !field.is_empty() && contains_any(field, terms) {
            total += WEIGHT_META_FIELD;
        }
    }

    if let Some(ref category) = filters.category {
        if record.meta.categories.iter().any(|c| c == category) {
            total += WEIGHT_FILTER_MATCH;
        }
    }
    if let Some(ref prefecture) = filters.prefecture {
        if record.meta.prefectures.iter().any(|p| p == prefecture) {
            total += WEIGHT_FILTER_MATCH;
        }
    }

    total
}

/// Rank candidates by descending score. The sort is stable, so equal
/// scores keep their retrieval order.
pub fn rank(records: Vec<GrantRecord>, terms: &[String], filters: &SearchFilter) -> Vec<RankedGrant> {
    let mut ranked: Vec<RankedGrant> = records
        .into_iter()
        .map(|record| {
            let relevance_score = score(&record, terms, filters);
            RankedGrant {
                record,
                relevance_score,
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::test_fixtures::sample_records;

    #[test]
    fn test_expand_it_query() {
        let terms = expand_query("IT導入");
        assert_eq!(terms[0], "IT導入");
        for expected in ["情報技術", "デジタル", "システム", "ソフトウェア"] {
            assert!(terms.iter().any(|t| t == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_expand_is_case_insensitive_and_dedups() {
        let terms = expand_query("it DX");
        assert!(terms.iter().any(|t| t == "情報技術"));
        // デジタル appears under both keys but only once in the set.
        assert_eq!(terms.iter().filter(|t| *t == "デジタル").count(), 1);
    }

    #[test]
    fn test_unmapped_query_stays_as_is() {
        assert_eq!(expand_query(" 観光 "), vec!["観光".to_string()]);
    }

    #[test]
    fn test_synonym_hit_scores_in_title() {
        let records = sample_records();
        let terms = expand_query("IT導入");
        // "IT導入補助金" title contains the query itself; the デジタル
        // synonym also hits its excerpt and category.
        let s = score(&records[0], &terms, &SearchFilter::default());
        assert!(s > 0);
    }

    #[test]
    fn test_title_match_outranks_meta_match() {
        let records = sample_records();
        let terms = vec!["創業".to_string()];
        let filters = SearchFilter::default();
        // Record 2 matches in title (+3) and excerpt (+2); a record that
        // matched only one meta field could score at most 1.
        let title_hit = score(&records[1], &terms, &filters);
        let meta_terms = vec!["個人事業主".to_string()];
        let meta_hit = score(&records[1], &meta_terms, &filters);
        assert!(title_hit > meta_hit);
        assert_eq!(meta_hit, WEIGHT_META_FIELD);
    }

    #[test]
    fn test_rank_is_descending_and_stable() {
        let records = sample_records();
        // 支援 hits record 2 in the title (+3) and records 1 and 3 only in
        // the excerpt (+2 each), an exact tie.
        let terms = vec!["支援".to_string()];
        let ranked = rank(records, &terms, &SearchFilter::default());

        for pair in ranked.windows(2) {
            assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }
        let order: Vec<u64> = ranked.iter().map(|r| r.record.id).collect();
        // Title hit first, then the tied pair in retrieval order.
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn test_filter_match_adds_weight() {
        let records = sample_records();
        let terms = vec!["補助金".to_string()];
        let no_filter = score(&records[0], &terms, &SearchFilter::default());
        let with_filter = score(
            &records[0],
            &terms,
            &SearchFilter {
                category: Some("IT".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(with_filter, no_filter + WEIGHT_FILTER_MATCH);
    }
}
