//! Input sanitization.
//!
//! Sanitization never fails and never rejects: malicious substrings are
//! stripped in place so the rest of the request can still be served. The
//! one exception is a SQL-shaped payload, which empties the whole string
//! and logs an incident. Partial stripping of those tends to leave a
//! still-dangerous remainder.
//!
//! Stripping runs to a fixpoint, and the SQL check runs on the stripped
//! text. Both matter: removing one match can splice the surrounding text
//! into a new match, and a SQL payload can hide behind markup that a
//! single raw-text check would never see through.
//!
//! `sanitize` is idempotent for every kind: a second pass over its own
//! output is a no-op.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// What the text is used for. Each kind has its own length bound and
/// character policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Consultation chat message. Clamped to 2000 chars.
    Message,
    /// Search query. Word/whitespace/CJK characters only, clamped to 500.
    Search,
    /// Free-form user data field. Pattern stripping only.
    UserData,
}

const MESSAGE_MAX_CHARS: usize = 2000;
const SEARCH_MAX_CHARS: usize = 500;

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());

static MALICIOUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Unpaired script tags survive the block regex above.
        r"(?i)</?script[^>]*>",
        r"(?i)javascript\s*:",
        r"(?i)vbscript\s*:",
        // Inline event handlers: onclick=, onerror=, ...
        r"(?i)\bon\w+\s*=",
        r"(?i)\beval\s*\(",
        r"(?i)\bsettimeout\s*\(",
        r"(?i)\bsetinterval\s*\(",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SQL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Tautological conditions: ' OR 1=1, " AND '2'='2'
        r#"(?i)['"]\s*(or|and)\s+['"]?\w+['"]?\s*=\s*['"]?\w+"#,
        r"(?i)\bunion(\s+all)?\s+select\b",
        // Statement terminator followed by a mutating keyword.
        r"(?i);\s*(drop|delete|truncate|update|insert)\b",
        // Quote followed by a SQL comment marker.
        r#"(?i)['"]\s*--"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Sanitize `text` for the given kind. Never fails.
pub fn sanitize(text: &str, kind: InputKind) -> String {
    let clean = strip_malicious(text);

    if SQL_PATTERNS.iter().any(|re| re.is_match(&clean)) {
        warn!(
            incident = "sql_pattern",
            kind = ?kind,
            len = text.chars().count(),
            "sql-shaped input dropped"
        );
        return String::new();
    }

    let clean = match kind {
        InputKind::Message => clamp_chars(&clean, MESSAGE_MAX_CHARS),
        InputKind::Search => clamp_chars(&filter_search_chars(&clean), SEARCH_MAX_CHARS),
        InputKind::UserData => clean,
    };

    clean.trim().to_string()
}

/// Strip script blocks, malicious patterns, and HTML tags until the text
/// stops changing. One pass is not enough: removing a match can splice
/// its neighbors into a fresh match.
fn strip_malicious(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut next = SCRIPT_BLOCK.replace_all(&current, "").into_owned();
        for re in MALICIOUS_PATTERNS.iter() {
            next = re.replace_all(&next, "").into_owned();
        }
        next = HTML_TAG.replace_all(&next, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Keep word characters, whitespace, and CJK text; drop the rest.
fn filter_search_chars(text: &str) -> String {
    text.chars()
        .filter(|c| {
            c.is_alphanumeric()
                || c.is_whitespace()
                || matches!(c, '_' | '-' | 'ー' | '々' | '・')
        })
        .collect()
}

fn clamp_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_tag_stripped_with_payload() {
        let out = sanitize("<script>alert(1)</script>助成金", InputKind::Message);
        assert_eq!(out, "助成金");
    }

    #[test]
    fn test_event_handler_and_uri_schemes_stripped() {
        let out = sanitize(
            "<img src=x onerror=alert(1)> javascript:void(0) 補助金",
            InputKind::Message,
        );
        assert!(!out.contains("onerror"));
        assert!(!out.to_lowercase().contains("javascript:"));
        assert!(out.contains("補助金"));
    }

    #[test]
    fn test_sql_pattern_empties_whole_string() {
        let out = sanitize("' OR 1=1 -- 助成金", InputKind::Search);
        assert_eq!(out, "");

        let out = sanitize("x; DROP TABLE grants", InputKind::UserData);
        assert_eq!(out, "");
    }

    #[test]
    fn test_sql_pattern_hidden_behind_markup_still_dropped() {
        // The tags interrupt the tautology, so only the stripped text
        // reveals it.
        let out = sanitize("' OR<script></script> 1=1", InputKind::Message);
        assert_eq!(out, "");

        let out = sanitize("' OR <b>1</b>=1", InputKind::Search);
        assert_eq!(out, "");
    }

    #[test]
    fn test_spliced_scheme_removed_in_one_call() {
        // Removing the inner match splices the outer halves into a second
        // "javascript:", which the fixpoint loop also removes.
        let out = sanitize("javajavascript:script:alert 助成金", InputKind::Message);
        assert_eq!(out, "alert 助成金");
        assert_eq!(sanitize(&out, InputKind::Message), out);
    }

    #[test]
    fn test_plain_japanese_untouched() {
        let msg = "創業支援の助成金を探しています";
        assert_eq!(sanitize(msg, InputKind::Message), msg);
        assert_eq!(sanitize(msg, InputKind::Search), msg);
    }

    #[test]
    fn test_search_whitelist_drops_symbols() {
        let out = sanitize("IT導入!@#$%", InputKind::Search);
        assert_eq!(out, "IT導入");
    }

    #[test]
    fn test_message_clamped_to_2000_chars() {
        let long: String = "あ".repeat(3000);
        let out = sanitize(&long, InputKind::Message);
        assert_eq!(out.chars().count(), 2000);
    }

    #[test]
    fn test_search_clamped_to_500_chars() {
        let long: String = "a".repeat(800);
        let out = sanitize(&long, InputKind::Search);
        assert_eq!(out.chars().count(), 500);
    }

    #[test]
    fn test_idempotent_for_all_kinds() {
        let inputs = [
            "<script>alert(1)</script>助成金",
            "  padded   text  ",
            "IT導入!@# <b>bold</b>",
            "' OR 1=1",
            "' OR<script></script> 1=1",
            "javajavascript:script:alert 助成金",
            "onload= javascript: eval(x)",
            &"あ".repeat(2500),
        ];
        for kind in [InputKind::Message, InputKind::Search, InputKind::UserData] {
            for input in &inputs {
                let once = sanitize(input, kind);
                assert_eq!(sanitize(&once, kind), once, "kind {:?} input {:?}", kind, input);
            }
        }
    }
}
