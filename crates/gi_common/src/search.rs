//! Grant search engine.
//!
//! Sanitize → validate → rate limit → synonym expansion → breaker-guarded
//! content-store search → relevance ranking → pagination. Store failures
//! surface as dependency errors after retries; the transport layer wraps
//! them in the failure envelope.

use crate::content::{ContentStore, SearchFilter};
use crate::error::{GiError, GiResult};
use crate::identity::ClientIdentity;
use crate::relevance::{self, RankedGrant};
use crate::safety::{BreakerRegistry, RateLimiter, RetryPolicy};
use crate::sanitize::{sanitize, InputKind};
use crate::settings::Settings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const MIN_QUERY_CHARS: usize = 2;
const MAX_QUERY_CHARS: usize = 200;
const DEFAULT_PER_PAGE: usize = 10;
const MAX_PER_PAGE: usize = 50;
const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilter,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub results: Vec<RankedGrant>,
    /// The query after sanitization, shown back to the user.
    pub enhanced_query: String,
    pub insights: String,
    pub total_found: usize,
    pub search_suggestions: Vec<String>,
    pub page: usize,
    pub per_page: usize,
    pub has_more: bool,
    pub timestamp: DateTime<Utc>,
}

pub struct SearchEngine {
    content: Arc<dyn ContentStore>,
    breakers: Arc<BreakerRegistry>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    rate_limit: usize,
    rate_window: Duration,
}

impl SearchEngine {
    pub fn new(
        settings: &Settings,
        content: Arc<dyn ContentStore>,
        breakers: Arc<BreakerRegistry>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            content,
            breakers,
            limiter,
            retry: RetryPolicy::default(),
            rate_limit: settings.rate_limits.search_limit,
            rate_window: Duration::from_secs(settings.rate_limits.search_window_secs),
        }
    }

    #[cfg(test)]
    fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn search(
        &self,
        identity: &ClientIdentity,
        request: SearchRequest,
    ) -> GiResult<SearchResults> {
        let query = sanitize(&request.query, InputKind::Search);
        validate_query(&query)?;

        if !self
            .limiter
            .allow(identity.as_str(), "search", self.rate_limit, self.rate_window)
            .is_allowed()
        {
            return Err(GiError::security(format!(
                "search rate limit exceeded for {}",
                identity.as_str()
            )));
        }

        let filters = request.filters.clamped();
        let terms = relevance::expand_query(&query);
        info!(%query, expanded = terms.len(), "running grant search");

        let records = self
            .retry
            .run(&self.breakers, "content_store", || {
                let outcome = self.content.search(&terms, &filters);
                async move { outcome }
            })
            .await?;

        let ranked = relevance::rank(records, &terms, &filters);
        let total_found = ranked.len();

        let page = request.page.unwrap_or(1).max(1);
        let per_page = request
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let start = (page - 1).saturating_mul(per_page);
        let has_more = total_found > start.saturating_add(per_page);
        let results: Vec<RankedGrant> = ranked.into_iter().skip(start).take(per_page).collect();

        let insights = build_insights(&query, total_found, &results);
        let search_suggestions = terms
            .iter()
            .skip(1) // the query itself
            .take(MAX_SUGGESTIONS)
            .cloned()
            .collect();

        Ok(SearchResults {
            results,
            enhanced_query: query,
            insights,
            total_found,
            search_suggestions,
            page,
            per_page,
            has_more,
            timestamp: Utc::now(),
        })
    }
}

fn validate_query(query: &str) -> GiResult<()> {
    let chars = query.chars().count();
    if chars == 0 {
        return Err(GiError::validation("検索キーワードを入力してください。"));
    }
    if chars < MIN_QUERY_CHARS {
        return Err(GiError::validation(
            "検索キーワードが短すぎます。2文字以上で入力してください。",
        ));
    }
    if chars > MAX_QUERY_CHARS {
        return Err(GiError::validation(
            "検索キーワードが長すぎます。200文字以内で入力してください。",
        ));
    }
    Ok(())
}

fn build_insights(query: &str, total_found: usize, results: &[RankedGrant]) -> String {
    if total_found == 0 {
        return format!(
            "「{}」に一致する制度は見つかりませんでした。キーワードを変えてお試しください。",
            query
        );
    }
    let mut insights = format!("「{}」に関連する制度が{}件見つかりました。", query, total_found);
    if let Some(top) = results.first() {
        if let Some(category) = top.record.meta.categories.first() {
            insights.push_str(&format!("特に「{}」分野の制度が有力です。", category));
        }
    }
    insights
}
