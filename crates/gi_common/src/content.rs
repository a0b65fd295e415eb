//! Read-only content store interface.
//!
//! The daemon consumes grant records through this narrow seam; the CMS that
//! owns them stays external. An in-memory implementation backs tests and
//! the standalone daemon, loadable from a JSON seed file.

use crate::error::{GiError, GiResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::RwLock;

/// Grant metadata surfaced in search results and replies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantMeta {
    /// Maximum amount in 万円.
    #[serde(default)]
    pub max_amount: Option<u64>,
    /// Application deadline, ISO date string.
    #[serde(default)]
    pub deadline: Option<String>,
    /// Historical adoption rate in percent.
    #[serde(default)]
    pub success_rate: Option<u8>,
    /// Difficulty label: easy / normal / hard.
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub target_business_type: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub prefectures: Vec<String>,
}

/// One grant record. Never mutated by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantRecord {
    pub id: u64,
    pub title: String,
    pub excerpt: String,
    pub permalink: String,
    #[serde(default)]
    pub meta: GrantMeta,
}

/// Caller-supplied search filters. Always run through `clamped` before use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub prefecture: Option<String>,
    #[serde(default)]
    pub amount_min: Option<u64>,
    #[serde(default)]
    pub amount_max: Option<u64>,
}

impl SearchFilter {
    /// Normalize: drop empty strings, swap an inverted amount range.
    pub fn clamped(mut self) -> Self {
        if self.category.as_deref().map(str::trim).unwrap_or("").is_empty() {
            self.category = None;
        }
        if self.prefecture.as_deref().map(str::trim).unwrap_or("").is_empty() {
            self.prefecture = None;
        }
        if let (Some(min), Some(max)) = (self.amount_min, self.amount_max) {
            if min > max {
                self.amount_min = Some(max);
                self.amount_max = Some(min);
            }
        }
        self
    }

    fn matches(&self, record: &GrantRecord) -> bool {
        if let Some(ref category) = self.category {
            if !record.meta.categories.iter().any(|c| c == category) {
                return false;
            }
        }
        if let Some(ref prefecture) = self.prefecture {
            if !record.meta.prefectures.iter().any(|p| p == prefecture) {
                return false;
            }
        }
        if let Some(min) = self.amount_min {
            if record.meta.max_amount.unwrap_or(0) < min {
                return false;
            }
        }
        if let Some(max) = self.amount_max {
            if record.meta.max_amount.unwrap_or(u64::MAX) > max {
                return false;
            }
        }
        true
    }
}

/// Read interface onto the grant corpus. Treated as a volatile dependency
/// and guarded by the `content_store` circuit breaker at call sites.
pub trait ContentStore: Send + Sync {
    /// Free-text search: a record matches when any term appears in its
    /// text fields. Results keep corpus order.
    fn search(&self, terms: &[String], filters: &SearchFilter) -> GiResult<Vec<GrantRecord>>;

    /// Single meta value lookup by key.
    fn get_meta(&self, id: u64, key: &str) -> GiResult<Option<String>>;
}

/// In-memory store over a fixed record set.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    records: RwLock<Vec<GrantRecord>>,
}

impl InMemoryContentStore {
    pub fn new(records: Vec<GrantRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Load records from a JSON array file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let records: Vec<GrantRecord> = serde_json::from_str(&raw)?;
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn record_matches_terms(record: &GrantRecord, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let haystack = format!(
        "{} {} {} {} {}",
        record.title,
        record.excerpt,
        record.meta.categories.join(" "),
        record.meta.target_business_type.as_deref().unwrap_or(""),
        record.meta.difficulty.as_deref().unwrap_or(""),
    )
    .to_lowercase();
    terms
        .iter()
        .any(|term| haystack.contains(&term.to_lowercase()))
}

impl ContentStore for InMemoryContentStore {
    fn search(&self, terms: &[String], filters: &SearchFilter) -> GiResult<Vec<GrantRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| GiError::dependency("content_store", "store lock poisoned"))?;
        Ok(records
            .iter()
            .filter(|r| record_matches_terms(r, terms) && filters.matches(r))
            .cloned()
            .collect())
    }

    fn get_meta(&self, id: u64, key: &str) -> GiResult<Option<String>> {
        let records = self
            .records
            .read()
            .map_err(|_| GiError::dependency("content_store", "store lock poisoned"))?;
        let record = match records.iter().find(|r| r.id == id) {
            Some(r) => r,
            None => return Ok(None),
        };
        let value = match key {
            "max_amount" => record.meta.max_amount.map(|v| v.to_string()),
            "deadline" => record.meta.deadline.clone(),
            "success_rate" => record.meta.success_rate.map(|v| v.to_string()),
            "difficulty" => record.meta.difficulty.clone(),
            "target_business_type" => record.meta.target_business_type.clone(),
            _ => None,
        };
        Ok(value)
    }
}
