//! Sliding-window rate limiter with a penalty box.
//!
//! One bucket per (action, identity). A bucket keeps only the request
//! instants inside the current window; reaching the limit blocks the
//! identity for twice the window, during which every call is rejected
//! without looking at the window at all.
//!
//! State is process-local behind a mutex. Limits are advisory, so a
//! single-process store is an explicit, acceptable choice here.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// Rejected; the identity is blocked until the penalty expires.
    Blocked,
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

#[derive(Debug, Default)]
struct Bucket {
    timestamps: Vec<Instant>,
    blocked_until: Option<Instant>,
}

/// Sliding-window limiter keyed by (action, identity).
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<(String, String), Bucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and record one request. Rejections are logged as security
    /// incidents with the request count that tripped the limit.
    pub fn allow(
        &self,
        identity: &str,
        action: &str,
        limit: usize,
        window: Duration,
    ) -> RateLimitDecision {
        self.allow_at(identity, action, limit, window, Instant::now())
    }

    fn allow_at(
        &self,
        identity: &str,
        action: &str,
        limit: usize,
        window: Duration,
        now: Instant,
    ) -> RateLimitDecision {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets
            .entry((action.to_string(), identity.to_string()))
            .or_default();

        if let Some(until) = bucket.blocked_until {
            if now < until {
                warn!(
                    incident = "rate_limit_blocked",
                    identity,
                    action,
                    "request rejected while identity is in the penalty box"
                );
                return RateLimitDecision::Blocked;
            }
            bucket.blocked_until = None;
            bucket.timestamps.clear();
        }

        bucket
            .timestamps
            .retain(|t| now.duration_since(*t) < window);

        if bucket.timestamps.len() >= limit {
            bucket.blocked_until = Some(now + 2 * window);
            warn!(
                incident = "rate_limit_exceeded",
                identity,
                action,
                count = bucket.timestamps.len(),
                limit,
                "limit reached, identity blocked for twice the window"
            );
            return RateLimitDecision::Blocked;
        }

        bucket.timestamps.push(now);
        RateLimitDecision::Allowed
    }

    /// Drop buckets idle longer than `max_age`. Call periodically.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        buckets.retain(|_, bucket| {
            let blocked = bucket
                .blocked_until
                .map(|until| now < until)
                .unwrap_or(false);
            let recent = bucket
                .timestamps
                .last()
                .map(|t| now.duration_since(*t) < max_age)
                .unwrap_or(false);
            blocked || recent
        });
    }

    /// Number of live buckets (for monitoring).
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }
}
