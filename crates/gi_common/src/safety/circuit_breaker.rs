//! Circuit breakers for volatile dependencies.
//!
//! closed → open once failures reach the threshold; open → half-open after
//! the recovery timeout; half-open → closed after enough consecutive
//! successes, and any half-open failure reopens immediately. While closed,
//! each success walks the failure count back toward zero instead of
//! resetting it, so a flapping dependency still trips the breaker.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are rejected without touching the dependency.
    Open,
    /// Probing whether the dependency has recovered.
    HalfOpen,
}

/// Thresholds for one breaker.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub success_threshold: u32,
}

impl BreakerConfig {
    /// External AI provider: slow to recover, tolerate more failures.
    pub fn ai_api() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 3,
        }
    }

    /// Content store: local-ish, expect fast recovery.
    pub fn content_store() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
        }
    }

    /// Whether a call may be attempted right now. Moves an expired open
    /// breaker to half-open as a side effect.
    pub fn can_attempt(&mut self) -> bool {
        self.can_attempt_at(Instant::now())
    }

    fn can_attempt_at(&mut self, now: Instant) -> bool {
        if self.state == CircuitState::Open {
            let elapsed = self
                .last_failure
                .map(|t| now.duration_since(t))
                .unwrap_or(Duration::ZERO);
            if elapsed >= self.config.recovery_timeout {
                info!(breaker = %self.name, "recovery timeout elapsed, probing half-open");
                self.state = CircuitState::HalfOpen;
                self.success_count = 0;
            }
        }
        self.state != CircuitState::Open
    }

    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count = self.failure_count.saturating_sub(1);
            }
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.config.success_threshold {
                    info!(breaker = %self.name, "dependency recovered, closing circuit");
                    self.state = CircuitState::Closed;
                    self.failure_count = 0;
                    self.success_count = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&mut self) {
        self.record_failure_at(Instant::now());
    }

    fn record_failure_at(&mut self, now: Instant) {
        self.last_failure = Some(now);
        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.config.failure_threshold {
                    warn!(
                        incident = "circuit_open",
                        breaker = %self.name,
                        failures = self.failure_count,
                        "failure threshold reached, opening circuit"
                    );
                    self.open();
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    incident = "circuit_reopen",
                    breaker = %self.name,
                    "probe failed, reopening circuit"
                );
                self.open();
            }
            CircuitState::Open => {}
        }
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.failure_count = 0;
        self.success_count = 0;
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }
}

/// Named breakers shared across requests.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Registry with the two standard dependencies pre-registered.
    pub fn with_defaults() -> Self {
        let registry = Self::default();
        registry.register("ai_api", BreakerConfig::ai_api());
        registry.register("content_store", BreakerConfig::content_store());
        registry
    }

    pub fn register(&self, name: &str, config: BreakerConfig) {
        let mut breakers = self.breakers.lock().unwrap();
        breakers.insert(name.to_string(), CircuitBreaker::new(name, config));
    }

    /// Whether the named dependency may be called. Unregistered names are
    /// always allowed.
    pub fn can_attempt(&self, name: &str) -> bool {
        let mut breakers = self.breakers.lock().unwrap();
        breakers.get_mut(name).map(|b| b.can_attempt()).unwrap_or(true)
    }

    pub fn record_success(&self, name: &str) {
        let mut breakers = self.breakers.lock().unwrap();
        if let Some(b) = breakers.get_mut(name) {
            b.record_success();
        }
    }

    pub fn record_failure(&self, name: &str) {
        let mut breakers = self.breakers.lock().unwrap();
        if let Some(b) = breakers.get_mut(name) {
            b.record_failure();
        }
    }

    pub fn state(&self, name: &str) -> Option<CircuitState> {
        let breakers = self.breakers.lock().unwrap();
        breakers.get(name).map(|b| b.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_millis(10),
            success_threshold: 2,
        }
    }

    #[test]
    fn test_opens_at_failure_threshold() {
        let mut cb = CircuitBreaker::new("dep", fast_config());
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_attempt());
    }

    #[test]
    fn test_success_decrements_failure_count_while_closed() {
        let mut cb = CircuitBreaker::new("dep", fast_config());
        cb.record_failure();
        cb.record_failure();
        cb.record_success(); // back to 1
        cb.record_failure(); // 2, still under threshold
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_recovery_probe_and_close() {
        let now = Instant::now();
        let mut cb = CircuitBreaker::new("dep", fast_config());
        for _ in 0..3 {
            cb.record_failure_at(now);
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_attempt_at(now + Duration::from_millis(5)));

        assert!(cb.can_attempt_at(now + Duration::from_millis(11)));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let now = Instant::now();
        let mut cb = CircuitBreaker::new("dep", fast_config());
        for _ in 0..3 {
            cb.record_failure_at(now);
        }
        cb.can_attempt_at(now + Duration::from_millis(11));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_failure_at(now + Duration::from_millis(12));
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_attempt_at(now + Duration::from_millis(13)));
    }

    #[test]
    fn test_registry_defaults() {
        let registry = BreakerRegistry::with_defaults();
        assert_eq!(registry.state("ai_api"), Some(CircuitState::Closed));
        assert_eq!(registry.state("content_store"), Some(CircuitState::Closed));
        assert_eq!(registry.state("unknown"), None);
        assert!(registry.can_attempt("unknown"));

        for _ in 0..5 {
            registry.record_failure("ai_api");
        }
        assert_eq!(registry.state("ai_api"), Some(CircuitState::Open));
        assert!(!registry.can_attempt("ai_api"));
        // Other breakers unaffected.
        assert!(registry.can_attempt("content_store"));
    }
}
