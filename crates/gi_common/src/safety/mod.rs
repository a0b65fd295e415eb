//! Safety layer.
//!
//! Protections against abuse and cascading failure:
//! - Sliding-window rate limiting with a penalty box
//! - Circuit breakers for volatile dependencies
//! - Retry policy with exponential backoff and jitter

pub mod circuit_breaker;
pub mod rate_limit;
pub mod retry;

pub use circuit_breaker::{BreakerConfig, BreakerRegistry, CircuitBreaker, CircuitState};
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use retry::RetryPolicy;
