//! Error taxonomy for the consultation pipeline.
//!
//! Four families with different handling policies:
//! - Validation: rejected immediately, user-readable message, no retry, no log
//! - Security: rejected, logged as an incident
//! - Dependency: retried, then routed to the fallback provider
//! - Internal: caught at the engine boundary, logged, routed to fallback
//!
//! Nothing in this taxonomy ever reaches an HTTP caller as a raw error;
//! the daemon maps every variant into the `{success, data}` envelope.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GiError {
    /// Malformed or out-of-bounds input. The message is user-facing.
    #[error("{0}")]
    Validation(String),

    /// Rejected by the security layer (nonce, rate limit, blocked identity).
    #[error("security rejection: {reason}")]
    Security { reason: String },

    /// A guarded dependency (AI provider, content store) failed or timed out.
    #[error("dependency '{dependency}' failed: {reason}")]
    Dependency { dependency: String, reason: String },

    /// Dependency call refused because its circuit breaker is open.
    #[error("circuit '{0}' is open")]
    CircuitOpen(String),

    /// Unexpected failure inside scoring or synthesis.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn security(reason: impl Into<String>) -> Self {
        Self::Security {
            reason: reason.into(),
        }
    }

    pub fn dependency(dependency: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Dependency {
            dependency: dependency.into(),
            reason: reason.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Message safe to show to an end user.
    ///
    /// Validation errors carry their own wording; everything else gets a
    /// generic line so dependency details never leak into replies.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Security { .. } => {
                "リクエストが多すぎます。しばらく待ってから再度お試しください。".to_string()
            }
            Self::Dependency { .. } | Self::CircuitOpen(_) | Self::Internal(_) => {
                "一時的に処理できませんでした。しばらく待ってから再度お試しください。".to_string()
            }
        }
    }

    /// Whether the retry policy may re-attempt after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Dependency { .. } | Self::CircuitOpen(_))
    }
}

pub type GiResult<T> = Result<T, GiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_user_facing() {
        let err = GiError::validation("メッセージを入力してください。");
        assert_eq!(err.user_message(), "メッセージを入力してください。");
    }

    #[test]
    fn test_dependency_details_do_not_leak() {
        let err = GiError::dependency("ai_api", "connection refused 10.0.0.5:443");
        assert!(!err.user_message().contains("10.0.0.5"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(GiError::dependency("ai_api", "timeout").is_retryable());
        assert!(GiError::CircuitOpen("ai_api".into()).is_retryable());
        assert!(!GiError::validation("too short").is_retryable());
        assert!(!GiError::security("rate limit").is_retryable());
        assert!(!GiError::internal("bug").is_retryable());
    }
}
