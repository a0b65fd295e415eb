//! Consultation engine.
//!
//! Per-request flow: validate → rate limit → analyze (intent + related
//! grants) → external AI or rule-based synthesis → reply. Validation and
//! rate-limit rejections surface as errors for the transport layer to
//! wrap; every later failure degrades into a canned reply instead, so a
//! caller that gets past the gate always receives a complete answer.

use crate::cache::{cache_key, ResponseCache};
use crate::content::{ContentStore, SearchFilter};
use crate::conversation::{new_conversation_id, ConversationStore, Turn};
use crate::error::{GiError, GiResult};
use crate::identity::ClientIdentity;
use crate::intent::{self, Intent};
use crate::provider::{decode_reply, AiProvider, ProviderReply};
use crate::relevance::{self, RankedGrant};
use crate::safety::{BreakerRegistry, RateLimiter, RetryPolicy};
use crate::sanitize::{sanitize, InputKind};
use crate::settings::Settings;
use crate::templates::{self, FailureKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const MIN_MESSAGE_CHARS: usize = 2;
const MAX_MESSAGE_CHARS: usize = 1000;
const RELATED_GRANT_LIMIT: usize = 5;

/// One incoming consultation turn.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsultationRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Free-form context: business_type, industry, urgency, ...
    #[serde(default)]
    pub context: HashMap<String, String>,
}

/// The structured reply returned for every accepted request.
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationReply {
    pub message: String,
    pub suggestions: Vec<String>,
    pub related_grants: Vec<RankedGrant>,
    pub conversation_id: String,
    pub confidence: f32,
    pub follow_up_questions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Reply fields worth caching (conversation id and timestamp are
/// per-request).
#[derive(Debug, Clone)]
struct CachedReply {
    message: String,
    suggestions: Vec<String>,
    related_grants: Vec<RankedGrant>,
    confidence: f32,
    follow_up_questions: Vec<String>,
}

/// Consultation orchestrator. All collaborators are injected; the engine
/// holds no global state.
pub struct ConsultationEngine {
    provider: Option<Arc<dyn AiProvider>>,
    content: Arc<dyn ContentStore>,
    conversations: Arc<dyn ConversationStore>,
    breakers: Arc<BreakerRegistry>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    cache: ResponseCache<CachedReply>,
    rate_limit: usize,
    rate_window: Duration,
}

impl ConsultationEngine {
    pub fn new(
        settings: &Settings,
        provider: Option<Arc<dyn AiProvider>>,
        content: Arc<dyn ContentStore>,
        conversations: Arc<dyn ConversationStore>,
        breakers: Arc<BreakerRegistry>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            provider,
            content,
            conversations,
            breakers,
            limiter,
            retry: RetryPolicy::default(),
            cache: ResponseCache::new(
                settings.cache_capacity,
                Duration::from_secs(settings.cache_ttl_secs),
            ),
            rate_limit: settings.rate_limits.consult_limit,
            rate_window: Duration::from_secs(settings.rate_limits.consult_window_secs),
        }
    }

    #[cfg(test)]
    fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Handle one consultation request.
    ///
    /// Errors are only `Validation` or `Security`; once past those gates
    /// the reply is guaranteed non-empty with confidence in [0, 1].
    pub async fn consult(
        &self,
        identity: &ClientIdentity,
        request: ConsultationRequest,
    ) -> GiResult<ConsultationReply> {
        let message = sanitize(&request.message, InputKind::Message);
        validate_message(&message)?;

        if !self
            .limiter
            .allow(identity.as_str(), "consult", self.rate_limit, self.rate_window)
            .is_allowed()
        {
            return Err(GiError::security(format!(
                "rate limit exceeded for {}",
                identity.as_str()
            )));
        }

        let conversation_id = request
            .conversation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_conversation_id);
        self.conversations
            .append(&conversation_id, Turn::user(&message));

        let key = cache_key(&message, &request.context);
        if let Some(cached) = self.cache.get(&key) {
            debug!(%conversation_id, "cache hit");
            let reply = self.finish(conversation_id, cached);
            return Ok(reply);
        }

        let intent_score = intent::classify(&message);
        info!(
            intent = intent_score.primary.as_str(),
            confidence = intent_score.confidence,
            %conversation_id,
            "message classified"
        );

        let related_grants = self.related_grants(&message);
        let synthesized = self
            .synthesize(&message, intent_score.primary, &request.context)
            .await;

        let cached = CachedReply {
            message: synthesized.text,
            suggestions: synthesized.suggestions,
            related_grants,
            confidence: synthesized.confidence.clamp(0.0, 1.0),
            follow_up_questions: synthesized.follow_up_questions,
        };
        self.cache.put(key, cached.clone());

        Ok(self.finish(conversation_id, cached))
    }

    /// External AI if configured, templates when it is not; a failing
    /// external path degrades to the canned fallback for the failure kind.
    /// This step cannot fail.
    async fn synthesize(
        &self,
        message: &str,
        primary: Intent,
        context: &HashMap<String, String>,
    ) -> ProviderReply {
        if let Some(provider) = &self.provider {
            let system_prompt = build_system_prompt(context);
            let user_prompt = build_user_prompt(message);
            let outcome = self
                .retry
                .run(&self.breakers, "ai_api", || {
                    provider.complete(&system_prompt, &user_prompt)
                })
                .await;
            match outcome {
                Ok(raw) => return decode_reply(&raw),
                Err(err) => {
                    error!(error = %err, "external AI path failed, serving degraded reply");
                    let kind = match err {
                        GiError::Dependency { .. } | GiError::CircuitOpen(_) => {
                            FailureKind::ProviderUnavailable
                        }
                        _ => FailureKind::Internal,
                    };
                    return reply_from(templates::fallback_for(kind));
                }
            }
        }

        self.rule_based(primary, context)
    }

    fn rule_based(&self, primary: Intent, context: &HashMap<String, String>) -> ProviderReply {
        let mut template = templates::response_for(primary);
        templates::augment_with_context(&mut template, context);
        if template.text.is_empty() {
            // Unreachable with the fixed tables, but the fallback floor
            // must hold for any future template source.
            template = templates::fallback_for(FailureKind::Internal);
        }
        reply_from(template)
    }

    /// Best-effort related-grant lookup. A failing content store costs the
    /// reply its grant list, nothing more.
    fn related_grants(&self, message: &str) -> Vec<RankedGrant> {
        if !self.breakers.can_attempt("content_store") {
            debug!("content store circuit open, skipping related grants");
            return Vec::new();
        }

        let terms = relevance::extract_terms(message);
        if terms.is_empty() {
            return Vec::new();
        }
        let filters = SearchFilter::default();
        match self.content.search(&terms, &filters) {
            Ok(records) => {
                self.breakers.record_success("content_store");
                let mut ranked = relevance::rank(records, &terms, &filters);
                ranked.retain(|r| r.relevance_score > 0);
                ranked.truncate(RELATED_GRANT_LIMIT);
                ranked
            }
            Err(err) => {
                self.breakers.record_failure("content_store");
                error!(error = %err, "related grant lookup failed");
                Vec::new()
            }
        }
    }

    fn finish(&self, conversation_id: String, cached: CachedReply) -> ConsultationReply {
        self.conversations
            .append(&conversation_id, Turn::system(&cached.message));
        ConsultationReply {
            message: cached.message,
            suggestions: cached.suggestions,
            related_grants: cached.related_grants,
            conversation_id,
            confidence: cached.confidence,
            follow_up_questions: cached.follow_up_questions,
            timestamp: Utc::now(),
        }
    }
}

fn reply_from(template: templates::TemplateReply) -> ProviderReply {
    ProviderReply {
        text: template.text,
        suggestions: template.suggestions,
        confidence: template.confidence,
        follow_up_questions: template.follow_up_questions,
    }
}

fn validate_message(message: &str) -> GiResult<()> {
    let chars = message.chars().count();
    if chars == 0 {
        return Err(GiError::validation("メッセージを入力してください。"));
    }
    if chars < MIN_MESSAGE_CHARS {
        return Err(GiError::validation(
            "メッセージが短すぎます。もう少し詳しくご記入ください。",
        ));
    }
    if chars > MAX_MESSAGE_CHARS {
        return Err(GiError::validation(
            "メッセージが長すぎます。1000文字以内でご記入ください。",
        ));
    }
    Ok(())
}

/// Fixed persona plus whatever caller context is available.
fn build_system_prompt(context: &HashMap<String, String>) -> String {
    let mut prompt = String::from(
        "あなたは日本の助成金・補助金の専門アドバイザーです。\
         中小企業や個人事業主に対して、正確で実務的な案内を丁寧な日本語で行ってください。\
         不確かな情報は断定せず、公募要領の確認を促してください。",
    );
    if let Some(business_type) = context.get("business_type") {
        prompt.push_str(&format!("相談者の業種: {}。", business_type));
    }
    if let Some(industry) = context.get("industry") {
        prompt.push_str(&format!("相談者の事業分野: {}。", industry));
    }
    if context.get("urgency").map(String::as_str) == Some("high") {
        prompt.push_str("相談者は急いでいます。締切の近い選択肢を優先してください。");
    }
    prompt
}

/// User prompt with the reply-format contract the decoder expects.
fn build_user_prompt(message: &str) -> String {
    format!(
        "{}\n\n回答は次のJSON形式で返してください: \
         {{\"text\": \"回答本文\", \"suggestions\": [\"次の行動\"], \
         \"confidence\": 0.0から1.0, \"follow_up_questions\": [\"確認したいこと\"]}}",
        message
    )
}
