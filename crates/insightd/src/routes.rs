//! API routes for insightd.
//!
//! Every endpoint answers with the `{success, data}` envelope and HTTP 200;
//! failures carry a user-facing string in `data`, never a raw error. The
//! nonce is checked before any other processing.

use crate::server::AppState;
use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use gi_common::consult::ConsultationRequest;
use gi_common::identity::{resolve_client_ip, ClientIdentity};
use gi_common::search::SearchRequest;
use gi_common::templates::{fallback_for, FailureKind};
use gi_common::GiError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

type AppStateArc = Arc<AppState>;

/// The JSON envelope wrapping every reply.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub data: Value,
}

impl Envelope {
    fn ok(data: impl Serialize) -> Json<Self> {
        Json(Self {
            success: true,
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        })
    }

    fn fail(err: &GiError) -> Json<Self> {
        Self::fail_text(err.user_message())
    }

    fn fail_text(text: String) -> Json<Self> {
        Json(Self {
            success: false,
            data: Value::String(text),
        })
    }
}

// ============================================================================
// Consultation
// ============================================================================

#[derive(Debug, Deserialize)]
struct ConsultBody {
    nonce: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(flatten)]
    request: ConsultationRequest,
}

pub fn consult_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/consult", post(consult))
}

async fn consult(
    State(state): State<AppStateArc>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<ConsultBody>,
) -> Json<Envelope> {
    if !state.nonces.validate(&body.nonce) {
        warn!(incident = "invalid_nonce", action = "consult", "request rejected");
        return Envelope::fail(&GiError::security("invalid or expired nonce"));
    }

    let identity = caller_identity(&headers, peer, body.user_id.as_deref());
    match state.consult.consult(&identity, body.request).await {
        Ok(reply) => Envelope::ok(reply),
        Err(err) => Envelope::fail(&err),
    }
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchBody {
    nonce: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(flatten)]
    request: SearchRequest,
}

pub fn search_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/search", post(search))
}

async fn search(
    State(state): State<AppStateArc>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<SearchBody>,
) -> Json<Envelope> {
    if !state.nonces.validate(&body.nonce) {
        warn!(incident = "invalid_nonce", action = "search", "request rejected");
        return Envelope::fail(&GiError::security("invalid or expired nonce"));
    }

    let identity = caller_identity(&headers, peer, body.user_id.as_deref());
    match state.search.search(&identity, body.request).await {
        Ok(results) => Envelope::ok(results),
        // Store down after retries: the degraded canned reply, which names
        // the outage, beats the generic error line.
        Err(err) if err.is_retryable() => {
            Envelope::fail_text(fallback_for(FailureKind::ContentStoreUnavailable).text)
        }
        Err(err) => Envelope::fail(&err),
    }
}

// ============================================================================
// Nonce + health
// ============================================================================

pub fn meta_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/nonce", get(issue_nonce))
        .route("/v1/health", get(health))
}

async fn issue_nonce(State(state): State<AppStateArc>) -> Json<Envelope> {
    let nonce = state.nonces.issue();
    Envelope::ok(json!({
        "nonce": nonce,
        "expires_in_secs": state.nonces.ttl().as_secs(),
    }))
}

async fn health(State(state): State<AppStateArc>) -> Json<Envelope> {
    Envelope::ok(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

fn caller_identity(headers: &HeaderMap, peer: SocketAddr, user_id: Option<&str>) -> ClientIdentity {
    if let Some(user_id) = user_id {
        if !user_id.trim().is_empty() {
            return ClientIdentity::user(user_id.trim());
        }
    }
    let ip = resolve_client_ip(
        |name| headers.get(name).and_then(|v| v.to_str().ok()),
        peer.ip(),
    );
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    ClientIdentity::anonymous(ip, user_agent)
}
