//! HTTP server for insightd.

use crate::nonce::NonceStore;
use crate::routes;
use anyhow::Result;
use axum::Router;
use gi_common::consult::ConsultationEngine;
use gi_common::content::ContentStore;
use gi_common::conversation::InMemoryConversationStore;
use gi_common::provider::{AiProvider, HttpProvider};
use gi_common::safety::{BreakerRegistry, RateLimiter};
use gi_common::search::SearchEngine;
use gi_common::Settings;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers. Every service is constructed
/// here and injected; nothing is a process-wide singleton.
pub struct AppState {
    pub consult: ConsultationEngine,
    pub search: SearchEngine,
    pub nonces: NonceStore,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: &Settings, content: Arc<dyn ContentStore>) -> Result<Self> {
        let provider: Option<Arc<dyn AiProvider>> = if settings.provider.is_enabled() {
            info!(
                kind = settings.provider.kind.as_str(),
                model = %settings.provider.model,
                "external AI provider enabled"
            );
            Some(Arc::new(HttpProvider::new(
                settings.provider.endpoint.clone(),
                settings.provider.api_key.clone().unwrap_or_default(),
                settings.provider.model.clone(),
                settings.provider.max_tokens,
                settings.provider.temperature,
                Duration::from_secs(settings.provider.timeout_secs),
            )?))
        } else {
            info!("external AI provider disabled, rule-based replies only");
            None
        };

        let breakers = Arc::new(BreakerRegistry::with_defaults());
        let limiter = Arc::new(RateLimiter::new());
        let conversations = Arc::new(InMemoryConversationStore::new());

        Ok(Self {
            consult: ConsultationEngine::new(
                settings,
                provider,
                content.clone(),
                conversations,
                breakers.clone(),
                limiter.clone(),
            ),
            search: SearchEngine::new(settings, content, breakers, limiter),
            nonces: NonceStore::new(Duration::from_secs(settings.nonce_ttl_secs)),
            start_time: Instant::now(),
        })
    }
}

/// Build the router. Split out so tests can drive it without a socket.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::consult_routes())
        .merge(routes::search_routes())
        .merge(routes::meta_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until shutdown.
pub async fn run(settings: &Settings, state: AppState) -> Result<()> {
    let state = Arc::new(state);
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!("  Listening on http://{}", settings.bind_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
