//! Axum front door for the inbound-email webhook.
//!
//! Thin by design: it parses the payload, walks the pipeline stages in
//! order, and maps typed outcomes to transport status codes. Handled
//! content and analysis failures acknowledge the webhook with 200 after an
//! error notice is attempted; only a malformed payload (400) or a missing
//! default persona (500) surface as non-2xx.

mod handlers;

use crate::analysis::{AnalysisClient, RequestConfig};
use crate::config::Config;
use crate::delivery::DeliveryClient;
use crate::persona::{PersonaCache, PersonaResolver, SqlitePersonaStore};
use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use handlers::{handle_health, handle_inbound};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Whole-request deadline: must cover one analysis call plus the bounded
/// delivery retry path.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub resolver: Arc<PersonaResolver<SqlitePersonaStore>>,
    pub analysis: Arc<AnalysisClient>,
    pub delivery: Arc<DeliveryClient>,
    /// Client for pulling attachment bytes off the ingestion store.
    pub download: reqwest::Client,
}

impl AppState {
    pub fn request_config(&self) -> RequestConfig {
        RequestConfig {
            model: self.config.analysis.model.clone(),
            max_tokens: self.config.analysis.max_tokens,
            temperature: self.config.analysis.temperature,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.gateway.body_limit_bytes;
    Router::new()
        .route("/health", get(handle_health))
        .route("/webhooks/inbound", post(handle_inbound))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
        .with_state(state)
}

/// Wire up every pipeline component and serve until ctrl-c.
pub async fn serve(config: Config) -> Result<()> {
    let config = Arc::new(config);

    let store = SqlitePersonaStore::open(
        Path::new(&config.persona.database_path),
        &config.persona.default_persona_id,
    )
    .await
    .context("opening persona store")?;

    let cache = Arc::new(PersonaCache::new(Duration::from_secs(
        config.persona.cache_ttl_secs,
    )));
    if config.persona.sweep_interval_secs > 0 {
        let _sweeper =
            cache.spawn_sweeper(Duration::from_secs(config.persona.sweep_interval_secs));
    }

    let resolver = Arc::new(PersonaResolver::new(
        store,
        cache,
        config.persona.default_persona_id.clone(),
        Duration::from_millis(config.persona.store_timeout_ms),
    ));

    let analysis = Arc::new(AnalysisClient::new(
        config.analysis.base_url.clone(),
        config.analysis.api_key.as_deref(),
    ));
    let delivery = Arc::new(DeliveryClient::new(
        config.delivery.base_url.clone(),
        config.delivery.api_key.as_deref(),
        Duration::from_millis(config.delivery.retry_delay_ms),
    ));

    let state = AppState {
        config: Arc::clone(&config),
        resolver,
        analysis,
        delivery,
        download: crate::http::build_http_client(),
    };

    let addr: SocketAddr = config
        .gateway
        .bind
        .parse()
        .with_context(|| format!("invalid gateway.bind address {}", config.gateway.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "mailsage gateway listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("gateway server error")
}
