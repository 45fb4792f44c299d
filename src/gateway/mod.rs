//! HTTP surface: WeChat Official Account callbacks, a direct AI endpoint and
//! a health probe.

pub mod ai;
pub mod official;

use crate::commands::CommandRegistry;
use crate::config::{Config, GatewayConfig};
use crate::processor::MessageProcessor;
use crate::providers::create_provider;
use crate::store::create_store;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Shared per-request state. Cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub processor: MessageProcessor,
    /// Official Account token; `None` when not configured.
    pub official_token: Option<Arc<str>>,
    pub verify_callbacks: bool,
}

impl AppState {
    pub fn new(config: &Config, processor: MessageProcessor) -> Self {
        let official_token = config
            .official
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Arc::from);
        Self {
            processor,
            official_token,
            verify_callbacks: config.official.verify_callbacks,
        }
    }
}

pub fn build_router(state: AppState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/api/official",
            get(official::handle_verify).post(official::handle_message),
        )
        .route("/api/ai", post(ai::handle_ai))
        .with_state(state)
        .layer(DefaultBodyLimit::max(gateway.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(gateway.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(gateway.request_timeout_secs.max(1)),
        ))
}

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Wire collaborators from `config` and serve until Ctrl-C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let provider = create_provider(&config.ai)?;
    let store = create_store(&config.notion).await?;
    let processor = MessageProcessor::new(CommandRegistry::shared(), provider, store);
    let state = AppState::new(&config, processor);
    let app = build_router(state, &config.gateway);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind gateway on {addr}"))?;
    tracing::info!("wxrelay gateway listening on http://{addr}");
    tracing::info!("  GET  /api/official  (WeChat URL verification)");
    tracing::info!("  POST /api/official  (WeChat message callbacks)");
    tracing::info!("  POST /api/ai        (direct AI reply)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server error")?;
    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
