//! HTTP front end: routing, admission middleware and JSON handlers.

use anyhow::Context;
use axum::http::{header, HeaderName, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod error;
pub mod handlers;
pub mod middleware;

pub use error::ApiError;

use crate::config::Config;
use crate::gate::RequestGate;
use crate::transcribe::TranscriptionPipeline;
use crate::webhook::WebhookNotifier;
use crate::Result;
use handlers::{banner_handler, batch_transcribe_handler, health_handler, transcribe_handler};
use middleware::{gate_middleware, request_id_middleware, API_KEY_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TranscriptionPipeline>,
    pub gate: Arc<RequestGate>,
    pub notifier: WebhookNotifier,
    pub max_batch_size: usize,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            pipeline: Arc::new(TranscriptionPipeline::from_config(config)?),
            gate: Arc::new(RequestGate::from_config(config)),
            notifier: WebhookNotifier::new(Duration::from_secs(config.webhook.timeout_secs))?,
            max_batch_size: config.batch.max_batch_size,
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)]);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let gated = Router::new()
        .route("/api/transcribe", post(transcribe_handler))
        .route("/api/transcribe/batch", post(batch_transcribe_handler))
        .route_layer(from_fn_with_state(state.clone(), gate_middleware));

    Router::new()
        .route("/api/transcribe", get(banner_handler))
        .route("/health", get(health_handler))
        .merge(gated)
        .layer(from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    let router = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Transcrify listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
