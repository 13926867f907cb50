//! Webhook server
//!
//! Telegram pushes updates to `POST /bot`. The update is acknowledged at once
//! and handled on its own task so a slow command never delays the reply.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::gateway::Update;
use crate::runner::ForecastRunner;

/// Path the webhook is registered under, relative to WEBHOOK_URL
pub const WEBHOOK_PATH: &str = "/bot";

pub fn router(runner: Arc<ForecastRunner>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(receive_update))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(runner)
}

/// Bind `0.0.0.0:{port}` and serve until the process exits
pub async fn serve(runner: Arc<ForecastRunner>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🚀 Webhook server listening on port {}", port);

    axum::serve(listener, router(runner)).await?;
    Ok(())
}

/// POST /bot - Telegram update
pub async fn receive_update(
    State(runner): State<Arc<ForecastRunner>>,
    Json(update): Json<Update>,
) -> StatusCode {
    debug!("Received update {}", update.update_id);
    tokio::spawn(async move {
        runner.handle_update(update).await;
    });
    StatusCode::OK
}

/// GET /health
pub async fn health_check() -> &'static str {
    "ok"
}
