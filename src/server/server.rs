use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::config::settings::SettingsConfig;
use crate::keeper::KeeperError;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::scheduler::RenewScheduler;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub scheduler: Arc<RenewScheduler<Value>>,
}

impl AppState {
    pub fn new(metrics: &Metrics, scheduler: Arc<RenewScheduler<Value>>) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            scheduler,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub keeper: String,
    pub has_cache: bool,
    pub refresh_date: Option<DateTime<Utc>>,
    pub paused: bool,
    pub renewing: bool,
    pub timer_active: bool,
}

/// Router exposing the keeper's read and control surface.
pub fn router(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .route("/value", get(get_value))
        .route("/renew", post(renew_value))
        .route("/cache", delete(clear_cache))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/status", get(status))
        .merge(state.metrics_state.router(&settings_config.metrics))
        .with_state(state)
}

/// Start the Axum server and serve until the listener fails.
pub async fn start(
    settings_config: &SettingsConfig,
    scheduler: Arc<RenewScheduler<Value>>,
) -> Result<()> {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, scheduler);
    let app = router(settings_config, state);

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    info!("listening on {}", bind_addr);
    metrics.up.set(1);
    axum::serve(listener, app).await.context("server failed")?;

    Ok(())
}

async fn get_value(State(state): State<AppState>) -> Response {
    value_response(state.scheduler.get().await)
}

async fn renew_value(State(state): State<AppState>) -> Response {
    value_response(state.scheduler.renew().await)
}

async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.scheduler.clear_cache();
    StatusCode::NO_CONTENT
}

async fn pause(State(state): State<AppState>) -> StatusCode {
    state.scheduler.pause().await;
    StatusCode::NO_CONTENT
}

async fn resume(State(state): State<AppState>) -> StatusCode {
    state.scheduler.resume().await;
    StatusCode::NO_CONTENT
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let scheduler = &state.scheduler;
    let keeper = scheduler.keeper();
    let entry = keeper.entry();
    Json(StatusResponse {
        keeper: keeper.name().to_owned(),
        has_cache: entry.has_cache,
        refresh_date: entry.refresh_date,
        paused: scheduler.is_paused(),
        renewing: keeper.is_renewing(),
        timer_active: scheduler.timer_active(),
    })
}

fn value_response(result: Result<Value, KeeperError>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}
