use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::fetch::CatalogClient;
use crate::snapshot::{Snapshot, SnapshotCache};

/// Env var holding the shared secret expected by the warm endpoint.
pub const CRON_SECRET_ENV: &str = "CRON_SECRET";

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<CatalogClient>,
    pub cache: Arc<SnapshotCache>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/compare-v2", get(get_snapshot))
        .route("/compare-v2/warm", get(warm))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");
    axum::serve(listener, router(state))
        .await
        .context("server error")?;
    Ok(())
}

/// Current snapshot as JSON. A cold cache triggers one on-demand build;
/// a failed build returns 502 with no partial data.
async fn get_snapshot(State(state): State<AppState>) -> Response {
    if let Some(snapshot) = state.cache.get() {
        return Json(&*snapshot).into_response();
    }

    match build_and_swap(&state).await {
        Ok(snapshot) => Json(&*snapshot).into_response(),
        Err(e) => {
            error!("snapshot build failed: {e:#}");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Cache-warm trigger for an external scheduler. Requires
/// `Authorization: Bearer $CRON_SECRET`; reports row counts and timing.
async fn warm(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let started = Instant::now();
    let ts = Utc::now().to_rfc3339();

    let Ok(secret) = std::env::var(CRON_SECRET_ENV) else {
        error!("warm endpoint hit with no {CRON_SECRET_ENV} configured");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": "server_misconfigured", "ts": ts })),
        )
            .into_response();
    };

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {secret}"));
    if !authorized {
        warn!("unauthorized warm request");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "ok": false, "error": "unauthorized", "ts": ts })),
        )
            .into_response();
    }

    match build_and_swap(&state).await {
        Ok(snapshot) => {
            let took_ms = started.elapsed().as_millis() as u64;
            info!(
                programs = snapshot.programs.len(),
                values = snapshot.values.len(),
                took_ms,
                "snapshot warmed"
            );
            Json(json!({
                "ok": true,
                "programs": snapshot.programs.len(),
                "params": snapshot.params.len(),
                "values": snapshot.values.len(),
                "tookMs": took_ms,
                "ts": ts,
            }))
            .into_response()
        }
        Err(e) => {
            let took_ms = started.elapsed().as_millis() as u64;
            error!("warm failed after {took_ms}ms: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": e.to_string(), "tookMs": took_ms, "ts": ts })),
            )
                .into_response()
        }
    }
}

async fn build_and_swap(state: &AppState) -> Result<Arc<Snapshot>> {
    let records = state.client.fetch_all().await?;
    Ok(state.cache.swap(Snapshot::build(records)))
}
