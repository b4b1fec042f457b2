//! # Balancer HTTP API
//!
//! The service surface callers talk to:
//!
//! - `POST /process_file`: multipart upload (`file` + optional `lb_type`) that
//!   is chunked, dispatched and answered with per-chunk results
//! - `GET /nodes_status`: live telemetry and KPI per worker, with unreachable
//!   workers reported as offline
//! - `GET /health`: liveness summary for the balancer itself

use axum::{
    extract::{multipart::Multipart, DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use log::{error, info};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::balancer::config::BalancerConfig;
use crate::balancer::dispatcher::Dispatcher;
use crate::balancer::probe::HealthProbe;
use crate::balancer::selector::LbPolicy;
use crate::common::messages::{ErrorResponse, ProcessFileResponse};
use crate::worker::proxy::HttpWorkerProxy;

/// Upload ceiling; well above any sane multi-chunk file without being unbounded.
const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Shared state handed to every handler.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub probe: HealthProbe,
}

/// Build the balancer router over prepared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/process_file", post(process_file))
        .route("/nodes_status", get(nodes_status))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Construct the engine from configuration and serve the API until shutdown.
pub async fn serve(config: BalancerConfig) -> anyhow::Result<()> {
    let proxies = HttpWorkerProxy::pool(
        &config.workers,
        config.timeouts.task_timeout(),
        config.timeouts.probe_timeout(),
    )?;

    let dispatcher = Dispatcher::new(
        proxies.clone(),
        config.balancer.chunk_size_bytes,
        config.balancer.max_concurrent_dispatches,
        config.timeouts.task_timeout(),
    );
    let probe = HealthProbe::new(proxies);

    let state = Arc::new(AppState { dispatcher, probe });
    let app = router(state);

    info!(
        "🚀 Balancer listening on {} with {} worker(s)",
        config.balancer.listen_address,
        config.workers.len()
    );

    let listener = tokio::net::TcpListener::bind(&config.balancer.listen_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

async fn process_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let mut file_data: Option<Bytes> = None;
    let mut filename = String::from("upload.bin");
    let mut lb_type: Option<String> = None;

    // Parse multipart form data
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                filename = field.file_name().unwrap_or("upload.bin").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read file data: {}", e)))?;
                file_data = Some(data);
            }
            "lb_type" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read lb_type: {}", e)))?;
                lb_type = Some(value);
            }
            _ => {}
        }
    }

    // No file part means no dispatch happens at all.
    let file_data = file_data.ok_or_else(|| bad_request("No file"))?;

    let policy = match lb_type.as_deref() {
        None => LbPolicy::UniformRandom,
        Some(name) => LbPolicy::from_wire(name)
            .ok_or_else(|| bad_request(format!("Unknown lb_type '{}'", name)))?,
    };

    info!(
        "📥 Received '{}' ({} bytes), policy '{}'",
        filename,
        file_data.len(),
        policy.wire_name()
    );

    match state.dispatcher.dispatch(file_data, policy).await {
        Ok(results) => Ok((StatusCode::OK, Json(ProcessFileResponse { results }))),
        Err(e) => {
            error!("❌ Dispatch failed for '{}': {}", filename, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Dispatch failed: {}", e),
                }),
            ))
        }
    }
}

async fn nodes_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let kpis = state.dispatcher.state().kpi_snapshot().await;

    let mut statuses = serde_json::Map::new();
    for (worker_id, outcome) in state.probe.survey().await {
        let entry = match outcome {
            Ok(telemetry) => {
                let kpi = kpis
                    .get(&worker_id)
                    .copied()
                    .flatten()
                    .map(|v| (v * 1000.0).round() / 1000.0);
                serde_json::json!({
                    "cpu_percent": telemetry.cpu_percent,
                    "ram_percent": telemetry.ram_percent,
                    "tasks_running": telemetry.tasks_running,
                    "kpi": kpi,
                })
            }
            Err(_) => serde_json::json!({ "error": "offline" }),
        };
        statuses.insert(worker_id, entry);
    }

    Json(serde_json::Value::Object(statuses))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "fog-dispatch-balancer",
        "workers": state.dispatcher.proxies().len(),
    }))
}
