//! # Fog Node HTTP API
//!
//! The worker interface the balancer consumes:
//!
//! - `POST /task`: raw chunk bytes in, hex ciphertext + key + nonce out
//! - `GET /health`: identity plus live CPU/RAM/task-count telemetry

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use log::{error, info};
use std::sync::Arc;
use std::time::Instant;

use crate::common::messages::{ErrorResponse, TaskResult};
use crate::node::encryption::EncryptionService;
use crate::node::telemetry::NodeTelemetry;

/// Largest chunk a node accepts; matches the balancer's upload ceiling.
const MAX_CHUNK_BYTES: usize = 1024 * 1024 * 1024;

/// Shared state handed to every handler.
pub struct NodeState {
    pub id: String,
    pub telemetry: NodeTelemetry,
    pub encryption: EncryptionService,
}

/// Build the fog node router over prepared state.
pub fn router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/task", post(run_task))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_CHUNK_BYTES))
        .with_state(state)
}

/// Serve the worker interface until shutdown.
///
/// # Arguments
/// - `id`: Worker identity reported in task results and health responses
/// - `listen_address`: Address to bind (e.g. "0.0.0.0:5001")
/// - `max_parallel`: Maximum chunks encrypted concurrently
pub async fn serve(id: String, listen_address: &str, max_parallel: usize) -> anyhow::Result<()> {
    let state = Arc::new(NodeState {
        id,
        telemetry: NodeTelemetry::new(),
        encryption: EncryptionService::new(max_parallel),
    });
    let app = router(state.clone());

    info!(
        "🚀 Fog node '{}' listening on {} ({} parallel tasks)",
        state.id, listen_address, max_parallel
    );

    let listener = tokio::net::TcpListener::bind(listen_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_task(
    State(state): State<Arc<NodeState>>,
    body: Bytes,
) -> Result<Json<TaskResult>, (StatusCode, Json<ErrorResponse>)> {
    let chunk_len = body.len();
    state.telemetry.task_started();
    let started = Instant::now();

    let outcome = state.encryption.encrypt_chunk(body).await;
    state.telemetry.task_finished();

    match outcome {
        Ok(encrypted) => {
            let processing_time = started.elapsed().as_secs_f64();
            info!(
                "✅ Encrypted {} bytes -> {} bytes in {:.3}s",
                chunk_len,
                encrypted.ciphertext.len(),
                processing_time
            );

            Ok(Json(TaskResult {
                result: hex::encode(&encrypted.ciphertext),
                key: hex::encode(encrypted.key),
                nonce: hex::encode(encrypted.nonce),
                processing_time: Some(processing_time),
                node_used: Some(state.id.clone()),
            }))
        }
        Err(e) => {
            error!("❌ Encryption failed for {} byte chunk: {}", chunk_len, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Encryption failed: {}", e),
                }),
            ))
        }
    }
}

async fn health(State(state): State<Arc<NodeState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "id": state.id,
        "cpu_percent": state.telemetry.cpu_percent(),
        "ram_percent": state.telemetry.ram_percent(),
        "tasks_running": state.telemetry.tasks_running(),
    }))
}
