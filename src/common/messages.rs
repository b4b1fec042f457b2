//! # Wire and Engine Data Types
//!
//! Defines the data model shared by the balancer, the fog node and the CLI
//! client:
//! - Chunking types ([`Chunk`]) produced by the splitter and consumed by
//!   worker proxies
//! - Worker-facing wire types ([`TaskResult`], [`Telemetry`]) exchanged over
//!   the fog node HTTP interface
//! - Balancer-facing wire types ([`DispatchResult`], [`ProcessFileResponse`])
//!   returned to callers of `/process_file`
//! - Persisted artifact types ([`Manifest`], [`ManifestEntry`]) written next
//!   to the reassembled ciphertext
//!
//! All wire types serialize to JSON.

use bytes::Bytes;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// ============================================================================
// CHUNKING
// ============================================================================

/// One fixed-size slice of the input file, the unit of dispatch.
///
/// The payload is a cheaply-cloneable handle into the original upload buffer,
/// since a chunk may be re-sent to several workers before one accepts it.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position of this chunk in the original file (0-based, contiguous)
    pub index: u64,
    /// Byte offset of this chunk within the original file
    pub offset: u64,
    /// The chunk's bytes
    pub payload: Bytes,
}

// ============================================================================
// WORKER WIRE TYPES
// ============================================================================

/// Successful response from a fog node's `POST /task` endpoint.
///
/// The ciphertext, key and nonce are hex-encoded and all three are required;
/// a response missing any of them is treated as a task failure by the proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Hex-encoded ciphertext of the chunk
    pub result: String,
    /// Hex-encoded encryption key used for this chunk
    pub key: String,
    /// Hex-encoded nonce used for this chunk
    pub nonce: String,
    /// Seconds the worker spent on the chunk, as measured by the worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    /// Identity the worker reports for itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_used: Option<String>,
}

/// Point-in-time load snapshot pulled from a fog node's `GET /health`.
///
/// Missing percentage fields parse as 100.0 (fully loaded) so a worker that
/// under-reports never looks more attractive than one that answers honestly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Telemetry {
    /// Global CPU usage percentage (0.0 to 100.0)
    #[serde(default = "full_percent")]
    pub cpu_percent: f64,
    /// Used-memory percentage (0.0 to 100.0)
    #[serde(default = "full_percent")]
    pub ram_percent: f64,
    /// Number of tasks the worker reports as currently running
    #[serde(default)]
    pub tasks_running: u64,
    /// When this snapshot was received by the balancer
    #[serde(skip, default = "Local::now")]
    pub captured_at: DateTime<Local>,
}

fn full_percent() -> f64 {
    100.0
}

impl Telemetry {
    /// Worst-case stand-in used when a worker cannot be probed.
    pub fn penalty() -> Self {
        Self {
            cpu_percent: 100.0,
            ram_percent: 100.0,
            tasks_running: 0,
            captured_at: Local::now(),
        }
    }
}

/// A remote worker's identity, fixed for the life of the process.
///
/// Pool order (the order workers appear in the configuration file) is the
/// canonical order for score ties, bootstrap selection and retry
/// substitution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    /// Unique identifier, reported back to callers as `node_used` (e.g. "node-5001")
    pub id: String,
    /// Base URL of the worker's HTTP interface (e.g. "http://127.0.0.1:5001")
    pub address: String,
}

// ============================================================================
// BALANCER WIRE TYPES
// ============================================================================

/// Terminal outcome of one chunk's dispatch, success or failure.
///
/// Exactly one of these exists per chunk index in a `/process_file` response.
/// For a failed chunk (`failed == true`) the hex fields are absent and
/// `node_used` names the last worker tried before the pool was exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    /// Index of the chunk this result belongs to
    pub chunk: u64,
    /// Worker that produced the result (or was tried last, on failure)
    pub node_used: String,
    /// Hex-encoded ciphertext
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Hex-encoded encryption key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Hex-encoded nonce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Seconds the worker reported spending on the chunk (0.0 if unreported)
    pub processing_time: f64,
    /// Wall-clock seconds from dispatch to terminal state for this chunk
    pub total_time: f64,
    /// True when every worker in the pool failed this chunk
    #[serde(default)]
    pub failed: bool,
}

/// Body of a successful `POST /process_file` response, sorted by chunk index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessFileResponse {
    pub results: Vec<DispatchResult>,
}

/// Uniform error body for HTTP endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// PERSISTED ARTIFACTS
// ============================================================================

/// Key/nonce record for one successfully encrypted chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub chunk: u64,
    pub key: String,
    pub nonce: String,
}

/// Sidecar manifest persisted next to the reassembled artifact.
///
/// Entries appear in chunk order and cover only chunks that succeeded; the
/// artifact cannot be decrypted without it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub chunks: Vec<ManifestEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_result_requires_hex_fields() {
        let missing_key = r#"{"result": "aa", "nonce": "bb"}"#;
        assert!(serde_json::from_str::<TaskResult>(missing_key).is_err());

        let minimal = r#"{"result": "aa", "key": "cc", "nonce": "bb"}"#;
        let parsed: TaskResult = serde_json::from_str(minimal).unwrap();
        assert_eq!(parsed.processing_time, None);
        assert_eq!(parsed.node_used, None);
    }

    #[test]
    fn telemetry_defaults_to_fully_loaded() {
        let parsed: Telemetry = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.cpu_percent, 100.0);
        assert_eq!(parsed.ram_percent, 100.0);
        assert_eq!(parsed.tasks_running, 0);
    }

    #[test]
    fn telemetry_ignores_extra_wire_fields() {
        let body = r#"{"id": "node-5001", "cpu_percent": 12.5, "ram_percent": 40.0, "tasks_running": 2}"#;
        let parsed: Telemetry = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.cpu_percent, 12.5);
        assert_eq!(parsed.tasks_running, 2);
    }

    #[test]
    fn failed_dispatch_result_omits_hex_fields() {
        let result = DispatchResult {
            chunk: 3,
            node_used: "node-5002".to_string(),
            result: None,
            key: None,
            nonce: None,
            processing_time: 0.0,
            total_time: 1.25,
            failed: true,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("result").is_none());
        assert!(json.get("key").is_none());
        assert_eq!(json["failed"], true);
        assert_eq!(json["chunk"], 3);
    }
}
