//! # Worker Proxy
//!
//! Client-side abstraction over one remote fog node. The [`WorkerProxy`]
//! trait is the seam between the dispatch engine and the network: the engine
//! only ever talks to workers through it, which lets tests drive the
//! dispatcher with scripted in-process workers instead of live HTTP servers.
//!
//! ## Failure Taxonomy
//!
//! A worker call fails in one of two ways, and the dispatcher treats both
//! identically (retry the chunk on a different worker):
//! - [`WorkerError::Unreachable`]: connection refused or timed out
//! - [`WorkerError::TaskFailure`]: the worker answered, but with an error
//!   status or a body that does not parse as a task result

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::common::messages::{Chunk, TaskResult, Telemetry, Worker};

/// Failure talking to a single worker for a single attempt.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker could not be reached (connection failure or timeout).
    #[error("worker '{worker}' unreachable: {reason}")]
    Unreachable { worker: String, reason: String },

    /// The worker was reached but did not produce a usable result.
    #[error("worker '{worker}' task failed: {reason}")]
    TaskFailure { worker: String, reason: String },
}

/// One remote worker, as seen by the dispatch engine.
#[async_trait]
pub trait WorkerProxy: Send + Sync {
    /// Identity of the worker behind this proxy.
    fn worker(&self) -> &Worker;

    /// Send one chunk to the worker for encryption.
    async fn execute(&self, chunk: &Chunk) -> Result<TaskResult, WorkerError>;

    /// Pull a load snapshot from the worker.
    async fn probe(&self) -> Result<Telemetry, WorkerError>;
}

/// Production [`WorkerProxy`] speaking the fog node HTTP interface.
///
/// All proxies of one balancer share a single [`reqwest::Client`] so
/// connections are pooled per worker host. Task calls run under the task
/// timeout, probes under the (much shorter) probe timeout.
pub struct HttpWorkerProxy {
    worker: Worker,
    http: reqwest::Client,
    task_timeout: Duration,
    probe_timeout: Duration,
}

impl HttpWorkerProxy {
    pub fn new(
        worker: Worker,
        http: reqwest::Client,
        task_timeout: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            worker,
            http,
            task_timeout,
            probe_timeout,
        }
    }

    /// Build one proxy per configured worker over a shared HTTP client.
    ///
    /// # Arguments
    /// - `workers`: The configured worker pool, in pool order
    /// - `task_timeout`: End-to-end timeout for `POST /task` calls
    /// - `probe_timeout`: Timeout for `GET /health` probes
    ///
    /// # Returns
    /// - `Ok(Vec<Arc<dyn WorkerProxy>>)`: Proxies in the same order as `workers`
    /// - `Err`: HTTP client construction failed
    pub fn pool(
        workers: &[Worker],
        task_timeout: Duration,
        probe_timeout: Duration,
    ) -> anyhow::Result<Vec<Arc<dyn WorkerProxy>>> {
        let http = reqwest::Client::builder()
            .timeout(task_timeout)
            .tcp_nodelay(true)
            .build()?;

        Ok(workers
            .iter()
            .map(|worker| {
                Arc::new(Self::new(
                    worker.clone(),
                    http.clone(),
                    task_timeout,
                    probe_timeout,
                )) as Arc<dyn WorkerProxy>
            })
            .collect())
    }

    /// Map a transport error onto the failure taxonomy.
    fn classify(&self, err: reqwest::Error) -> WorkerError {
        if err.is_connect() || err.is_timeout() {
            WorkerError::Unreachable {
                worker: self.worker.id.clone(),
                reason: err.to_string(),
            }
        } else {
            WorkerError::TaskFailure {
                worker: self.worker.id.clone(),
                reason: err.to_string(),
            }
        }
    }

    fn task_failure(&self, reason: String) -> WorkerError {
        WorkerError::TaskFailure {
            worker: self.worker.id.clone(),
            reason,
        }
    }
}

#[async_trait]
impl WorkerProxy for HttpWorkerProxy {
    fn worker(&self) -> &Worker {
        &self.worker
    }

    async fn execute(&self, chunk: &Chunk) -> Result<TaskResult, WorkerError> {
        let url = format!("{}/task", self.worker.address);

        let response = self
            .http
            .post(&url)
            .timeout(self.task_timeout)
            .body(chunk.payload.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(self.task_failure(format!("HTTP {} from {}", response.status(), url)));
        }

        response
            .json::<TaskResult>()
            .await
            .map_err(|e| self.task_failure(format!("invalid task response: {}", e)))
    }

    async fn probe(&self) -> Result<Telemetry, WorkerError> {
        let url = format!("{}/health", self.worker.address);

        let response = self
            .http
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(self.task_failure(format!("HTTP {} from {}", response.status(), url)));
        }

        response
            .json::<Telemetry>()
            .await
            .map_err(|e| self.task_failure(format!("invalid health response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_preserves_worker_order() {
        let workers = vec![
            Worker {
                id: "node-5001".to_string(),
                address: "http://127.0.0.1:5001".to_string(),
            },
            Worker {
                id: "node-5002".to_string(),
                address: "http://127.0.0.1:5002".to_string(),
            },
        ];

        let proxies =
            HttpWorkerProxy::pool(&workers, Duration::from_secs(60), Duration::from_millis(1500))
                .unwrap();

        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[0].worker().id, "node-5001");
        assert_eq!(proxies[1].worker().id, "node-5002");
    }

    #[test]
    fn worker_error_names_the_worker() {
        let err = WorkerError::Unreachable {
            worker: "node-5001".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("node-5001"));
        assert!(err.to_string().contains("unreachable"));
    }
}
