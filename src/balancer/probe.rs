//! # Health Probe
//!
//! Pulls telemetry from workers on demand. Health is advisory: a failed probe
//! never propagates as an error. For scoring it degrades to penalty values
//! that make the unreachable worker maximally unattractive; for status
//! reporting it becomes an explicit offline entry.

use log::debug;
use std::sync::Arc;

use crate::common::messages::Telemetry;
use crate::worker::proxy::{WorkerError, WorkerProxy};

/// Load figure substituted in scoring when a worker cannot be probed.
pub const PENALTY_LOAD: u64 = 999;

/// On-demand telemetry over the worker pool.
pub struct HealthProbe {
    proxies: Vec<Arc<dyn WorkerProxy>>,
}

impl HealthProbe {
    pub fn new(proxies: Vec<Arc<dyn WorkerProxy>>) -> Self {
        Self { proxies }
    }

    /// Telemetry and load figure for one scoring decision.
    ///
    /// # Arguments
    /// - `proxy`: The worker under consideration
    /// - `in_flight`: The balancer's own in-flight count for that worker
    ///
    /// # Returns
    /// The worker's snapshot paired with `in_flight` when the probe answers,
    /// or penalty telemetry paired with [`PENALTY_LOAD`] when it does not.
    pub async fn scoring_inputs(proxy: &dyn WorkerProxy, in_flight: u64) -> (Telemetry, u64) {
        match proxy.probe().await {
            Ok(telemetry) => {
                debug!(
                    "📡 '{}': cpu {:.1}%, ram {:.1}%, {} running (at {})",
                    proxy.worker().id,
                    telemetry.cpu_percent,
                    telemetry.ram_percent,
                    telemetry.tasks_running,
                    telemetry.captured_at.format("%H:%M:%S"),
                );
                (telemetry, in_flight)
            }
            Err(e) => {
                debug!("📡 probe failed, scoring '{}' with penalty: {}", proxy.worker().id, e);
                (Telemetry::penalty(), PENALTY_LOAD)
            }
        }
    }

    /// Probe every worker in pool order, keeping failures as explicit outcomes.
    ///
    /// Feeds the `/nodes_status` endpoint, which reports unreachable workers
    /// as offline instead of dropping them.
    pub async fn survey(&self) -> Vec<(String, Result<Telemetry, WorkerError>)> {
        let mut outcomes = Vec::with_capacity(self.proxies.len());
        for proxy in &self.proxies {
            let outcome = proxy.probe().await;
            outcomes.push((proxy.worker().id.clone(), outcome));
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::messages::{Chunk, TaskResult, Worker};
    use async_trait::async_trait;
    use chrono::Local;

    struct FixedWorker {
        worker: Worker,
        healthy: bool,
    }

    impl FixedWorker {
        fn new(id: &str, healthy: bool) -> Self {
            Self {
                worker: Worker {
                    id: id.to_string(),
                    address: format!("http://test/{}", id),
                },
                healthy,
            }
        }
    }

    #[async_trait]
    impl WorkerProxy for FixedWorker {
        fn worker(&self) -> &Worker {
            &self.worker
        }

        async fn execute(&self, _chunk: &Chunk) -> Result<TaskResult, WorkerError> {
            unreachable!("probe tests never execute tasks")
        }

        async fn probe(&self) -> Result<Telemetry, WorkerError> {
            if self.healthy {
                Ok(Telemetry {
                    cpu_percent: 12.0,
                    ram_percent: 34.0,
                    tasks_running: 1,
                    captured_at: Local::now(),
                })
            } else {
                Err(WorkerError::Unreachable {
                    worker: self.worker.id.clone(),
                    reason: "connection refused".to_string(),
                })
            }
        }
    }

    #[tokio::test]
    async fn healthy_probe_passes_through_in_flight_count() {
        let proxy = FixedWorker::new("node-a", true);

        let (telemetry, load) = HealthProbe::scoring_inputs(&proxy, 3).await;

        assert_eq!(telemetry.cpu_percent, 12.0);
        assert_eq!(load, 3);
    }

    #[tokio::test]
    async fn failed_probe_scores_with_penalty_values() {
        let proxy = FixedWorker::new("node-a", false);

        let (telemetry, load) = HealthProbe::scoring_inputs(&proxy, 3).await;

        assert_eq!(telemetry.cpu_percent, 100.0);
        assert_eq!(telemetry.ram_percent, 100.0);
        assert_eq!(load, PENALTY_LOAD);
    }

    #[tokio::test]
    async fn survey_reports_every_worker_in_pool_order() {
        let probe = HealthProbe::new(vec![
            Arc::new(FixedWorker::new("node-a", true)) as Arc<dyn WorkerProxy>,
            Arc::new(FixedWorker::new("node-b", false)) as Arc<dyn WorkerProxy>,
        ]);

        let outcomes = probe.survey().await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, "node-a");
        assert!(outcomes[0].1.is_ok());
        assert_eq!(outcomes[1].0, "node-b");
        assert!(outcomes[1].1.is_err());
    }
}
