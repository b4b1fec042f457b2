//! # Load Balancer State
//!
//! Process-wide mutable state shared by all dispatches: the round-robin
//! cursor and, per worker, the smoothed processing-time history and the
//! number of chunks currently in flight.
//!
//! ## Locking
//!
//! Everything lives behind a single async mutex so that read-modify-write
//! sequences (cursor advance, in-flight bookkeeping, EWMA updates) are atomic
//! with respect to concurrent chunk dispatches. The adaptive selector holds
//! the guard across its whole scoring pass, which also serializes adaptive
//! selections.
//!
//! ## EWMA
//!
//! A worker's processing-time history is an exponentially weighted moving
//! average with α = 0.3: the first observation is stored directly, every
//! later one is smoothed as `0.3 * observed + 0.7 * previous`. The average
//! survives across requests for the life of the process and is surfaced as
//! the worker's KPI in `/nodes_status`.

use std::collections::HashMap;

use tokio::sync::{Mutex, MutexGuard};

use crate::common::messages::Worker;

/// Smoothing factor for processing-time averages.
pub const EWMA_ALPHA: f64 = 0.3;

/// Mutable bookkeeping for one worker.
#[derive(Debug, Clone, Default)]
pub struct WorkerState {
    /// Smoothed processing time in seconds; `None` until the worker has
    /// completed its first task
    pub ewma_processing_time: Option<f64>,
    /// Chunks this balancer currently has in flight on the worker
    pub in_flight: u64,
}

/// The state proper. Only reachable through [`LoadBalancerState`]'s mutex.
#[derive(Debug)]
pub struct LbStateInner {
    rr_cursor: usize,
    workers: HashMap<String, WorkerState>,
}

impl LbStateInner {
    /// Return the current round-robin pick and advance the cursor by one.
    pub fn next_round_robin(&mut self, pool_len: usize) -> usize {
        let idx = self.rr_cursor % pool_len;
        self.rr_cursor = (idx + 1) % pool_len;
        idx
    }

    pub fn ewma(&self, worker_id: &str) -> Option<f64> {
        self.workers
            .get(worker_id)
            .and_then(|w| w.ewma_processing_time)
    }

    pub fn in_flight(&self, worker_id: &str) -> u64 {
        self.workers.get(worker_id).map_or(0, |w| w.in_flight)
    }

    pub fn begin_attempt(&mut self, worker_id: &str) {
        self.workers.entry(worker_id.to_string()).or_default().in_flight += 1;
    }

    pub fn finish_attempt(&mut self, worker_id: &str) {
        let state = self.workers.entry(worker_id.to_string()).or_default();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// Fold one observed processing time into the worker's average.
    pub fn record_success(&mut self, worker_id: &str, observed_secs: f64) {
        let state = self.workers.entry(worker_id.to_string()).or_default();
        state.ewma_processing_time = Some(match state.ewma_processing_time {
            None => observed_secs,
            Some(previous) => EWMA_ALPHA * observed_secs + (1.0 - EWMA_ALPHA) * previous,
        });
    }
}

/// Shared handle to the balancer's mutable state.
#[derive(Debug)]
pub struct LoadBalancerState {
    inner: Mutex<LbStateInner>,
}

impl LoadBalancerState {
    /// Create state entries for every worker in the pool, all untested.
    pub fn new(workers: &[Worker]) -> Self {
        let workers = workers
            .iter()
            .map(|w| (w.id.clone(), WorkerState::default()))
            .collect();

        Self {
            inner: Mutex::new(LbStateInner {
                rr_cursor: 0,
                workers,
            }),
        }
    }

    /// Take the state lock. The guard can be held across awaits.
    pub async fn lock(&self) -> MutexGuard<'_, LbStateInner> {
        self.inner.lock().await
    }

    pub async fn begin_attempt(&self, worker_id: &str) {
        self.lock().await.begin_attempt(worker_id);
    }

    pub async fn finish_attempt(&self, worker_id: &str) {
        self.lock().await.finish_attempt(worker_id);
    }

    pub async fn record_success(&self, worker_id: &str, observed_secs: f64) {
        self.lock().await.record_success(worker_id, observed_secs);
    }

    /// Current EWMA per worker id, `None` for workers still untested.
    pub async fn kpi_snapshot(&self) -> HashMap<String, Option<f64>> {
        let inner = self.lock().await;
        inner
            .workers
            .iter()
            .map(|(id, w)| (id.clone(), w.ewma_processing_time))
            .collect()
    }
}
