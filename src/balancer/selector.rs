//! # Node Selection Policies
//!
//! Pluggable strategies for picking which worker receives the next chunk.
//! Callers name one of three policies per request:
//!
//! - **Uniform-Random** (`random`): every worker equally likely, no shared state
//! - **Round-Robin** (`round_robin`): one process-wide cursor cycling the pool
//! - **Adaptive-Scored** (`algo`): probes live telemetry and picks the worker
//!   with the lowest multiplicative cost score
//!
//! ## Scoring
//!
//! Once every worker has at least one completed task, the adaptive policy
//! scores each worker as
//!
//! ```text
//! size_factor = max(chunk_bytes / 50 MiB, 0.1)
//! score = ewma * (1 + load) * (1 + cpu/200) * (1 + ram/200) * size_factor
//! ```
//!
//! where `load` is the balancer's own in-flight count for the worker, or a
//! penalty of 999 when the worker's telemetry probe fails. Lower historical
//! latency, lower current CPU/RAM, fewer in-flight chunks and a smaller
//! relative chunk size all reduce the score monotonically; the minimum score
//! wins and ties go to the earliest worker in pool order.
//!
//! Until every worker has history, the policy bootstraps by routing chunks to
//! the first untested worker in pool order, forcing one observation per
//! worker before scoring starts.

use async_trait::async_trait;
use log::debug;
use rand::Rng;
use std::sync::Arc;

use crate::balancer::probe::HealthProbe;
use crate::balancer::state::LoadBalancerState;
use crate::worker::proxy::WorkerProxy;

/// Chunk size the adaptive score is normalized against.
const SIZE_REFERENCE_BYTES: f64 = 50.0 * 1024.0 * 1024.0;
/// Lower bound of the size factor, so small chunks still differentiate workers.
const SIZE_FACTOR_FLOOR: f64 = 0.1;

/// The selection policy named by a `/process_file` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbPolicy {
    UniformRandom,
    RoundRobin,
    AdaptiveScored,
}

impl LbPolicy {
    /// Parse the wire name carried in the `lb_type` form field.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "random" => Some(Self::UniformRandom),
            "round_robin" => Some(Self::RoundRobin),
            "algo" => Some(Self::AdaptiveScored),
            _ => None,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::UniformRandom => "random",
            Self::RoundRobin => "round_robin",
            Self::AdaptiveScored => "algo",
        }
    }

    /// Instantiate the selector implementing this policy.
    pub fn selector(&self) -> Arc<dyn NodeSelector> {
        match self {
            Self::UniformRandom => Arc::new(UniformRandomSelector),
            Self::RoundRobin => Arc::new(RoundRobinSelector),
            Self::AdaptiveScored => Arc::new(AdaptiveScoredSelector),
        }
    }
}

/// Strategy returning the pool index of the worker to try next.
///
/// The pool is never empty (enforced at configuration load) and its order is
/// the canonical order for ties, bootstrap and substitution.
#[async_trait]
pub trait NodeSelector: Send + Sync {
    /// Pick a worker for the given chunk size.
    ///
    /// # Arguments
    /// - `proxies`: The worker pool, in pool order
    /// - `state`: Shared balancer state (cursor, history, in-flight counts)
    /// - `chunk_len`: Payload size of the chunk being placed, in bytes
    async fn select(
        &self,
        proxies: &[Arc<dyn WorkerProxy>],
        state: &LoadBalancerState,
        chunk_len: usize,
    ) -> usize;
}

/// Stateless uniform choice over the pool.
pub struct UniformRandomSelector;

#[async_trait]
impl NodeSelector for UniformRandomSelector {
    async fn select(
        &self,
        proxies: &[Arc<dyn WorkerProxy>],
        _state: &LoadBalancerState,
        _chunk_len: usize,
    ) -> usize {
        rand::thread_rng().gen_range(0..proxies.len())
    }
}

/// Cycles the pool with one process-wide cursor.
///
/// Over K consecutive selections against N workers every worker is picked
/// `floor(K/N)` or `ceil(K/N)` times, and no worker repeats before the rest
/// of the pool has had its turn.
pub struct RoundRobinSelector;

#[async_trait]
impl NodeSelector for RoundRobinSelector {
    async fn select(
        &self,
        proxies: &[Arc<dyn WorkerProxy>],
        state: &LoadBalancerState,
        _chunk_len: usize,
    ) -> usize {
        let mut inner = state.lock().await;
        inner.next_round_robin(proxies.len())
    }
}

/// Scores workers from live telemetry and historical processing time.
pub struct AdaptiveScoredSelector;

#[async_trait]
impl NodeSelector for AdaptiveScoredSelector {
    async fn select(
        &self,
        proxies: &[Arc<dyn WorkerProxy>],
        state: &LoadBalancerState,
        chunk_len: usize,
    ) -> usize {
        // The guard is held across the probe loop, so one adaptive decision
        // sees a consistent view of history and in-flight counts.
        let inner = state.lock().await;

        // Bootstrap: a worker with no completed task yet takes the chunk
        // outright, in pool order.
        if let Some(idx) = proxies
            .iter()
            .position(|p| inner.ewma(&p.worker().id).is_none())
        {
            debug!(
                "📊 bootstrapping untested worker '{}'",
                proxies[idx].worker().id
            );
            return idx;
        }

        let size_factor = size_factor(chunk_len);
        let mut best_idx = 0usize;
        let mut best_score = f64::INFINITY;

        for (idx, proxy) in proxies.iter().enumerate() {
            let worker_id = &proxy.worker().id;
            let in_flight = inner.in_flight(worker_id);
            let (telemetry, load) =
                HealthProbe::scoring_inputs(proxy.as_ref(), in_flight).await;
            // Untested workers were caught above; 0.0 keeps the arithmetic total.
            let ewma = inner.ewma(worker_id).unwrap_or(0.0);

            let score = ewma
                * (1.0 + load as f64)
                * (1.0 + telemetry.cpu_percent / 200.0)
                * (1.0 + telemetry.ram_percent / 200.0)
                * size_factor;

            debug!(
                "📊 '{}' score {:.4} (ewma {:.4}s, load {}, cpu {:.1}%, ram {:.1}%)",
                worker_id, score, ewma, load, telemetry.cpu_percent, telemetry.ram_percent
            );

            // Strict comparison keeps the earliest pool index on ties.
            if score < best_score {
                best_score = score;
                best_idx = idx;
            }
        }

        best_idx
    }
}

fn size_factor(chunk_len: usize) -> f64 {
    (chunk_len as f64 / SIZE_REFERENCE_BYTES).max(SIZE_FACTOR_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::messages::{Chunk, TaskResult, Telemetry, Worker};
    use crate::worker::proxy::WorkerError;
    use chrono::Local;

    /// Worker stub with fixed telemetry; `None` means the probe fails.
    struct StubWorker {
        worker: Worker,
        telemetry: Option<(f64, f64)>,
    }

    fn stub(id: &str, cpu: f64, ram: f64) -> Arc<dyn WorkerProxy> {
        Arc::new(StubWorker {
            worker: Worker {
                id: id.to_string(),
                address: format!("http://test/{}", id),
            },
            telemetry: Some((cpu, ram)),
        })
    }

    fn offline(id: &str) -> Arc<dyn WorkerProxy> {
        Arc::new(StubWorker {
            worker: Worker {
                id: id.to_string(),
                address: format!("http://test/{}", id),
            },
            telemetry: None,
        })
    }

    #[async_trait]
    impl WorkerProxy for StubWorker {
        fn worker(&self) -> &Worker {
            &self.worker
        }

        async fn execute(&self, _chunk: &Chunk) -> Result<TaskResult, WorkerError> {
            unreachable!("selector tests never execute tasks")
        }

        async fn probe(&self) -> Result<Telemetry, WorkerError> {
            match self.telemetry {
                Some((cpu_percent, ram_percent)) => Ok(Telemetry {
                    cpu_percent,
                    ram_percent,
                    tasks_running: 0,
                    captured_at: Local::now(),
                }),
                None => Err(WorkerError::Unreachable {
                    worker: self.worker.id.clone(),
                    reason: "connection refused".to_string(),
                }),
            }
        }
    }

    fn workers_of(proxies: &[Arc<dyn WorkerProxy>]) -> Vec<Worker> {
        proxies.iter().map(|p| p.worker().clone()).collect()
    }

    #[tokio::test]
    async fn round_robin_is_fair_and_cyclic() {
        let pool = vec![stub("a", 0.0, 0.0), stub("b", 0.0, 0.0), stub("c", 0.0, 0.0)];
        let state = LoadBalancerState::new(&workers_of(&pool));
        let selector = RoundRobinSelector;

        let mut picks = Vec::new();
        for _ in 0..10 {
            picks.push(selector.select(&pool, &state, 1024).await);
        }

        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
        let count = |i| picks.iter().filter(|&&p| p == i).count();
        assert_eq!(count(0), 4);
        assert_eq!(count(1), 3);
        assert_eq!(count(2), 3);
    }

    #[tokio::test]
    async fn uniform_random_covers_the_whole_pool() {
        let pool = vec![stub("a", 0.0, 0.0), stub("b", 0.0, 0.0), stub("c", 0.0, 0.0)];
        let state = LoadBalancerState::new(&workers_of(&pool));
        let selector = UniformRandomSelector;

        let mut hit = [false; 3];
        for _ in 0..300 {
            let pick = selector.select(&pool, &state, 1024).await;
            assert!(pick < pool.len());
            hit[pick] = true;
        }

        assert!(hit.iter().all(|&h| h), "300 draws should hit every worker");
    }

    #[tokio::test]
    async fn adaptive_bootstraps_untested_workers_in_pool_order() {
        let pool = vec![stub("a", 10.0, 10.0), stub("b", 10.0, 10.0)];
        let state = LoadBalancerState::new(&workers_of(&pool));
        let selector = AdaptiveScoredSelector;

        assert_eq!(selector.select(&pool, &state, 1024).await, 0);

        state.record_success("a", 1.0).await;
        assert_eq!(selector.select(&pool, &state, 1024).await, 1);
    }

    #[tokio::test]
    async fn adaptive_prefers_the_dominating_worker() {
        // "slow" is worse on every axis, so "fast" must win even from the
        // second pool slot.
        let pool = vec![stub("slow", 50.0, 50.0), stub("fast", 10.0, 10.0)];
        let state = LoadBalancerState::new(&workers_of(&pool));
        state.record_success("slow", 2.0).await;
        state.record_success("fast", 1.0).await;

        let selector = AdaptiveScoredSelector;
        assert_eq!(selector.select(&pool, &state, 1024).await, 1);
    }

    #[tokio::test]
    async fn adaptive_breaks_ties_by_pool_order() {
        let pool = vec![stub("a", 20.0, 20.0), stub("b", 20.0, 20.0)];
        let state = LoadBalancerState::new(&workers_of(&pool));
        state.record_success("a", 1.0).await;
        state.record_success("b", 1.0).await;

        let selector = AdaptiveScoredSelector;
        assert_eq!(selector.select(&pool, &state, 1024).await, 0);
    }

    #[tokio::test]
    async fn adaptive_counts_in_flight_chunks_against_a_worker() {
        let pool = vec![stub("a", 20.0, 20.0), stub("b", 20.0, 20.0)];
        let state = LoadBalancerState::new(&workers_of(&pool));
        state.record_success("a", 1.0).await;
        state.record_success("b", 1.0).await;

        state.begin_attempt("a").await;
        state.begin_attempt("a").await;

        let selector = AdaptiveScoredSelector;
        assert_eq!(selector.select(&pool, &state, 1024).await, 1);
    }

    #[tokio::test]
    async fn adaptive_routes_away_from_unreachable_workers() {
        // "a" has the better history but its probe fails, so the penalty
        // load must push the chunk to "b".
        let pool = vec![offline("a"), stub("b", 30.0, 30.0)];
        let state = LoadBalancerState::new(&workers_of(&pool));
        state.record_success("a", 1.0).await;
        state.record_success("b", 2.0).await;

        let selector = AdaptiveScoredSelector;
        assert_eq!(selector.select(&pool, &state, 1024).await, 1);
    }

    #[test]
    fn size_factor_floors_small_chunks_and_scales_large_ones() {
        assert_eq!(size_factor(1024), 0.1);
        assert_eq!(size_factor(5 * 1024 * 1024), 0.1);
        assert!((size_factor(100 * 1024 * 1024) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn policy_wire_names_round_trip() {
        for policy in [
            LbPolicy::UniformRandom,
            LbPolicy::RoundRobin,
            LbPolicy::AdaptiveScored,
        ] {
            assert_eq!(LbPolicy::from_wire(policy.wire_name()), Some(policy));
        }
        assert_eq!(LbPolicy::from_wire("fastest"), None);
    }
}
