//! # Dispatcher
//!
//! Fans an uploaded file out to the worker pool, one concurrent retry loop
//! per chunk, and collects exactly one terminal [`DispatchResult`] per chunk
//! index.
//!
//! ## Per-Chunk Retry
//!
//! Each chunk walks an explicit state machine:
//!
//! ```text
//! Pending -> Dispatched(worker) -> Succeeded
//!                |                     ^
//!                v                     |
//!            Retrying  ----------------+--> AllFailed (pool exhausted)
//! ```
//!
//! A failed attempt (connection error, timeout, bad response) adds the worker
//! to the chunk's tried set and reselects among the rest; only when every
//! worker in the pool has failed the chunk is it recorded as failed. One
//! chunk exhausting the pool never aborts the other chunks or the request.
//!
//! ## Concurrency
//!
//! Chunk loops run as independent tokio tasks gated by a semaphore
//! (`max_concurrent_dispatches` permits, held for the whole retry loop). A
//! limit of 1 degenerates to sequential dispatch in chunk order. No
//! cancellation flows between chunks: a success for chunk A never cancels an
//! in-flight attempt for chunk B.

use bytes::Bytes;
use log::{error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::balancer::selector::{LbPolicy, NodeSelector};
use crate::balancer::splitter::ChunkSplitter;
use crate::balancer::state::LoadBalancerState;
use crate::common::messages::{Chunk, DispatchResult, Worker};
use crate::worker::proxy::WorkerProxy;

/// The dispatch engine: splitter, worker pool, shared state and fan-out limit.
pub struct Dispatcher {
    proxies: Vec<Arc<dyn WorkerProxy>>,
    state: Arc<LoadBalancerState>,
    splitter: ChunkSplitter,
    limiter: Arc<Semaphore>,
    task_timeout: Duration,
}

impl Dispatcher {
    /// # Arguments
    /// - `proxies`: Worker pool in pool order; must be non-empty
    /// - `chunk_size`: Bytes per dispatched chunk
    /// - `max_concurrent`: Upper bound on chunks in flight at once
    /// - `task_timeout`: End-to-end timeout for one task attempt
    pub fn new(
        proxies: Vec<Arc<dyn WorkerProxy>>,
        chunk_size: usize,
        max_concurrent: usize,
        task_timeout: Duration,
    ) -> Self {
        let workers: Vec<Worker> = proxies.iter().map(|p| p.worker().clone()).collect();

        Self {
            state: Arc::new(LoadBalancerState::new(&workers)),
            splitter: ChunkSplitter::new(chunk_size),
            limiter: Arc::new(Semaphore::new(max_concurrent)),
            task_timeout,
            proxies,
        }
    }

    /// Shared balancer state (history, cursor, in-flight counts).
    pub fn state(&self) -> &Arc<LoadBalancerState> {
        &self.state
    }

    /// The worker pool, in pool order.
    pub fn proxies(&self) -> &[Arc<dyn WorkerProxy>] {
        &self.proxies
    }

    /// Split `content` and dispatch every chunk under the given policy.
    ///
    /// Returns one result per chunk, sorted by chunk index, with per-chunk
    /// failures recorded in the results rather than raised. Empty content
    /// yields an empty result set.
    ///
    /// # Returns
    /// - `Ok(Vec<DispatchResult>)`: Terminal outcome for every chunk
    /// - `Err`: A chunk task panicked or the engine is shutting down
    pub async fn dispatch(
        &self,
        content: Bytes,
        policy: LbPolicy,
    ) -> anyhow::Result<Vec<DispatchResult>> {
        let request_id = Uuid::new_v4();
        let chunks = self.splitter.split(content);

        if chunks.is_empty() {
            info!("📤 [{}] nothing to dispatch (empty input)", request_id);
            return Ok(Vec::new());
        }

        info!(
            "📤 [{}] dispatching {} chunk(s) across {} worker(s) using '{}'",
            request_id,
            chunks.len(),
            self.proxies.len(),
            policy.wire_name()
        );

        let selector = policy.selector();
        let mut handles = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            // Waiting for the permit here bounds spawned tasks, not just
            // running ones, and keeps spawn order equal to chunk order.
            let permit = self.limiter.clone().acquire_owned().await?;
            let proxies = self.proxies.clone();
            let state = self.state.clone();
            let selector = selector.clone();
            let task_timeout = self.task_timeout;

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                dispatch_chunk(
                    chunk,
                    policy,
                    selector,
                    proxies,
                    state,
                    request_id,
                    task_timeout,
                )
                .await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await?);
        }
        results.sort_by_key(|r| r.chunk);

        let failed = results.iter().filter(|r| r.failed).count();
        if failed > 0 {
            warn!(
                "📥 [{}] completed with {} of {} chunk(s) failed",
                request_id,
                failed,
                results.len()
            );
        } else {
            info!(
                "📥 [{}] all {} chunk(s) succeeded",
                request_id,
                results.len()
            );
        }

        Ok(results)
    }
}

/// Progress of one chunk through its retry loop.
#[derive(Debug)]
enum ChunkState {
    /// Not yet handed to any worker
    Pending,
    /// Currently attempted on the worker at this pool index
    Dispatched(usize),
    /// A worker accepted the chunk
    Succeeded(DispatchResult),
    /// The last attempt failed; another worker must be tried
    Retrying,
    /// Every worker in the pool has failed this chunk
    AllFailed,
}

/// Drive one chunk to a terminal state, retrying across the pool.
async fn dispatch_chunk(
    chunk: Chunk,
    policy: LbPolicy,
    selector: Arc<dyn NodeSelector>,
    proxies: Vec<Arc<dyn WorkerProxy>>,
    state: Arc<LoadBalancerState>,
    request_id: Uuid,
    task_timeout: Duration,
) -> DispatchResult {
    let loop_started = Instant::now();
    let mut tried: HashSet<usize> = HashSet::new();
    let mut last_worker_id = String::new();
    let mut chunk_state = ChunkState::Pending;

    loop {
        chunk_state = match chunk_state {
            ChunkState::Pending | ChunkState::Retrying => {
                if tried.len() == proxies.len() {
                    ChunkState::AllFailed
                } else {
                    let picked = selector
                        .select(&proxies, &state, chunk.payload.len())
                        .await;
                    // A selector that ranks the whole pool (the adaptive one
                    // does) may return a worker this chunk already failed
                    // on; substitute the first untried worker in pool order.
                    let target = if tried.contains(&picked) {
                        first_untried(&tried, proxies.len())
                    } else {
                        picked
                    };
                    ChunkState::Dispatched(target)
                }
            }

            ChunkState::Dispatched(idx) => {
                let proxy = &proxies[idx];
                let worker_id = proxy.worker().id.clone();
                last_worker_id = worker_id.clone();
                tried.insert(idx);

                state.begin_attempt(&worker_id).await;
                let attempt_started = Instant::now();
                let outcome = tokio::time::timeout(task_timeout, proxy.execute(&chunk)).await;
                state.finish_attempt(&worker_id).await;
                let attempt_secs = attempt_started.elapsed().as_secs_f64();

                match outcome {
                    Ok(Ok(task)) => {
                        if policy == LbPolicy::AdaptiveScored {
                            // Smooth with the worker's own measurement when it
                            // reports one, the observed wall time otherwise.
                            let observed = task.processing_time.unwrap_or(attempt_secs);
                            state.record_success(&worker_id, observed).await;
                        }

                        let node_used = task.node_used.unwrap_or(worker_id);
                        info!(
                            "✅ [{}] chunk {} done on '{}' in {:.3}s",
                            request_id, chunk.index, node_used, attempt_secs
                        );

                        ChunkState::Succeeded(DispatchResult {
                            chunk: chunk.index,
                            node_used,
                            result: Some(task.result),
                            key: Some(task.key),
                            nonce: Some(task.nonce),
                            processing_time: task.processing_time.unwrap_or(0.0),
                            total_time: attempt_secs,
                            failed: false,
                        })
                    }
                    Ok(Err(e)) => {
                        warn!(
                            "⚠️ [{}] chunk {} failed on '{}': {}",
                            request_id, chunk.index, worker_id, e
                        );
                        ChunkState::Retrying
                    }
                    Err(_) => {
                        warn!(
                            "⚠️ [{}] chunk {} timed out on '{}' after {:.0}s",
                            request_id,
                            chunk.index,
                            worker_id,
                            task_timeout.as_secs_f64()
                        );
                        ChunkState::Retrying
                    }
                }
            }

            ChunkState::Succeeded(result) => return result,

            ChunkState::AllFailed => {
                error!(
                    "❌ [{}] chunk {} failed on every worker in the pool",
                    request_id, chunk.index
                );
                return DispatchResult {
                    chunk: chunk.index,
                    node_used: last_worker_id,
                    result: None,
                    key: None,
                    nonce: None,
                    processing_time: 0.0,
                    total_time: loop_started.elapsed().as_secs_f64(),
                    failed: true,
                };
            }
        };
    }
}

/// First pool index this chunk has not yet been attempted on.
fn first_untried(tried: &HashSet<usize>, pool_len: usize) -> usize {
    (0..pool_len).find(|i| !tried.contains(i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_untried_scans_in_pool_order() {
        let mut tried = HashSet::new();
        tried.insert(0);
        tried.insert(2);
        assert_eq!(first_untried(&tried, 4), 1);

        tried.insert(1);
        assert_eq!(first_untried(&tried, 4), 3);
    }

    #[test]
    fn first_untried_starts_from_the_front() {
        let mut tried = HashSet::new();
        tried.insert(2);
        assert_eq!(first_untried(&tried, 3), 0);
    }
}
