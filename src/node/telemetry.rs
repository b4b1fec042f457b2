//! # Node Telemetry
//!
//! Load figures a fog node reports through its `/health` endpoint: global
//! CPU usage, used-memory percentage and the number of encryption tasks
//! currently running. The balancer's adaptive policy feeds these straight
//! into its scoring formula, so the percentages use the same 0-100 scale the
//! score expects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use sysinfo::System;

/// Live load snapshot provider for one fog node.
#[derive(Debug, Clone)]
pub struct NodeTelemetry {
    /// Number of encryption tasks currently being processed
    tasks_running: Arc<AtomicU64>,
    /// Total number of tasks processed over the node's lifetime (for statistics)
    total_tasks: Arc<AtomicU64>,
    /// System information provider for CPU and memory metrics
    system: Arc<std::sync::Mutex<System>>,
}

impl NodeTelemetry {
    /// Create a new telemetry instance with all counters at zero.
    pub fn new() -> Self {
        Self {
            tasks_running: Arc::new(AtomicU64::new(0)),
            total_tasks: Arc::new(AtomicU64::new(0)),
            system: Arc::new(std::sync::Mutex::new(System::new_all())),
        }
    }

    /// Current CPU usage as a percentage (0.0 to 100.0), averaged across cores.
    pub fn cpu_percent(&self) -> f64 {
        let mut sys = self.system.lock().unwrap();

        // Refresh CPU information to get current readings
        sys.refresh_cpu_all();

        sys.global_cpu_usage() as f64
    }

    /// Used memory as a percentage (0.0 to 100.0).
    pub fn ram_percent(&self) -> f64 {
        let mut sys = self.system.lock().unwrap();

        // Refresh memory information
        sys.refresh_memory();

        let total = sys.total_memory();
        let available = sys.available_memory();

        if total == 0 {
            return 0.0;
        }

        let used = total.saturating_sub(available);
        (used as f64 / total as f64) * 100.0
    }

    /// Number of encryption tasks currently in progress.
    pub fn tasks_running(&self) -> u64 {
        self.tasks_running.load(Ordering::Relaxed)
    }

    /// Total tasks processed since startup.
    pub fn total_tasks(&self) -> u64 {
        self.total_tasks.load(Ordering::Relaxed)
    }

    /// Increment the running-task counter when a task starts processing.
    pub fn task_started(&self) {
        self.tasks_running.fetch_add(1, Ordering::Relaxed);
        self.total_tasks.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the running-task counter when a task completes (success or failure).
    pub fn task_finished(&self) {
        self.tasks_running.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Default for NodeTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
