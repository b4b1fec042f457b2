//! # Balancer Configuration
//!
//! TOML configuration for the balancer service: listen address, chunking and
//! concurrency parameters, network timeouts and the fixed worker pool.
//!
//! ## Example TOML
//!
//! ```toml
//! [balancer]
//! listen_address = "0.0.0.0:5006"
//! chunk_size_bytes = 5242880
//! max_concurrent_dispatches = 32
//!
//! [timeouts]
//! task_secs = 60
//! probe_ms = 1500
//!
//! [[workers]]
//! id = "node-5001"
//! address = "http://127.0.0.1:5001"
//! ```

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::common::config::load_config;
use crate::common::messages::Worker;

/// Complete balancer configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Service-level settings (listen address, chunking, concurrency)
    pub balancer: BalancerSettings,
    /// Network timeouts for worker calls
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    /// The worker pool, in canonical pool order
    pub workers: Vec<Worker>,
}

/// Service-level balancer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerSettings {
    /// Address the HTTP API listens on (e.g. "0.0.0.0:5006")
    pub listen_address: String,
    /// Size of each dispatched chunk in bytes (the last chunk may be smaller)
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
    /// Maximum number of chunks dispatched concurrently
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_dispatches: usize,
}

/// Timeouts applied to outbound worker calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// End-to-end timeout for one task attempt (seconds)
    #[serde(default = "default_task_secs")]
    pub task_secs: u64,
    /// Timeout for one telemetry probe (milliseconds)
    #[serde(default = "default_probe_ms")]
    pub probe_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            task_secs: default_task_secs(),
            probe_ms: default_probe_ms(),
        }
    }
}

impl TimeoutSettings {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }
}

fn default_chunk_size() -> usize {
    5 * 1024 * 1024
}

fn default_max_concurrent() -> usize {
    32
}

fn default_task_secs() -> u64 {
    60
}

fn default_probe_ms() -> u64 {
    1500
}

impl BalancerConfig {
    /// Load and validate a balancer configuration from a TOML file.
    ///
    /// # Arguments
    /// - `path`: Path to the TOML configuration file
    ///
    /// # Returns
    /// - `Ok(BalancerConfig)`: Parsed configuration that passed validation
    /// - `Err`: File I/O, parse or validation error
    pub fn from_file(path: &str) -> Result<Self> {
        let config: BalancerConfig = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the dispatch engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers.is_empty() {
            bail!("configuration lists no workers; at least one [[workers]] entry is required");
        }

        let mut seen = HashSet::new();
        for worker in &self.workers {
            if !seen.insert(worker.id.as_str()) {
                bail!("duplicate worker id '{}' in configuration", worker.id);
            }
        }

        if self.balancer.chunk_size_bytes == 0 {
            bail!("chunk_size_bytes must be greater than zero");
        }
        if self.balancer.max_concurrent_dispatches == 0 {
            bail!("max_concurrent_dispatches must be greater than zero");
        }

        Ok(())
    }
}
