//! # Balancer Components
//!
//! The dispatch engine and its HTTP surface. An uploaded file flows through
//! these modules in order:
//!
//! 1. [`splitter`]: slice the upload into fixed-size chunks
//! 2. [`selector`]: pick a worker per chunk (random, round-robin or adaptive)
//! 3. [`dispatcher`]: concurrent per-chunk dispatch with retry across the pool
//! 4. [`assembler`]: reassemble ciphertext in chunk order plus the manifest
//!
//! Supporting modules: [`state`] holds the process-wide selection state,
//! [`probe`] pulls worker telemetry for scoring and status, [`config`] loads
//! the TOML configuration and [`api`] exposes everything over HTTP.

pub mod api;
pub mod assembler;
pub mod config;
pub mod dispatcher;
pub mod probe;
pub mod selector;
pub mod splitter;
pub mod state;

pub use config::BalancerConfig;
pub use dispatcher::Dispatcher;
pub use selector::{LbPolicy, NodeSelector};
