//! # Common Components
//!
//! Shared utilities and data structures used across the balancer, the fog
//! node and the CLI client.
//!
//! ## Modules
//!
//! - [`messages`]: Wire and engine data types (chunks, task results, telemetry)
//! - [`config`]: Configuration parsing utilities
//! - [`logging`]: Logger initialization shared by all binaries

pub mod config;
pub mod logging;
pub mod messages;
