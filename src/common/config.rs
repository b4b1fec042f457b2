//! # Configuration Utilities
//!
//! Shared configuration parsing used by the balancer and CLI binaries.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Arguments
/// - `path`: Path to the TOML configuration file
///
/// # Returns
/// - `Ok(T)`: Successfully loaded and parsed configuration
/// - `Err`: File I/O or parsing error, naming the offending file
///
/// # Example
/// ```ignore
/// let config: BalancerConfig = load_config("configs/balancer.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading configuration file '{}'", path))?;
    let config: T =
        toml::from_str(&content).with_context(|| format!("parsing '{}' as TOML", path))?;
    Ok(config)
}
