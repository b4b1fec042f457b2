//! # Balancer Binary Entry Point
//!
//! Thin wrapper that loads the balancer configuration and serves the
//! dispatch engine's HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin balancer -- --config configs/balancer.toml
//! ```
//!
//! The balancer will:
//! 1. Load the worker pool and engine settings from the TOML file
//! 2. Build one HTTP proxy per configured worker
//! 3. Serve `POST /process_file`, `GET /nodes_status` and `GET /health`

use clap::Parser;

use fog_dispatch::balancer::{api, BalancerConfig};
use fog_dispatch::common::logging::init_logger;

/// Command-line arguments for the balancer binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the balancer configuration file (TOML format)
    ///
    /// Example: configs/balancer.toml
    #[arg(short, long)]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();
    let config = BalancerConfig::from_file(&args.config)?;

    api::serve(config).await
}
