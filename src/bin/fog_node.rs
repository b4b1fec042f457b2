//! # Fog Node Binary Entry Point
//!
//! Runs one worker process: accepts raw chunks on `POST /task`, encrypts
//! each under a fresh AES-256-GCM key/nonce, and reports its own load on
//! `GET /health`.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin fog-node -- --id node-5001 --listen 0.0.0.0:5001
//! ```

use clap::Parser;

use fog_dispatch::common::logging::init_logger;
use fog_dispatch::node::api;

/// Command-line arguments for the fog node binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Worker identity reported back to the balancer (e.g. node-5001)
    #[arg(long)]
    id: String,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:5001")]
    listen: String,

    /// Maximum number of chunks encrypted concurrently
    #[arg(long, default_value_t = 4)]
    max_parallel: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    api::serve(args.id, &args.listen, args.max_parallel).await
}
