//! # Client Binary Entry Point
//!
//! Uploads one file to the balancer for chunked encryption, reassembles the
//! per-chunk results and persists the ciphertext artifact plus its key/nonce
//! manifest.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin client -- --file video.mp4 --lb-type round_robin
//! ```
//!
//! Exits non-zero when any chunk failed on every worker; the partial
//! artifact and manifest are still written so the caller can decide whether
//! they are acceptable.

use anyhow::{bail, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

use fog_dispatch::balancer::assembler;
use fog_dispatch::balancer::selector::LbPolicy;
use fog_dispatch::client::{persist_artifacts, FogClient};
use fog_dispatch::common::logging::init_logger;

/// Command-line arguments for the client binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to encrypt
    #[arg(short, long)]
    file: PathBuf,

    /// Base URL of the balancer service
    #[arg(long, default_value = "http://127.0.0.1:5006")]
    balancer: String,

    /// Node selection policy: random, round_robin or algo
    #[arg(long, default_value = "random")]
    lb_type: String,

    /// Directory the artifact and manifest are written into
    #[arg(short, long, default_value = "output")]
    out_dir: PathBuf,
}

async fn run(args: Args) -> Result<bool> {
    if LbPolicy::from_wire(&args.lb_type).is_none() {
        bail!(
            "unknown lb_type '{}' (expected random, round_robin or algo)",
            args.lb_type
        );
    }

    let client = FogClient::new(args.balancer)?;

    info!(
        "📤 Uploading '{}' with policy '{}'",
        args.file.display(),
        args.lb_type
    );
    let response = client.process_file(&args.file, &args.lb_type).await?;

    for result in &response.results {
        if result.failed {
            warn!(
                "❌ chunk {}: failed on every worker (last tried '{}', {:.3}s)",
                result.chunk, result.node_used, result.total_time
            );
        } else {
            info!(
                "✅ chunk {}: '{}' in {:.3}s ({:.3}s total)",
                result.chunk, result.node_used, result.processing_time, result.total_time
            );
        }
    }

    let assembled = assembler::assemble(&response.results)?;
    let (artifact_path, manifest_path) =
        persist_artifacts(&args.file, &args.out_dir, &assembled)?;

    info!(
        "💾 Wrote {} ({} bytes) and {}",
        artifact_path.display(),
        assembled.artifact.len(),
        manifest_path.display()
    );

    if !assembled.is_complete() {
        error!(
            "⚠️ artifact is incomplete; missing chunk(s): {:?}",
            assembled.missing_chunks
        );
    }

    Ok(assembled.is_complete())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_logger();

    let args = Args::parse();
    let complete = run(args).await?;

    Ok(if complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
