//! # CLI Client Support
//!
//! Submits one file to the balancer's `/process_file` endpoint and persists
//! the reassembled output: the ciphertext artifact (`<name>.enc`) and the
//! key/nonce manifest (`<name>.meta.json`) needed to decrypt it.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::balancer::assembler::AssembledArtifact;
use crate::common::messages::ProcessFileResponse;

/// HTTP client for the balancer service.
pub struct FogClient {
    http: reqwest::Client,
    balancer_url: String,
}

impl FogClient {
    /// # Arguments
    /// - `balancer_url`: Base URL of the balancer (e.g. "http://127.0.0.1:5006")
    pub fn new(balancer_url: String) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, balancer_url })
    }

    /// Upload a file for chunked encryption under the named policy.
    ///
    /// # Arguments
    /// - `path`: File to encrypt
    /// - `lb_type`: Wire name of the selection policy (`random`,
    ///   `round_robin` or `algo`)
    ///
    /// # Returns
    /// - `Ok(ProcessFileResponse)`: Per-chunk results, sorted by chunk index
    /// - `Err`: File I/O, transport or balancer-side error
    pub async fn process_file(&self, path: &Path, lb_type: &str) -> Result<ProcessFileResponse> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());

        let part = reqwest::multipart::Part::bytes(data).file_name(filename);
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("lb_type", lb_type.to_string());

        let response = self
            .http
            .post(format!("{}/process_file", self.balancer_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("balancer answered HTTP {}", response.status());
        }

        Ok(response.json().await?)
    }
}

/// Write the artifact and its manifest next to each other in `out_dir`.
///
/// # Arguments
/// - `input`: Path of the original file (its name seeds the output names)
/// - `out_dir`: Directory for the two outputs; created if missing
/// - `assembled`: Reassembly output to persist
///
/// # Returns
/// Paths of the written artifact and manifest, in that order.
pub fn persist_artifacts(
    input: &Path,
    out_dir: &Path,
    assembled: &AssembledArtifact,
) -> Result<(PathBuf, PathBuf)> {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let artifact_path = out_dir.join(format!("{}.enc", name));
    let manifest_path = out_dir.join(format!("{}.meta.json", name));

    fs::write(&artifact_path, &assembled.artifact)
        .with_context(|| format!("writing {}", artifact_path.display()))?;

    let manifest_json = serde_json::to_string_pretty(&assembled.manifest)?;
    fs::write(&manifest_path, manifest_json)
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    Ok((artifact_path, manifest_path))
}
