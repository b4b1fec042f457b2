//! # Result Assembler
//!
//! Turns a set of per-chunk dispatch results back into one artifact:
//! ciphertext bytes concatenated in chunk order, plus the key/nonce manifest
//! needed to decrypt them. Failed chunks are surfaced as explicit missing
//! indices instead of being silently skipped, so a caller can tell a partial
//! artifact from a complete one.

use thiserror::Error;

use crate::common::messages::{DispatchResult, Manifest, ManifestEntry};

/// Reassembly output: the ordered ciphertext and its manifest.
#[derive(Debug, Clone)]
pub struct AssembledArtifact {
    /// Ciphertext of all successful chunks, concatenated in index order
    pub artifact: Vec<u8>,
    /// Key/nonce per successful chunk, in the same order
    pub manifest: Manifest,
    /// Indices of chunks that failed dispatch, in ascending order
    pub missing_chunks: Vec<u64>,
}

impl AssembledArtifact {
    /// True when every chunk made it into the artifact.
    pub fn is_complete(&self) -> bool {
        self.missing_chunks.is_empty()
    }
}

/// A result set that cannot be assembled into an artifact.
///
/// These only arise from malformed worker output that slipped past proxy
/// validation, never from ordinary chunk failures (those are reported via
/// [`AssembledArtifact::missing_chunks`]).
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("chunk {chunk} ciphertext is not valid hex")]
    BadCiphertext {
        chunk: u64,
        #[source]
        source: hex::FromHexError,
    },

    #[error("chunk {chunk} succeeded but carries no ciphertext, key or nonce")]
    IncompleteResult { chunk: u64 },
}

/// Assemble dispatch results into artifact bytes and a manifest.
///
/// The input may arrive in any order; results are sorted by chunk index
/// before concatenation, so assembling a shuffled set and a sorted set of
/// the same results produces identical bytes.
pub fn assemble(results: &[DispatchResult]) -> Result<AssembledArtifact, AssembleError> {
    let mut ordered: Vec<&DispatchResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.chunk);

    let mut artifact = Vec::new();
    let mut entries = Vec::new();
    let mut missing_chunks = Vec::new();

    for result in ordered {
        if result.failed {
            missing_chunks.push(result.chunk);
            continue;
        }

        let (Some(ciphertext), Some(key), Some(nonce)) =
            (&result.result, &result.key, &result.nonce)
        else {
            return Err(AssembleError::IncompleteResult {
                chunk: result.chunk,
            });
        };

        let bytes = hex::decode(ciphertext).map_err(|source| AssembleError::BadCiphertext {
            chunk: result.chunk,
            source,
        })?;
        artifact.extend_from_slice(&bytes);

        entries.push(ManifestEntry {
            chunk: result.chunk,
            key: key.clone(),
            nonce: nonce.clone(),
        });
    }

    Ok(AssembledArtifact {
        artifact,
        manifest: Manifest { chunks: entries },
        missing_chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(chunk: u64, hex_payload: &str) -> DispatchResult {
        DispatchResult {
            chunk,
            node_used: "node-a".to_string(),
            result: Some(hex_payload.to_string()),
            key: Some(format!("{:02x}", chunk)),
            nonce: Some("00".to_string()),
            processing_time: 0.1,
            total_time: 0.2,
            failed: false,
        }
    }

    fn failure(chunk: u64) -> DispatchResult {
        DispatchResult {
            chunk,
            node_used: "node-b".to_string(),
            result: None,
            key: None,
            nonce: None,
            processing_time: 0.0,
            total_time: 0.5,
            failed: true,
        }
    }

    #[test]
    fn concatenates_in_chunk_order_regardless_of_input_order() {
        let sorted = vec![success(0, "0102"), success(1, "0304"), success(2, "05")];
        let shuffled = vec![success(2, "05"), success(0, "0102"), success(1, "0304")];

        let from_sorted = assemble(&sorted).unwrap();
        let from_shuffled = assemble(&shuffled).unwrap();

        assert_eq!(from_sorted.artifact, vec![1, 2, 3, 4, 5]);
        assert_eq!(from_sorted.artifact, from_shuffled.artifact);
        assert!(from_sorted.is_complete());
    }

    #[test]
    fn manifest_entries_follow_chunk_order() {
        let results = vec![success(1, "aa"), success(0, "bb")];

        let assembled = assemble(&results).unwrap();

        let indices: Vec<u64> = assembled.manifest.chunks.iter().map(|e| e.chunk).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn failed_chunks_are_reported_and_left_out_of_the_manifest() {
        let results = vec![success(0, "01"), failure(1), success(2, "03")];

        let assembled = assemble(&results).unwrap();

        assert_eq!(assembled.missing_chunks, vec![1]);
        assert!(!assembled.is_complete());
        assert_eq!(assembled.artifact, vec![1, 3]);
        assert_eq!(assembled.manifest.chunks.len(), 2);
        assert!(assembled.manifest.chunks.iter().all(|e| e.chunk != 1));
    }

    #[test]
    fn invalid_hex_is_an_assembly_error() {
        let results = vec![success(0, "not-hex")];
        assert!(matches!(
            assemble(&results),
            Err(AssembleError::BadCiphertext { chunk: 0, .. })
        ));
    }

    #[test]
    fn successful_result_without_payload_is_rejected() {
        let mut bad = success(0, "01");
        bad.result = None;

        assert!(matches!(
            assemble(&[bad]),
            Err(AssembleError::IncompleteResult { chunk: 0 })
        ));
    }

    #[test]
    fn empty_result_set_assembles_to_empty_artifact() {
        let assembled = assemble(&[]).unwrap();
        assert!(assembled.artifact.is_empty());
        assert!(assembled.manifest.chunks.is_empty());
        assert!(assembled.is_complete());
    }
}
