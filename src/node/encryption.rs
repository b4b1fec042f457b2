//! # Chunk Encryption Service
//!
//! AES-256-GCM encryption of individual chunks. Every chunk gets a freshly
//! generated key and 12-byte nonce, both returned to the caller (the chunk
//! cannot be decrypted without the manifest the balancer's client persists).
//!
//! Encryption is CPU-bound, so it runs on the blocking pool behind a
//! semaphore that caps how many chunks are in flight at once.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// One encrypted chunk with the material needed to decrypt it.
pub struct EncryptedChunk {
    pub ciphertext: Vec<u8>,
    pub key: [u8; 32],
    pub nonce: [u8; 12],
}

/// Bounded AES-256-GCM encryption over the blocking pool.
pub struct EncryptionService {
    semaphore: Arc<Semaphore>,
}

impl EncryptionService {
    /// # Arguments
    /// - `max_parallel`: Maximum chunks encrypted concurrently
    pub fn new(max_parallel: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_parallel)),
        }
    }

    /// Encrypt one chunk under a fresh key and nonce.
    pub async fn encrypt_chunk(&self, data: Bytes) -> anyhow::Result<EncryptedChunk> {
        let _permit = self.semaphore.acquire().await?;

        let encrypted = tokio::task::spawn_blocking(move || encrypt(&data)).await??;
        Ok(encrypted)
    }
}

fn encrypt(data: &[u8]) -> anyhow::Result<EncryptedChunk> {
    let key = Aes256Gcm::generate_key(&mut OsRng);
    let cipher = Aes256Gcm::new(&key);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| anyhow::anyhow!("AES-GCM encryption failed: {}", e))?;

    Ok(EncryptedChunk {
        ciphertext,
        key: key.into(),
        nonce: nonce.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::Nonce;

    #[tokio::test]
    async fn ciphertext_decrypts_with_the_returned_material() {
        let service = EncryptionService::new(2);
        let plain = Bytes::from_static(b"fog dispatch chunk payload");

        let encrypted = service.encrypt_chunk(plain.clone()).await.unwrap();
        assert_ne!(encrypted.ciphertext, plain.to_vec());

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&encrypted.key));
        let decrypted = cipher
            .decrypt(
                Nonce::from_slice(&encrypted.nonce),
                encrypted.ciphertext.as_ref(),
            )
            .unwrap();
        assert_eq!(decrypted, plain.to_vec());
    }

    #[tokio::test]
    async fn every_chunk_gets_fresh_key_and_nonce() {
        let service = EncryptionService::new(2);

        let first = service
            .encrypt_chunk(Bytes::from_static(b"same payload"))
            .await
            .unwrap();
        let second = service
            .encrypt_chunk(Bytes::from_static(b"same payload"))
            .await
            .unwrap();

        assert_ne!(first.key, second.key);
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[tokio::test]
    async fn empty_payload_still_encrypts() {
        let service = EncryptionService::new(1);
        let encrypted = service.encrypt_chunk(Bytes::new()).await.unwrap();
        // GCM appends a 16-byte authentication tag even for empty input.
        assert_eq!(encrypted.ciphertext.len(), 16);
    }
}
