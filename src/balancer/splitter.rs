//! # Chunk Splitter
//!
//! Slices an uploaded file into fixed-size chunks for dispatch. Chunks are
//! zero-copy views into the upload buffer, so handing the same chunk to
//! several workers during retries never duplicates payload bytes.

use bytes::Bytes;

use crate::common::messages::Chunk;

/// Splits input bytes into chunks of a fixed size.
///
/// For content of length `L` and chunk size `C` the splitter yields
/// `ceil(L / C)` chunks; every chunk is exactly `C` bytes except possibly the
/// last, and no chunk is ever empty. Zero-length content yields no chunks.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    chunk_size: usize,
}

impl ChunkSplitter {
    /// # Arguments
    /// - `chunk_size`: Bytes per chunk; must be non-zero (enforced by
    ///   configuration validation)
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Slice `content` into contiguous, index-ordered chunks.
    pub fn split(&self, content: Bytes) -> Vec<Chunk> {
        let mut chunks = Vec::with_capacity(content.len().div_ceil(self.chunk_size));
        let mut offset = 0usize;
        let mut index = 0u64;

        while offset < content.len() {
            let end = usize::min(offset + self.chunk_size, content.len());
            chunks.push(Chunk {
                index,
                offset: offset as u64,
                payload: content.slice(offset..end),
            });
            index += 1;
            offset = end;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_ceiling_of_length_over_chunk_size() {
        let splitter = ChunkSplitter::new(5);

        assert_eq!(splitter.split(Bytes::from(vec![0u8; 12])).len(), 3);
        assert_eq!(splitter.split(Bytes::from(vec![0u8; 10])).len(), 2);
        assert_eq!(splitter.split(Bytes::from(vec![0u8; 4])).len(), 1);
    }

    #[test]
    fn chunk_payloads_cover_the_input_exactly() {
        let content: Vec<u8> = (0..23u8).collect();
        let splitter = ChunkSplitter::new(5);

        let chunks = splitter.split(Bytes::from(content.clone()));

        let total: usize = chunks.iter().map(|c| c.payload.len()).sum();
        assert_eq!(total, content.len());

        let mut rebuilt = Vec::new();
        for chunk in &chunks {
            rebuilt.extend_from_slice(&chunk.payload);
        }
        assert_eq!(rebuilt, content);
    }

    #[test]
    fn indices_are_contiguous_and_offsets_match() {
        let splitter = ChunkSplitter::new(4);
        let chunks = splitter.split(Bytes::from(vec![7u8; 11]));

        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, expected as u64);
            assert_eq!(chunk.offset, (expected * 4) as u64);
        }
        assert_eq!(chunks.last().unwrap().payload.len(), 3);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let splitter = ChunkSplitter::new(5);
        assert!(splitter.split(Bytes::new()).is_empty());
    }

    #[test]
    fn no_chunk_is_empty() {
        let splitter = ChunkSplitter::new(5);
        // Length that is an exact multiple must not produce a trailing empty chunk.
        let chunks = splitter.split(Bytes::from(vec![0u8; 15]));
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| !c.payload.is_empty()));
    }
}
