//! Chunk framing codec for TCP.
//!
//! Inbound bytes are split into chunks of at most `max_chunk` bytes; each chunk
//! is trimmed of leading and trailing line noise (`\n`, `\r`, `\t`) and dropped
//! if nothing remains. Outbound bytes are written verbatim.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Default read chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

const LINE_NOISE: &[u8] = b"\n\r\t";

/// Trims leading and trailing `\n`, `\r` and `\t` bytes.
#[must_use]
pub fn trim_line_noise(chunk: &[u8]) -> &[u8] {
    let start = chunk
        .iter()
        .position(|b| !LINE_NOISE.contains(b))
        .unwrap_or(chunk.len());
    let end = chunk
        .iter()
        .rposition(|b| !LINE_NOISE.contains(b))
        .map_or(start, |i| i + 1);
    &chunk[start..end]
}

/// Unframed codec yielding trimmed, non-empty chunks.
#[derive(Debug, Clone)]
pub struct ChunkCodec {
    max_chunk: usize,
}

impl ChunkCodec {
    /// Creates a new codec with the specified maximum chunk size.
    ///
    /// A size of zero falls back to [`DEFAULT_CHUNK_SIZE`].
    #[must_use]
    pub fn new(max_chunk: usize) -> Self {
        Self {
            max_chunk: if max_chunk == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                max_chunk
            },
        }
    }

    /// Returns the maximum chunk size.
    #[must_use]
    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl Decoder for ChunkCodec {
    type Item = Bytes;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Every buffered byte is consumed; noise-only chunks vanish here.
        while !src.is_empty() {
            let take = src.len().min(self.max_chunk);
            let chunk = src.split_to(take).freeze();
            let trimmed = trim_line_noise(&chunk);
            if !trimmed.is_empty() {
                return Ok(Some(chunk.slice_ref(trimmed)));
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decode(buf)
    }
}

impl Encoder<Bytes> for ChunkCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

impl Encoder<&[u8]> for ChunkCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(item);
        Ok(())
    }
}
