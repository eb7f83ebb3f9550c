// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GELF chunks: one datagram's worth of a larger message.
//!
//! # Chunk Header
//!
//! ```text
//! 0      2                10    11    12
//! +------+----------------+-----+-----+--------------
//! | 1e0f |   message id   | seq | cnt | payload ...
//! +------+----------------+-----+-----+--------------
//! ```
//!
//! - `message id`: 8 opaque bytes chosen by the sender, shared by all chunks
//! - `seq`: zero-based sequence number of this chunk
//! - `cnt`: total number of chunks in the message (at most [`MAX_CHUNKS`])

use crate::error::ChunkError;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Magic bytes prefixing every chunked datagram.
pub const CHUNK_MAGIC: [u8; 2] = [0x1e, 0x0f];

/// Size of the chunk header (magic + id + seq + count).
pub const CHUNK_HEADER_LEN: usize = 12;

/// Maximum number of chunks a GELF message may be split into.
pub const MAX_CHUNKS: u8 = 128;

/// Identifier correlating all chunks of one message.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId([u8; 8]);

impl MessageId {
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl From<[u8; 8]> for MessageId {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_be_bytes())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self)
    }
}

/// Back-reference to the input a datagram arrived on.
///
/// Holds only the input identifier and the remote peer address; the socket
/// itself stays owned by the network layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    input_id: Arc<str>,
    remote: Option<SocketAddr>,
}

impl SourceRef {
    /// Create a source reference for an input.
    pub fn new(input_id: impl Into<Arc<str>>) -> Self {
        Self {
            input_id: input_id.into(),
            remote: None,
        }
    }

    /// Attach the remote peer address.
    pub fn with_remote(mut self, remote: SocketAddr) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn input_id(&self) -> &str {
        &self.input_id
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.remote {
            Some(addr) => write!(f, "{} ({})", self.input_id, addr),
            None => write!(f, "{}", self.input_id),
        }
    }
}

/// One fragment of a multi-part message.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Message this chunk belongs to.
    pub message_id: MessageId,
    /// Zero-based position within the message.
    pub sequence_number: u8,
    /// Total chunk count claimed by this chunk. Only trusted on chunk 0.
    pub sequence_count: u8,
    /// When the chunk was received.
    pub arrival: Instant,
    /// Chunk payload bytes.
    pub payload: Vec<u8>,
    /// Input the chunk arrived on.
    pub source: SourceRef,
}

impl Chunk {
    /// Create a chunk stamped with the current time.
    pub fn new(
        message_id: MessageId,
        sequence_number: u8,
        sequence_count: u8,
        payload: impl Into<Vec<u8>>,
        source: SourceRef,
    ) -> Self {
        Self {
            message_id,
            sequence_number,
            sequence_count,
            arrival: Instant::now(),
            payload: payload.into(),
            source,
        }
    }

    /// Override the arrival time.
    pub fn with_arrival(mut self, arrival: Instant) -> Self {
        self.arrival = arrival;
        self
    }

    /// Check whether a datagram carries the chunk magic bytes.
    pub fn is_chunked(datagram: &[u8]) -> bool {
        datagram.len() >= 2 && datagram[..2] == CHUNK_MAGIC
    }

    /// Decode a chunked datagram.
    pub fn decode(datagram: &[u8], source: SourceRef) -> Result<Self, ChunkError> {
        if datagram.len() < CHUNK_HEADER_LEN {
            return Err(ChunkError::TooShort(datagram.len()));
        }
        if !Self::is_chunked(datagram) {
            return Err(ChunkError::BadMagic);
        }

        let mut id = [0u8; 8];
        id.copy_from_slice(&datagram[2..10]);
        let number = datagram[10];
        let count = datagram[11];

        if count > MAX_CHUNKS {
            return Err(ChunkError::TooManyChunks(count));
        }
        if count == 0 || number >= count {
            return Err(ChunkError::InvalidSequence { number, count });
        }

        Ok(Self::new(
            MessageId::new(id),
            number,
            count,
            &datagram[CHUNK_HEADER_LEN..],
            source,
        ))
    }

    /// Encode the chunk as a datagram (header + payload).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(CHUNK_HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&CHUNK_MAGIC);
        buf.extend_from_slice(self.message_id.as_bytes());
        buf.push(self.sequence_number);
        buf.push(self.sequence_count);
        buf.extend_from_slice(&self.payload);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceRef {
        SourceRef::new("test-input")
    }

    #[test]
    fn test_decode_chunk_header() {
        let mut datagram = vec![0x1e, 0x0f, 1, 2, 3, 4, 5, 6, 7, 8, 2, 5];
        datagram.extend_from_slice(b"payload");

        let chunk = Chunk::decode(&datagram, source()).unwrap();

        assert_eq!(chunk.message_id.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(chunk.sequence_number, 2);
        assert_eq!(chunk.sequence_count, 5);
        assert_eq!(chunk.payload, b"payload");
        assert_eq!(chunk.source.input_id(), "test-input");
    }

    #[test]
    fn test_encode_matches_wire_layout() {
        let chunk = Chunk::new(MessageId::from(0x0102u64), 1, 3, b"xy".to_vec(), source());
        let bytes = chunk.encode();

        assert_eq!(&bytes[..2], &CHUNK_MAGIC);
        assert_eq!(&bytes[2..10], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(bytes[10], 1);
        assert_eq!(bytes[11], 3);
        assert_eq!(&bytes[12..], b"xy");
    }

    #[test]
    fn test_decode_rejects_short_datagram() {
        let result = Chunk::decode(&[0x1e, 0x0f, 1, 2], source());
        assert_eq!(result.unwrap_err(), ChunkError::TooShort(4));
    }

    #[test]
    fn test_decode_rejects_missing_magic() {
        let datagram = [0u8; 16];
        assert_eq!(
            Chunk::decode(&datagram, source()).unwrap_err(),
            ChunkError::BadMagic
        );
    }

    #[test]
    fn test_decode_rejects_bad_sequence() {
        let datagram = [0x1e, 0x0f, 0, 0, 0, 0, 0, 0, 0, 1, 3, 3];
        assert_eq!(
            Chunk::decode(&datagram, source()).unwrap_err(),
            ChunkError::InvalidSequence {
                number: 3,
                count: 3
            }
        );

        let datagram = [0x1e, 0x0f, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0];
        assert!(matches!(
            Chunk::decode(&datagram, source()),
            Err(ChunkError::InvalidSequence { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_too_many_chunks() {
        let datagram = [0x1e, 0x0f, 0, 0, 0, 0, 0, 0, 0, 1, 0, 129];
        assert_eq!(
            Chunk::decode(&datagram, source()).unwrap_err(),
            ChunkError::TooManyChunks(129)
        );
    }

    #[test]
    fn test_message_id_display() {
        let id = MessageId::new([0xde, 0xad, 0xbe, 0xef, 0, 1, 2, 3]);
        assert_eq!(id.to_string(), "deadbeef00010203");
    }

    #[test]
    fn test_source_ref_display() {
        let addr: SocketAddr = "10.0.0.1:5555".parse().unwrap();
        let source = SourceRef::new("udp").with_remote(addr);
        assert_eq!(source.to_string(), "udp (10.0.0.1:5555)");
        assert_eq!(SourceRef::new("udp").to_string(), "udp");
    }
}
