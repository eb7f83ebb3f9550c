// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the ingestion path.

use crate::chunk::MessageId;
use thiserror::Error;

/// Errors surfaced by the table, parser and processor.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Payload could not be decoded at all. Terminal for the message.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Payload decoded but lacks mandatory fields. Terminal for the message.
    #[error("Incomplete record: {reason}")]
    IncompleteRecord { reason: &'static str },

    /// Reassembly requested for an id the table does not hold.
    #[error("Unknown message <{0}>")]
    UnknownMessage(MessageId),

    /// Downstream buffer has no free capacity (fail-fast path only).
    #[error("Downstream buffer full")]
    Backpressure,

    /// Downstream processing is disabled (fail-fast path only).
    #[error("Message processing is disabled")]
    ProcessingDisabled,

    /// Downstream buffer has been shut down.
    #[error("Downstream buffer closed")]
    BufferClosed,
}

impl From<PayloadError> for IngestError {
    fn from(err: PayloadError) -> Self {
        Self::MalformedPayload(err.to_string())
    }
}

impl From<BufferError> for IngestError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::Full => Self::Backpressure,
            BufferError::ProcessingDisabled => Self::ProcessingDisabled,
            BufferError::Closed => Self::BufferClosed,
        }
    }
}

/// Wire-level chunk header errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("Chunk too short ({0} bytes)")]
    TooShort(usize),

    #[error("Missing chunk magic bytes")]
    BadMagic,

    #[error("Invalid sequence {number}/{count}")]
    InvalidSequence { number: u8, count: u8 },

    #[error("Sequence count {0} exceeds chunk limit")]
    TooManyChunks(u8),
}

/// Payload decoding errors (classification and decompression).
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Unsupported payload type (first bytes {0:02x?})")]
    Unsupported(Vec<u8>),

    #[error("Decompression failed: {0}")]
    Decompress(#[from] std::io::Error),

    #[error("Decompressed size exceeds limit of {limit} bytes")]
    SizeLimitExceeded { limit: usize },
}

/// Downstream buffer insertion errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("buffer full")]
    Full,

    #[error("processing disabled")]
    ProcessingDisabled,

    #[error("buffer closed")]
    Closed,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
