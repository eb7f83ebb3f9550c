// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram classification and payload decompression.
//!
//! GELF senders may compress a message with GZIP or ZLIB before sending it,
//! either in a single datagram or split across chunks. The compression is
//! detected from the leading bytes:
//!
//! | Leading bytes       | Type          |
//! |---------------------|---------------|
//! | `1e 0f`             | chunked       |
//! | `1f 8b`             | GZIP          |
//! | `78 xx` (FCHECK ok) | ZLIB          |
//! | `{` or whitespace   | uncompressed  |

use crate::error::PayloadError;
use flate2::read::{GzDecoder, ZlibDecoder};
use std::borrow::Cow;
use std::io::Read;

/// Default maximum decompressed payload size (8 MiB).
pub const DEFAULT_DECOMPRESS_SIZE_LIMIT: usize = 8 * 1024 * 1024;

/// Payload type detected from leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GelfType {
    Chunked,
    Gzip,
    Zlib,
    Uncompressed,
    Unsupported,
}

impl GelfType {
    /// Classify a datagram or reassembled payload.
    pub fn detect(bytes: &[u8]) -> Self {
        let Some(&first) = bytes.first() else {
            return Self::Unsupported;
        };

        if let Some(&second) = bytes.get(1) {
            match (first, second) {
                (0x1e, 0x0f) => return Self::Chunked,
                (0x1f, 0x8b) => return Self::Gzip,
                (0x78, _) if ((u16::from(first) << 8) | u16::from(second)) % 31 == 0 => {
                    return Self::Zlib
                }
                _ => {}
            }
        }

        if first == b'{' || first.is_ascii_whitespace() {
            Self::Uncompressed
        } else {
            Self::Unsupported
        }
    }
}

/// Return the plain JSON bytes of a (possibly compressed) payload.
///
/// Uncompressed payloads are borrowed; compressed ones are inflated up to
/// `limit` bytes.
pub fn decompress(bytes: &[u8], limit: usize) -> Result<Cow<'_, [u8]>, PayloadError> {
    match GelfType::detect(bytes) {
        GelfType::Uncompressed => Ok(Cow::Borrowed(bytes)),
        GelfType::Gzip => inflate(GzDecoder::new(bytes), limit).map(Cow::Owned),
        GelfType::Zlib => inflate(ZlibDecoder::new(bytes), limit).map(Cow::Owned),
        GelfType::Chunked | GelfType::Unsupported => Err(PayloadError::Unsupported(
            bytes.iter().take(4).copied().collect(),
        )),
    }
}

fn inflate<R: Read>(decoder: R, limit: usize) -> Result<Vec<u8>, PayloadError> {
    let mut out = Vec::new();
    // Read one byte past the limit to detect overflow without inflating everything.
    decoder.take(limit as u64 + 1).read_to_end(&mut out)?;
    if out.len() > limit {
        return Err(PayloadError::SizeLimitExceeded { limit });
    }
    Ok(out)
}
