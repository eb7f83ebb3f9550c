// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GELF UDP ingestion.
//!
//! Receives GELF messages over UDP, reassembles chunked messages and turns
//! payloads into structured records for a downstream buffer.
//!
//! # Features
//!
//! - **Chunk reassembly**: out-of-order chunks are merged per message id and
//!   joined once chunk 0 and all announced chunks are present
//! - **Timeout eviction**: a background reaper drops messages whose chunks
//!   stop arriving
//! - **Compression**: GZIP and ZLIB payloads, with a decompression size limit
//! - **Backpressure**: blocking or fail-fast insertion into the downstream buffer
//! - **Metrics**: reassembly counters plus per-input message counters
//!
//! # Example
//!
//! ```rust,ignore
//! use gelf_ingest::{GelfInput, IngestConfig};
//!
//! let config = IngestConfig::builder().port(12201).build()?;
//! let input = GelfInput::start(&config)?;
//!
//! let buffer = input.buffer();
//! while let Some(record) = buffer.recv_timeout(Duration::from_secs(1)) {
//!     println!("{}: {}", record.source, record.message);
//! }
//! ```

mod buffer;
mod chunk;
mod config;
mod error;
mod input;
mod metrics;
mod parser;
mod payload;
mod processor;
mod reaper;
mod receiver;
mod record;
mod table;

pub use buffer::{BoundedBuffer, ProcessBuffer};
pub use chunk::{Chunk, MessageId, SourceRef, CHUNK_HEADER_LEN, CHUNK_MAGIC, MAX_CHUNKS};
pub use config::{BackpressurePolicy, IngestConfig, IngestConfigBuilder};
pub use error::{BufferError, ChunkError, ConfigError, IngestError, PayloadError};
pub use input::GelfInput;
pub use metrics::{IngestMetrics, InputCounters, InputSnapshot, MetricsSnapshot};
pub use parser::GelfParser;
pub use payload::{decompress, GelfType, DEFAULT_DECOMPRESS_SIZE_LIMIT};
pub use processor::{MessageHandler, Processor};
pub use reaper::{sweep, Reaper, SweepStats, DEFAULT_MAX_CHUNK_AGE, DEFAULT_REAPER_INTERVAL};
pub use receiver::{DatagramRouter, StopHandle, UdpReceiver};
pub use record::{is_reserved, FieldValue, MessageRecord, RESERVED_FIELDS};
pub use table::{ReassembledMessage, ReassemblyTable};
