// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message processor.
//!
//! Parses whole or reassembled payloads, validates the resulting record and
//! hands it to the downstream [`ProcessBuffer`]. Two entry points share the
//! same parse/validate step and differ only in how they insert:
//!
//! - [`Processor::handle`] waits for buffer capacity and absorbs every
//!   failure locally (logged and counted).
//! - [`Processor::handle_fail_fast`] never waits and returns
//!   [`IngestError::Backpressure`] / [`IngestError::ProcessingDisabled`] to
//!   the caller.

use crate::buffer::ProcessBuffer;
use crate::chunk::SourceRef;
use crate::config::BackpressurePolicy;
use crate::error::{BufferError, IngestError};
use crate::metrics::{IngestMetrics, InputCounters};
use crate::parser::GelfParser;
use crate::record::MessageRecord;
use crate::table::ReassembledMessage;
use std::sync::Arc;

/// Receiver of reassembled messages, driven by the reaper.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, message: ReassembledMessage) -> Result<(), IngestError>;
}

impl<F> MessageHandler for F
where
    F: Fn(ReassembledMessage) -> Result<(), IngestError> + Send + Sync,
{
    fn on_message(&self, message: ReassembledMessage) -> Result<(), IngestError> {
        self(message)
    }
}

#[derive(Debug, Clone, Copy)]
enum Insertion {
    Blocking,
    FailFast,
}

/// Parses, validates and forwards messages downstream.
pub struct Processor {
    parser: GelfParser,
    buffer: Arc<dyn ProcessBuffer>,
    metrics: Arc<IngestMetrics>,
    policy: BackpressurePolicy,
}

impl Processor {
    pub fn new(
        parser: GelfParser,
        buffer: Arc<dyn ProcessBuffer>,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            parser,
            buffer,
            metrics,
            policy: BackpressurePolicy::default(),
        }
    }

    /// Set the policy used by [`Processor::dispatch`].
    pub fn with_policy(mut self, policy: BackpressurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    /// Best-effort ingestion.
    ///
    /// Malformed and incomplete messages are dropped; if the buffer is full
    /// this blocks until it has room.
    pub fn handle(&self, payload: &[u8], source: &SourceRef) {
        match self.process(payload, source, Insertion::Blocking) {
            Ok(()) => {}
            // Already logged and counted by validate_and_build_record.
            Err(IngestError::MalformedPayload(_)) | Err(IngestError::IncompleteRecord { .. }) => {}
            Err(IngestError::BufferClosed) => {
                tracing::debug!(input = %source.input_id(), "Buffer closed, dropping message");
            }
            Err(e) => {
                tracing::warn!(input = %source.input_id(), error = %e, "Dropping message");
            }
        }
    }

    /// Non-blocking ingestion; insertion failures are returned to the caller.
    pub fn handle_fail_fast(&self, payload: &[u8], source: &SourceRef) -> Result<(), IngestError> {
        self.process(payload, source, Insertion::FailFast)
    }

    /// Route through [`Processor::handle`] or [`Processor::handle_fail_fast`]
    /// according to the configured policy.
    pub fn dispatch(&self, payload: &[u8], source: &SourceRef) -> Result<(), IngestError> {
        match self.policy {
            BackpressurePolicy::Block => {
                self.handle(payload, source);
                Ok(())
            }
            BackpressurePolicy::FailFast => self.handle_fail_fast(payload, source),
        }
    }

    /// Parse the payload and check the record is complete.
    ///
    /// Failures are logged and counted against the input before being
    /// returned.
    pub fn validate_and_build_record(
        &self,
        payload: &[u8],
        source: &SourceRef,
    ) -> Result<MessageRecord, IngestError> {
        let counters = self.metrics.input(source.input_id());
        self.build_record(payload, source, &counters)
    }

    fn build_record(
        &self,
        payload: &[u8],
        source: &SourceRef,
        counters: &InputCounters,
    ) -> Result<MessageRecord, IngestError> {
        let record = match self.parser.parse(payload, source) {
            Ok(record) => record,
            Err(e) => {
                counters.increment_malformed();
                tracing::warn!(
                    input = %source.input_id(),
                    remote = ?source.remote(),
                    error = %e,
                    "Could not parse message, dropping"
                );
                return Err(e);
            }
        };

        if let Some(reason) = record.incomplete_reason() {
            counters.increment_incomplete();
            tracing::debug!(
                input = %source.input_id(),
                reason,
                "Dropping incomplete message"
            );
            return Err(IngestError::IncompleteRecord { reason });
        }

        Ok(record)
    }

    fn process(
        &self,
        payload: &[u8],
        source: &SourceRef,
        insertion: Insertion,
    ) -> Result<(), IngestError> {
        let counters = self.metrics.input(source.input_id());
        counters.increment_incoming();

        let record = self.build_record(payload, source, &counters)?;

        let inserted = match insertion {
            Insertion::Blocking => self.buffer.insert_blocking(record),
            Insertion::FailFast => self.buffer.insert_fail_fast(record),
        };

        match inserted {
            Ok(()) => {
                counters.increment_processed();
                Ok(())
            }
            Err(e) => {
                if matches!(e, BufferError::Full | BufferError::ProcessingDisabled) {
                    counters.increment_rejected();
                }
                Err(e.into())
            }
        }
    }
}

impl MessageHandler for Processor {
    fn on_message(&self, message: ReassembledMessage) -> Result<(), IngestError> {
        self.dispatch(&message.payload, &message.source)
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("parser", &self.parser)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
