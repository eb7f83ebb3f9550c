// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Downstream processing buffer.
//!
//! The processor hands finished records to a [`ProcessBuffer`]. Two
//! insertion modes exist: blocking, which waits for capacity, and
//! fail-fast, which returns [`BufferError::Full`] immediately so the
//! caller can reject the message.
//!
//! Closing a [`BoundedBuffer`] releases blocked producers with
//! [`BufferError::Closed`]; records already queued stay readable.

use crate::error::BufferError;
use crate::record::MessageRecord;
use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How often a blocked insert re-checks the closed flag.
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sink for parsed records.
pub trait ProcessBuffer: Send + Sync {
    /// Insert a record, waiting for capacity if needed.
    fn insert_blocking(&self, record: MessageRecord) -> Result<(), BufferError>;

    /// Insert a record, failing immediately if there is no capacity.
    fn insert_fail_fast(&self, record: MessageRecord) -> Result<(), BufferError>;
}

/// Bounded in-memory buffer backed by a crossbeam channel.
///
/// Processing can be paused; while paused, fail-fast inserts are refused
/// with [`BufferError::ProcessingDisabled`] and blocking inserts still
/// queue until the buffer is full.
#[derive(Debug)]
pub struct BoundedBuffer {
    tx: Sender<MessageRecord>,
    rx: Receiver<MessageRecord>,
    processing: AtomicBool,
    closed: AtomicBool,
}

impl BoundedBuffer {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = channel::bounded(capacity);
        Self {
            tx,
            rx,
            processing: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    /// Consumer side of the buffer. Each call returns a new handle on the
    /// same queue.
    pub fn receiver(&self) -> Receiver<MessageRecord> {
        self.rx.clone()
    }

    /// Pop one record, waiting up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<MessageRecord> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn pause_processing(&self) {
        self.processing.store(false, Ordering::Release);
    }

    pub fn resume_processing(&self) {
        self.processing.store(true, Ordering::Release);
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Refuse further inserts and wake producers waiting for capacity.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }
}

impl ProcessBuffer for BoundedBuffer {
    fn insert_blocking(&self, mut record: MessageRecord) -> Result<(), BufferError> {
        loop {
            if self.is_closed() {
                return Err(BufferError::Closed);
            }
            match self.tx.send_timeout(record, CLOSE_POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => record = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(BufferError::Closed),
            }
        }
    }

    fn insert_fail_fast(&self, record: MessageRecord) -> Result<(), BufferError> {
        if self.is_closed() {
            return Err(BufferError::Closed);
        }
        if !self.is_processing() {
            return Err(BufferError::ProcessingDisabled);
        }
        self.tx.try_send(record).map_err(|e| match e {
            TrySendError::Full(_) => BufferError::Full,
            TrySendError::Disconnected(_) => BufferError::Closed,
        })
    }
}
