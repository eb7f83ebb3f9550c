// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Background sweeper for the reassembly table.
//!
//! Every period the reaper walks a snapshot of the in-flight message ids
//! and, for each one:
//!
//! 1. drops it if any chunk is older than the maximum age,
//! 2. otherwise, if complete, removes it and hands the joined payload to a
//!    [`MessageHandler`].
//!
//! The outdated check runs first, so a message that is complete but already
//! stale is dropped rather than forwarded. Handler errors and panics are
//! contained per message; the loop keeps running until [`Reaper::stop`].

use crate::metrics::IngestMetrics;
use crate::processor::MessageHandler;
use crate::table::ReassemblyTable;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Default staleness threshold for in-flight messages.
pub const DEFAULT_MAX_CHUNK_AGE: Duration = Duration::from_secs(5);
/// Default sweep period.
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of a single sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Complete messages handed to the handler.
    pub forwarded: usize,
    /// Outdated messages dropped.
    pub outdated: usize,
    /// Handler calls that returned an error or panicked.
    pub failed: usize,
}

/// Run one sweep over `table`.
pub fn sweep(
    table: &ReassemblyTable,
    handler: &dyn MessageHandler,
    metrics: &IngestMetrics,
    max_age: Duration,
) -> SweepStats {
    let mut stats = SweepStats::default();

    for id in table.message_ids() {
        if let Some(chunks) = table.take_outdated(&id, max_age) {
            metrics.record_outdated(chunks);
            stats.outdated += 1;
            tracing::debug!(
                message_id = %id,
                chunks,
                "Message not complete within {:?}, dropping",
                max_age
            );
            continue;
        }

        let Some(message) = table.take_complete(&id) else {
            continue;
        };

        metrics.increment_complete_messages();
        tracing::trace!(message_id = %id, bytes = message.payload.len(), "Message complete");

        match panic::catch_unwind(AssertUnwindSafe(|| handler.on_message(message))) {
            Ok(Ok(())) => stats.forwarded += 1,
            Ok(Err(e)) => {
                metrics.increment_handoff_failures();
                stats.failed += 1;
                tracing::warn!(message_id = %id, error = %e, "Failed to hand off reassembled message");
            }
            Err(_) => {
                metrics.increment_handoff_failures();
                stats.failed += 1;
                tracing::warn!(message_id = %id, "Message handler panicked");
            }
        }
    }

    metrics.set_waiting_messages(table.len());
    stats
}

/// Handle to the running reaper thread.
///
/// Dropping the handle stops the thread after its current sweep.
pub struct Reaper {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Reaper {
    /// Start sweeping `table` every `interval`.
    pub fn spawn(
        table: Arc<ReassemblyTable>,
        handler: Arc<dyn MessageHandler>,
        metrics: Arc<IngestMetrics>,
        max_age: Duration,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let thread = std::thread::Builder::new()
            .name("gelf-chunk-reaper".to_string())
            .spawn(move || {
                tracing::debug!(?interval, ?max_age, "Chunk reaper started");

                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        sweep(&table, handler.as_ref(), &metrics, max_age)
                    }));
                    if result.is_err() {
                        tracing::error!("Chunk reaper sweep panicked, continuing");
                    }
                }

                tracing::debug!(waiting = table.len(), "Chunk reaper stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Signal the thread to stop and wait for it.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}
