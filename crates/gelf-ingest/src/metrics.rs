// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ingestion counters.
//!
//! Reassembly counters are global to a table/reaper pair; message counters
//! are scoped per input so a failing input stands out from healthy ones.
//!
//! Thread-safe: all counters are `AtomicU64` with `Relaxed` ordering, they
//! are monotonic and write-only from the hot path.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters shared by the receive path, the reaper and the processor.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    chunks_received: AtomicU64,
    duplicate_chunks: AtomicU64,
    complete_messages: AtomicU64,
    outdated_messages_dropped: AtomicU64,
    outdated_chunks_dropped: AtomicU64,
    handoff_failures: AtomicU64,
    waiting_messages: AtomicU64,
    inputs: DashMap<String, Arc<InputCounters>>,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_chunks_received(&self) {
        self.chunks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_duplicate_chunks(&self) {
        self.duplicate_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_complete_messages(&self) {
        self.complete_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one outdated message and the chunks it held.
    pub fn record_outdated(&self, chunks: usize) {
        self.outdated_messages_dropped.fetch_add(1, Ordering::Relaxed);
        self.outdated_chunks_dropped
            .fetch_add(chunks as u64, Ordering::Relaxed);
    }

    pub fn increment_handoff_failures(&self) {
        self.handoff_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of messages still waiting for chunks, as of the last sweep.
    pub fn set_waiting_messages(&self, count: usize) {
        self.waiting_messages.store(count as u64, Ordering::Relaxed);
    }

    pub fn outdated_messages_dropped(&self) -> u64 {
        self.outdated_messages_dropped.load(Ordering::Relaxed)
    }

    pub fn complete_messages(&self) -> u64 {
        self.complete_messages.load(Ordering::Relaxed)
    }

    /// Counters for one input, created on first use.
    pub fn input(&self, input_id: &str) -> Arc<InputCounters> {
        if let Some(counters) = self.inputs.get(input_id) {
            return Arc::clone(&counters);
        }
        Arc::clone(
            &self
                .inputs
                .entry(input_id.to_string())
                .or_insert_with(|| Arc::new(InputCounters::default())),
        )
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            duplicate_chunks: self.duplicate_chunks.load(Ordering::Relaxed),
            complete_messages: self.complete_messages.load(Ordering::Relaxed),
            outdated_messages_dropped: self.outdated_messages_dropped.load(Ordering::Relaxed),
            outdated_chunks_dropped: self.outdated_chunks_dropped.load(Ordering::Relaxed),
            handoff_failures: self.handoff_failures.load(Ordering::Relaxed),
            waiting_messages: self.waiting_messages.load(Ordering::Relaxed),
            inputs: self
                .inputs
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().snapshot()))
                .collect(),
        }
    }
}

/// Per-input message counters.
#[derive(Debug, Default)]
pub struct InputCounters {
    incoming: AtomicU64,
    incomplete: AtomicU64,
    processed: AtomicU64,
    malformed: AtomicU64,
    rejected: AtomicU64,
}

impl InputCounters {
    pub fn increment_incoming(&self) {
        self.incoming.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_incomplete(&self) {
        self.incomplete.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            incoming: self.incoming.load(Ordering::Relaxed),
            incomplete: self.incomplete.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of one input's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub incoming: u64,
    pub incomplete: u64,
    pub processed: u64,
    pub malformed: u64,
    pub rejected: u64,
}

/// Snapshot of all ingestion counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub chunks_received: u64,
    pub duplicate_chunks: u64,
    pub complete_messages: u64,
    pub outdated_messages_dropped: u64,
    pub outdated_chunks_dropped: u64,
    pub handoff_failures: u64,
    pub waiting_messages: u64,
    pub inputs: BTreeMap<String, InputSnapshot>,
}

impl MetricsSnapshot {
    /// Counters for one input (zeroes if it never saw traffic).
    pub fn input(&self, input_id: &str) -> InputSnapshot {
        self.inputs.get(input_id).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_counters_are_scoped() {
        let metrics = IngestMetrics::new();

        metrics.input("a").increment_incoming();
        metrics.input("a").increment_processed();
        metrics.input("b").increment_incoming();
        metrics.input("b").increment_incomplete();

        let snap = metrics.snapshot();
        assert_eq!(snap.input("a").incoming, 1);
        assert_eq!(snap.input("a").processed, 1);
        assert_eq!(snap.input("a").incomplete, 0);
        assert_eq!(snap.input("b").incomplete, 1);
        assert_eq!(snap.input("missing"), InputSnapshot::default());
    }

    #[test]
    fn test_input_returns_same_counters() {
        let metrics = IngestMetrics::new();
        let first = metrics.input("udp");
        let second = metrics.input("udp");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_record_outdated() {
        let metrics = IngestMetrics::new();
        metrics.record_outdated(2);
        metrics.record_outdated(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.outdated_messages_dropped, 2);
        assert_eq!(snap.outdated_chunks_dropped, 5);
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(IngestMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.increment_chunks_received();
                        metrics.input("udp").increment_incoming();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.chunks_received, 4000);
        assert_eq!(snap.input("udp").incoming, 4000);
    }
}
