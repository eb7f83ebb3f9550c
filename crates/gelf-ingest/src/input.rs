// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Assembled GELF UDP input.
//!
//! Wires one socket, one reassembly table, one reaper and one processor
//! around a shared [`BoundedBuffer`].

use crate::buffer::{BoundedBuffer, ProcessBuffer};
use crate::config::IngestConfig;
use crate::metrics::{IngestMetrics, MetricsSnapshot};
use crate::parser::GelfParser;
use crate::processor::{MessageHandler, Processor};
use crate::reaper::Reaper;
use crate::receiver::{DatagramRouter, StopHandle, UdpReceiver};
use crate::table::ReassemblyTable;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

/// A running GELF UDP input.
pub struct GelfInput {
    table: Arc<ReassemblyTable>,
    buffer: Arc<BoundedBuffer>,
    metrics: Arc<IngestMetrics>,
    reaper: Reaper,
    receiver: UdpReceiver,
}

impl GelfInput {
    /// Bind the socket and start the receive and reaper threads.
    pub fn start(config: &IngestConfig) -> io::Result<Self> {
        let table = Arc::new(ReassemblyTable::new());
        let buffer = Arc::new(BoundedBuffer::new(config.buffer_capacity));
        let metrics = Arc::new(IngestMetrics::new());

        let processor = Arc::new(
            Processor::new(
                GelfParser::new(config.decompress_size_limit),
                Arc::clone(&buffer) as Arc<dyn ProcessBuffer>,
                Arc::clone(&metrics),
            )
            .with_policy(config.backpressure),
        );

        let reaper = Reaper::spawn(
            Arc::clone(&table),
            Arc::clone(&processor) as Arc<dyn MessageHandler>,
            Arc::clone(&metrics),
            config.max_chunk_age(),
            config.reaper_interval(),
        )?;

        let router = DatagramRouter::new(
            config.input_id.as_str(),
            Arc::clone(&table),
            processor,
            Arc::clone(&metrics),
        );
        let receiver = UdpReceiver::spawn(config, router)?;

        Ok(Self {
            table,
            buffer,
            metrics,
            reaper,
            receiver,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.receiver.local_addr()
    }

    /// Downstream buffer holding parsed records.
    pub fn buffer(&self) -> Arc<BoundedBuffer> {
        Arc::clone(&self.buffer)
    }

    pub fn metrics(&self) -> Arc<IngestMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.receiver.stop_handle()
    }

    /// Stop both threads and return the final counters.
    ///
    /// The buffer is closed first so a thread waiting for capacity cannot
    /// hold up the join. Records already buffered stay readable; messages
    /// still waiting for chunks are discarded.
    pub fn shutdown(mut self) -> MetricsSnapshot {
        self.receiver.stop_handle().stop();
        self.buffer.close();
        self.receiver.stop();
        self.reaper.stop();

        let discarded = self.table.len();
        if discarded > 0 {
            tracing::debug!(discarded, "Discarding incomplete messages on shutdown");
        }
        self.metrics.set_waiting_messages(discarded);
        self.metrics.snapshot()
    }
}

impl Drop for GelfInput {
    fn drop(&mut self) {
        // Release blocked inserts before the field handles join their threads.
        self.receiver.stop_handle().stop();
        self.buffer.close();
    }
}
