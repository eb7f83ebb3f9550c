// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP receive path.
//!
//! A dedicated thread reads datagrams and routes them: chunks go into the
//! [`ReassemblyTable`], everything else goes straight to the [`Processor`]
//! under the configured backpressure policy.

use crate::chunk::{Chunk, SourceRef};
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::metrics::IngestMetrics;
use crate::processor::Processor;
use crate::table::ReassemblyTable;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Largest possible UDP payload.
const MAX_DATAGRAM_SIZE: usize = 65_536;

/// How often the receive loop checks for shutdown.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Routes decoded datagrams to the table or the processor.
#[derive(Debug)]
pub struct DatagramRouter {
    input_id: Arc<str>,
    table: Arc<ReassemblyTable>,
    processor: Arc<Processor>,
    metrics: Arc<IngestMetrics>,
}

impl DatagramRouter {
    pub fn new(
        input_id: impl Into<Arc<str>>,
        table: Arc<ReassemblyTable>,
        processor: Arc<Processor>,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            input_id: input_id.into(),
            table,
            processor,
            metrics,
        }
    }

    /// Route one datagram.
    pub fn route(&self, datagram: &[u8], remote: Option<SocketAddr>) {
        let mut source = SourceRef::new(Arc::clone(&self.input_id));
        if let Some(remote) = remote {
            source = source.with_remote(remote);
        }

        if !Chunk::is_chunked(datagram) {
            match self.processor.dispatch(datagram, &source) {
                Ok(()) => {}
                Err(e @ (IngestError::Backpressure | IngestError::ProcessingDisabled)) => {
                    tracing::debug!(input = %source, error = %e, "Rejected message");
                }
                // Parse failures are logged by the processor.
                Err(_) => {}
            }
            return;
        }

        match Chunk::decode(datagram, source) {
            Ok(chunk) => {
                self.metrics.increment_chunks_received();
                let id = chunk.message_id;
                let seq = chunk.sequence_number;
                if self.table.insert(chunk).is_some() {
                    self.metrics.increment_duplicate_chunks();
                    tracing::trace!(message_id = %id, seq, "Replaced duplicate chunk");
                }
            }
            Err(e) => {
                self.metrics.input(&self.input_id).increment_malformed();
                tracing::debug!(
                    input = %self.input_id,
                    remote = ?remote,
                    error = %e,
                    "Invalid chunk, dropping"
                );
            }
        }
    }
}

/// Handle for stopping a receiver from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Stop the receiver.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Background UDP listener.
pub struct UdpReceiver {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl UdpReceiver {
    /// Bind the socket described by `config` and start receiving.
    pub fn spawn(config: &IngestConfig, router: DatagramRouter) -> io::Result<Self> {
        let socket = bind_socket(config)?;
        let local_addr = socket.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        tracing::info!(addr = %local_addr, input = %config.input_id, "GELF UDP input listening");

        let thread = std::thread::Builder::new()
            .name("gelf-udp-rx".to_string())
            .spawn(move || receive_loop(socket, router, running_clone))?;

        Ok(Self {
            local_addr,
            running,
            thread: Some(thread),
        })
    }

    /// Address the socket is bound to (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Stop receiving and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    /// Block until the receiver stops (via a [`StopHandle`] or an error).
    pub fn join(mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for UdpReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bind_socket(config: &IngestConfig) -> io::Result<UdpSocket> {
    let addr = config.bind_addr();
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    if let Err(e) = socket.set_recv_buffer_size(config.recv_buffer_size) {
        tracing::warn!(
            requested = config.recv_buffer_size,
            error = %e,
            "Could not set socket receive buffer size"
        );
    }

    socket.bind(&addr.into())?;

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(READ_TIMEOUT))?;
    Ok(socket)
}

fn receive_loop(socket: UdpSocket, router: DatagramRouter, running: Arc<AtomicBool>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    while running.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, remote)) => router.route(&buf[..len], Some(remote)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::error!(error = %e, "UDP receive failed, stopping input");
                running.store(false, Ordering::SeqCst);
            }
        }
    }

    tracing::debug!("GELF UDP receiver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BoundedBuffer, ProcessBuffer};
    use crate::chunk::MessageId;
    use crate::config::BackpressurePolicy;
    use crate::parser::GelfParser;

    struct Harness {
        buffer: Arc<BoundedBuffer>,
        table: Arc<ReassemblyTable>,
        metrics: Arc<IngestMetrics>,
        router: DatagramRouter,
    }

    fn harness(capacity: usize, policy: BackpressurePolicy) -> Harness {
        let buffer = Arc::new(BoundedBuffer::new(capacity));
        let table = Arc::new(ReassemblyTable::new());
        let metrics = Arc::new(IngestMetrics::new());
        let processor = Arc::new(
            Processor::new(
                GelfParser::default(),
                Arc::clone(&buffer) as Arc<dyn ProcessBuffer>,
                Arc::clone(&metrics),
            )
            .with_policy(policy),
        );
        let router = DatagramRouter::new(
            "udp",
            Arc::clone(&table),
            processor,
            Arc::clone(&metrics),
        );
        Harness {
            buffer,
            table,
            metrics,
            router,
        }
    }

    fn chunk_datagram(id: u64, seq: u8, count: u8, payload: &[u8]) -> Vec<u8> {
        Chunk::new(MessageId::from(id), seq, count, payload, SourceRef::new("udp")).encode()
    }

    #[test]
    fn test_route_whole_message() {
        let h = harness(4, BackpressurePolicy::Block);
        let remote: SocketAddr = "10.0.0.1:5000".parse().unwrap();

        h.router
            .route(br#"{"short_message":"hi","host":"h1"}"#, Some(remote));

        let record = h.buffer.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(record.message, "hi");
        assert_eq!(
            record.fields.get("gl2_remote_ip").and_then(|v| v.as_str()),
            Some("10.0.0.1")
        );
        assert!(h.table.is_empty());
    }

    #[test]
    fn test_route_chunks_into_table() {
        let h = harness(4, BackpressurePolicy::Block);
        let id = MessageId::from(99u64);

        h.router.route(&chunk_datagram(99, 1, 2, b"B"), None);
        h.router.route(&chunk_datagram(99, 0, 2, b"A"), None);
        h.router.route(&chunk_datagram(99, 0, 2, b"A2"), None);

        assert!(h.table.is_complete(&id));
        assert_eq!(h.table.reassemble(&id).unwrap().payload, b"A2B");

        let snap = h.metrics.snapshot();
        assert_eq!(snap.chunks_received, 3);
        assert_eq!(snap.duplicate_chunks, 1);
        assert!(h.buffer.is_empty());
    }

    #[test]
    fn test_route_invalid_chunk() {
        let h = harness(4, BackpressurePolicy::Block);

        // Sequence number beyond the announced count
        h.router.route(&chunk_datagram(1, 5, 2, b"x"), None);
        // Header truncated
        h.router.route(&[0x1e, 0x0f, 1, 2, 3], None);

        assert!(h.table.is_empty());
        let snap = h.metrics.snapshot();
        assert_eq!(snap.chunks_received, 0);
        assert_eq!(snap.input("udp").malformed, 2);
    }

    #[test]
    fn test_route_fail_fast_rejects_when_full() {
        let h = harness(1, BackpressurePolicy::FailFast);
        let msg = br#"{"short_message":"hi","host":"h1"}"#;

        h.router.route(msg, None);
        h.router.route(msg, None);

        let snap = h.metrics.snapshot().input("udp");
        assert_eq!(snap.processed, 1);
        assert_eq!(snap.rejected, 1);
    }

    #[test]
    fn test_receiver_binds_ephemeral_port_and_stops() {
        let h = harness(4, BackpressurePolicy::Block);
        let config = IngestConfig::builder()
            .bind_address("127.0.0.1".parse().unwrap())
            .port(0)
            .build()
            .unwrap();

        let mut receiver = UdpReceiver::spawn(&config, h.router).unwrap();
        assert_ne!(receiver.local_addr().port(), 0);

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(br#"{"short_message":"over udp","host":"h1"}"#, receiver.local_addr())
            .unwrap();

        let record = h.buffer.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(record.message, "over udp");

        let handle = receiver.stop_handle();
        assert!(handle.is_running());
        receiver.stop();
        assert!(!handle.is_running());
    }
}
