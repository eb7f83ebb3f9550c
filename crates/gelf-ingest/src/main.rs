// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GELF UDP ingestion CLI
//!
//! Listen for GELF messages over UDP and print each parsed record as one
//! JSON line on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default GELF port
//! gelf-ingest
//!
//! # Load settings from a file, override the port
//! gelf-ingest --config gelf.toml --port 5140
//!
//! # Reject messages instead of waiting when the buffer is full
//! gelf-ingest --fail-fast --buffer-capacity 256
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use gelf_ingest::{BackpressurePolicy, GelfInput, IngestConfig, MessageRecord, StopHandle};
use std::io::{self, Write};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "gelf-ingest")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "GELF UDP input - reassemble chunked messages and emit JSON records")]
#[command(long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// UDP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds before an incomplete chunked message is dropped
    #[arg(long)]
    max_chunk_age: Option<u64>,

    /// Downstream buffer capacity (records)
    #[arg(long)]
    buffer_capacity: Option<usize>,

    /// Reject messages when the buffer is full instead of waiting
    #[arg(long)]
    fail_fast: bool,

    /// Verbose mode (show internal logs)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "gelf_ingest=debug"
    } else {
        "gelf_ingest=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Records go to stdout, diagnostics to stderr.
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    tracing::info!(
        input = %config.input_id,
        addr = %config.bind_addr(),
        max_chunk_age_secs = config.max_chunk_age_secs,
        backpressure = ?config.backpressure,
        "Starting GELF input"
    );

    let input = GelfInput::start(&config).context("Failed to start GELF input")?;

    let stop_handle = input.stop_handle();
    ctrlc_handler(stop_handle.clone());

    drain_to_stdout(&input, &stop_handle).context("Failed to write records")?;

    let stats = input.shutdown();
    tracing::info!(
        chunks_received = stats.chunks_received,
        complete_messages = stats.complete_messages,
        outdated_messages_dropped = stats.outdated_messages_dropped,
        handoff_failures = stats.handoff_failures,
        processed = stats.input(&config.input_id).processed,
        malformed = stats.input(&config.input_id).malformed,
        incomplete = stats.input(&config.input_id).incomplete,
        "GELF input shutdown complete"
    );

    Ok(())
}

fn build_config(cli: &Cli) -> Result<IngestConfig> {
    let mut config = match cli.config {
        Some(ref path) => IngestConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => IngestConfig::default(),
    };

    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(age) = cli.max_chunk_age {
        config.max_chunk_age_secs = age;
    }
    if let Some(capacity) = cli.buffer_capacity {
        config.buffer_capacity = capacity;
    }
    if cli.fail_fast {
        config.backpressure = BackpressurePolicy::FailFast;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Write buffered records to stdout until the input stops.
fn drain_to_stdout(input: &GelfInput, stop_handle: &StopHandle) -> Result<()> {
    let buffer = input.buffer();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    while stop_handle.is_running() {
        if let Some(record) = buffer.recv_timeout(Duration::from_millis(200)) {
            write_record(&mut out, &record)?;
        }
    }

    // Flush whatever was accepted before shutdown.
    for record in buffer.receiver().try_iter() {
        write_record(&mut out, &record)?;
    }
    out.flush()?;
    Ok(())
}

fn write_record(out: &mut impl Write, record: &MessageRecord) -> Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Setup Ctrl+C handler.
fn ctrlc_handler(stop_handle: StopHandle) {
    let _ = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, shutting down...");
        stop_handle.stop();
    });
}
