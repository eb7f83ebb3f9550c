// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ingestion configuration.
//!
//! Supports both programmatic (builder) and file-based (TOML) configuration.
//!
//! ```toml
//! input_id = "gelf-udp"
//! bind_address = "0.0.0.0"
//! port = 12201
//! max_chunk_age_secs = 5
//! backpressure = "fail-fast"
//! ```

use crate::error::ConfigError;
use crate::payload::DEFAULT_DECOMPRESS_SIZE_LIMIT;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// How the receive path inserts into a full downstream buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    /// Wait for capacity.
    #[default]
    Block,
    /// Reject the message immediately.
    FailFast,
}

/// GELF UDP ingestion configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Input identity used for metrics and source references.
    #[serde(default = "default_input_id")]
    pub input_id: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// UDP port (0 picks an ephemeral port).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Requested socket receive buffer size (bytes).
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,

    /// Seconds after which an incomplete chunked message is dropped.
    #[serde(default = "default_max_chunk_age_secs")]
    pub max_chunk_age_secs: u64,

    /// Reaper sweep period (milliseconds).
    #[serde(default = "default_reaper_interval_ms")]
    pub reaper_interval_ms: u64,

    /// Maximum decompressed payload size (bytes).
    #[serde(default = "default_decompress_size_limit")]
    pub decompress_size_limit: usize,

    /// Downstream buffer capacity (records).
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    #[serde(default)]
    pub backpressure: BackpressurePolicy,
}

fn default_input_id() -> String {
    "gelf-udp".to_string()
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    12201
}

fn default_recv_buffer_size() -> usize {
    256 * 1024
}

fn default_max_chunk_age_secs() -> u64 {
    5
}

fn default_reaper_interval_ms() -> u64 {
    1000
}

fn default_decompress_size_limit() -> usize {
    DEFAULT_DECOMPRESS_SIZE_LIMIT
}

fn default_buffer_capacity() -> usize {
    1024
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input_id: default_input_id(),
            bind_address: default_bind_address(),
            port: default_port(),
            recv_buffer_size: default_recv_buffer_size(),
            max_chunk_age_secs: default_max_chunk_age_secs(),
            reaper_interval_ms: default_reaper_interval_ms(),
            decompress_size_limit: default_decompress_size_limit(),
            buffer_capacity: default_buffer_capacity(),
            backpressure: BackpressurePolicy::Block,
        }
    }
}

impl IngestConfig {
    /// Create a new builder.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_id.trim().is_empty() {
            return Err(ConfigError::Invalid("input_id must not be empty".into()));
        }
        if self.max_chunk_age_secs == 0 {
            return Err(ConfigError::Invalid(
                "max_chunk_age_secs must be greater than 0".into(),
            ));
        }
        if self.reaper_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "reaper_interval_ms must be greater than 0".into(),
            ));
        }
        if self.decompress_size_limit == 0 {
            return Err(ConfigError::Invalid(
                "decompress_size_limit must be greater than 0".into(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "buffer_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn max_chunk_age(&self) -> Duration {
        Duration::from_secs(self.max_chunk_age_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn input_id(mut self, id: impl Into<String>) -> Self {
        self.config.input_id = id.into();
        self
    }

    pub fn bind_address(mut self, addr: IpAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn recv_buffer_size(mut self, bytes: usize) -> Self {
        self.config.recv_buffer_size = bytes;
        self
    }

    pub fn max_chunk_age_secs(mut self, secs: u64) -> Self {
        self.config.max_chunk_age_secs = secs;
        self
    }

    pub fn reaper_interval_ms(mut self, ms: u64) -> Self {
        self.config.reaper_interval_ms = ms;
        self
    }

    pub fn decompress_size_limit(mut self, bytes: usize) -> Self {
        self.config.decompress_size_limit = bytes;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    pub fn backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.config.backpressure = policy;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<IngestConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
