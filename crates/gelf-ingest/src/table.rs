// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrent index of in-flight chunked messages.
//!
//! The table maps a [`MessageId`] to the chunks received so far, keyed by
//! sequence number. It is written by the network receive path and swept by
//! the [`Reaper`](crate::Reaper); both sides only ever touch one shard of
//! the map at a time, so chunk insertion never waits on a sweep.
//!
//! # Completeness
//!
//! A message is complete once chunk 0 is present and the number of stored
//! chunks equals the sequence count chunk 0 announces. Until chunk 0 arrives
//! the message cannot be complete, whatever else is stored.
//!
//! # Staleness
//!
//! A message is outdated as soon as *any* of its chunks is older than the
//! configured maximum age.

use crate::chunk::{Chunk, MessageId, SourceRef};
use crate::error::IngestError;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

type Chunks = BTreeMap<u8, Chunk>;

/// Payload rebuilt from all chunks of one message.
#[derive(Debug, Clone)]
pub struct ReassembledMessage {
    pub message_id: MessageId,
    /// Chunk payloads concatenated in sequence order.
    pub payload: Vec<u8>,
    /// Source of chunk 0.
    pub source: SourceRef,
}

/// Chunk reassembly table.
#[derive(Debug, Default)]
pub struct ReassemblyTable {
    messages: DashMap<MessageId, Chunks>,
}

impl ReassemblyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a chunk, replacing any chunk already held at the same position.
    ///
    /// Returns the replaced chunk, if any.
    pub fn insert(&self, chunk: Chunk) -> Option<Chunk> {
        self.messages
            .entry(chunk.message_id)
            .or_default()
            .insert(chunk.sequence_number, chunk)
    }

    pub fn has(&self, id: &MessageId) -> bool {
        self.messages.contains_key(id)
    }

    /// Check whether all chunks announced by chunk 0 have arrived.
    pub fn is_complete(&self, id: &MessageId) -> bool {
        self.messages
            .get(id)
            .is_some_and(|chunks| chunks_complete(&chunks))
    }

    /// Check whether any chunk of the message is older than `max_age`.
    pub fn is_outdated(&self, id: &MessageId, max_age: Duration) -> bool {
        self.messages
            .get(id)
            .is_some_and(|chunks| chunks_outdated(&chunks, max_age))
    }

    /// Concatenate the chunk payloads of a message in sequence order.
    ///
    /// Does not check completeness; callers are expected to have done so.
    pub fn reassemble(&self, id: &MessageId) -> Result<ReassembledMessage, IngestError> {
        let chunks = self
            .messages
            .get(id)
            .ok_or(IngestError::UnknownMessage(*id))?;
        join_chunks(*id, &chunks).ok_or(IngestError::UnknownMessage(*id))
    }

    /// Remove a message. Returns the number of chunks dropped (0 if absent).
    pub fn evict(&self, id: &MessageId) -> usize {
        self.messages
            .remove(id)
            .map(|(_, chunks)| chunks.len())
            .unwrap_or(0)
    }

    /// Remove and reassemble a message if it is complete.
    ///
    /// The check and the removal happen under the same shard lock, so a
    /// complete message is handed out at most once.
    pub fn take_complete(&self, id: &MessageId) -> Option<ReassembledMessage> {
        let (id, chunks) = self
            .messages
            .remove_if(id, |_, chunks| chunks_complete(chunks))?;
        join_chunks(id, &chunks)
    }

    /// Remove a message if it is outdated. Returns the number of chunks dropped.
    pub fn take_outdated(&self, id: &MessageId, max_age: Duration) -> Option<usize> {
        self.messages
            .remove_if(id, |_, chunks| chunks_outdated(chunks, max_age))
            .map(|(_, chunks)| chunks.len())
    }

    /// Snapshot of the ids currently held.
    pub fn message_ids(&self) -> Vec<MessageId> {
        self.messages.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of chunks held for a message.
    pub fn chunk_count(&self, id: &MessageId) -> usize {
        self.messages.get(id).map(|chunks| chunks.len()).unwrap_or(0)
    }

    /// Number of in-flight messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn chunks_complete(chunks: &Chunks) -> bool {
    chunks
        .get(&0)
        .is_some_and(|first| chunks.len() == first.sequence_count as usize)
}

fn chunks_outdated(chunks: &Chunks, max_age: Duration) -> bool {
    // Nothing can be older than the clock's origin.
    let Some(threshold) = Instant::now().checked_sub(max_age) else {
        return false;
    };
    chunks.values().any(|chunk| chunk.arrival < threshold)
}

fn join_chunks(id: MessageId, chunks: &Chunks) -> Option<ReassembledMessage> {
    let source = chunks
        .get(&0)
        .or_else(|| chunks.values().next())?
        .source
        .clone();

    let len = chunks.values().map(|chunk| chunk.payload.len()).sum();
    let mut payload = Vec::with_capacity(len);
    for chunk in chunks.values() {
        payload.extend_from_slice(&chunk.payload);
    }

    Some(ReassembledMessage {
        message_id: id,
        payload,
        source,
    })
}
