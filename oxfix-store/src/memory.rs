/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! In-memory message store implementation.
//!
//! Backs a session with plain process memory: sequence counters live in
//! atomics, sent bodies in a `BTreeMap` keyed by sequence number so replay
//! range lookups stay cheap. Nothing survives the process, which is what
//! tests and throwaway sessions want; durable deployments implement
//! [`MessageStore`] over real storage instead.

use crate::traits::MessageStore;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use oxfix_core::error::StoreError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory message store.
#[derive(Debug)]
pub struct MemoryStore {
    /// Next outgoing sequence number.
    sender_seq: AtomicU64,
    /// Next expected incoming sequence number.
    target_seq: AtomicU64,
    /// Encoded outbound bodies, keyed by their sender sequence number.
    bodies: RwLock<BTreeMap<u64, Bytes>>,
    /// When the current sequence-number epoch began; refreshed by `reset`.
    epoch: RwLock<DateTime<Utc>>,
}

impl MemoryStore {
    /// Creates a store with both sequence numbers at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::with_initial_seqs(1, 1)
    }

    /// Creates a store with explicit starting sequence numbers.
    ///
    /// # Arguments
    /// * `sender_seq` - Initial sender sequence number
    /// * `target_seq` - Initial target sequence number
    #[must_use]
    pub fn with_initial_seqs(sender_seq: u64, target_seq: u64) -> Self {
        Self {
            sender_seq: AtomicU64::new(sender_seq),
            target_seq: AtomicU64::new(target_seq),
            bodies: RwLock::new(BTreeMap::new()),
            epoch: RwLock::new(Utc::now()),
        }
    }

    /// Returns how many message bodies are currently held.
    #[must_use]
    pub fn stored_count(&self) -> usize {
        self.bodies.read().len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    fn next_sender_seq(&self) -> u64 {
        self.sender_seq.load(Ordering::SeqCst)
    }

    fn next_target_seq(&self) -> u64 {
        self.target_seq.load(Ordering::SeqCst)
    }

    async fn incr_next_sender_seq(&self) -> Result<(), StoreError> {
        self.sender_seq.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn incr_next_target_seq(&self) -> Result<(), StoreError> {
        self.target_seq.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_next_sender_seq(&self, seq: u64) -> Result<(), StoreError> {
        self.sender_seq.store(seq, Ordering::SeqCst);
        Ok(())
    }

    async fn set_next_target_seq(&self, seq: u64) -> Result<(), StoreError> {
        self.target_seq.store(seq, Ordering::SeqCst);
        Ok(())
    }

    async fn save_message(&self, seq_num: u64, body: &[u8]) -> Result<(), StoreError> {
        self.bodies
            .write()
            .insert(seq_num, Bytes::copy_from_slice(body));
        Ok(())
    }

    async fn get_messages(&self, begin: u64, end: u64) -> Result<Vec<(u64, Bytes)>, StoreError> {
        if begin > end {
            return Ok(Vec::new());
        }
        let bodies = self.bodies.read();
        Ok(bodies
            .range(begin..=end)
            .map(|(seq, body)| (*seq, body.clone()))
            .collect())
    }

    fn creation_time(&self) -> DateTime<Utc> {
        *self.epoch.read()
    }

    async fn reset(&self) -> Result<(), StoreError> {
        self.bodies.write().clear();
        self.sender_seq.store(1, Ordering::SeqCst);
        self.target_seq.store(1, Ordering::SeqCst);
        *self.epoch.write() = Utc::now();
        Ok(())
    }
}
