/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message store trait definition.
//!
//! This module defines the abstract interface for session persistence.
//! A store owns both sequence-number counters and the bodies of sent
//! messages, keyed by sender sequence number, so the session can replay
//! them in response to a ResendRequest.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use oxfix_core::error::StoreError;

/// Abstract interface for FIX session persistence.
///
/// One store instance is owned by exactly one session. Sequence reads are
/// synchronous (the coordinator consults them on every message); mutations
/// are async so persistent implementations can reach disk or a database.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Returns the next outgoing sequence number.
    fn next_sender_seq(&self) -> u64;

    /// Returns the next expected incoming sequence number.
    fn next_target_seq(&self) -> u64;

    /// Increments the next outgoing sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be persisted.
    async fn incr_next_sender_seq(&self) -> Result<(), StoreError>;

    /// Increments the next expected incoming sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be persisted.
    async fn incr_next_target_seq(&self) -> Result<(), StoreError>;

    /// Sets the next outgoing sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be persisted.
    async fn set_next_sender_seq(&self, seq: u64) -> Result<(), StoreError>;

    /// Sets the next expected incoming sequence number.
    ///
    /// # Errors
    /// Returns `StoreError` if the counter cannot be persisted.
    async fn set_next_target_seq(&self, seq: u64) -> Result<(), StoreError>;

    /// Stores an outgoing message body for potential resend.
    ///
    /// # Arguments
    /// * `seq_num` - The message sequence number
    /// * `body` - The encoded message bytes
    ///
    /// # Errors
    /// Returns `StoreError` if the message cannot be stored.
    async fn save_message(&self, seq_num: u64, body: &[u8]) -> Result<(), StoreError>;

    /// Stores an outgoing message body and increments the sender sequence
    /// number as one operation.
    ///
    /// # Errors
    /// Returns `StoreError` if either step fails.
    async fn save_message_and_incr_next_sender_seq(
        &self,
        seq_num: u64,
        body: &[u8],
    ) -> Result<(), StoreError> {
        self.save_message(seq_num, body).await?;
        self.incr_next_sender_seq().await
    }

    /// Retrieves stored messages for a resend request.
    ///
    /// # Arguments
    /// * `begin` - Begin sequence number (inclusive)
    /// * `end` - End sequence number (inclusive)
    ///
    /// # Returns
    /// `(seq_num, bytes)` pairs in ascending order. Sequence numbers with no
    /// stored body (administrative messages pruned by the caller, resets)
    /// are simply absent.
    ///
    /// # Errors
    /// Returns `StoreError` if messages cannot be retrieved.
    async fn get_messages(&self, begin: u64, end: u64) -> Result<Vec<(u64, Bytes)>, StoreError>;

    /// Returns the creation time of the session's persistent state.
    ///
    /// Used to detect session-time-window rollover: if the stored creation
    /// time falls in a different window than now, the session resets.
    fn creation_time(&self) -> DateTime<Utc>;

    /// Resets the store: sequence numbers back to 1, stored bodies cleared,
    /// creation time refreshed.
    ///
    /// # Errors
    /// Returns `StoreError` if the reset cannot be persisted.
    async fn reset(&self) -> Result<(), StoreError>;

    /// Refreshes in-memory state from the backing storage.
    ///
    /// # Errors
    /// Returns `StoreError` if the refresh fails.
    async fn refresh(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
