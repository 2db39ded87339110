/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session logging.
//!
//! Raw wire traffic and session events are reported through [`SessionLog`].
//! [`TracingLog`] forwards to the `tracing` ecosystem; [`NullLog`] discards
//! everything.

use oxfix_core::types::SessionId;
use tracing::{debug, info};

/// Sink for session wire traffic and events.
pub trait SessionLog: Send {
    /// Called with every raw inbound frame.
    fn on_incoming(&self, bytes: &[u8]);

    /// Called with every raw outbound frame.
    fn on_outgoing(&self, bytes: &[u8]);

    /// Called with session-level events (state changes, errors, rejects).
    fn on_event(&self, event: &str);
}

/// Logs through the `tracing` crate, with the session identity attached.
#[derive(Debug, Clone)]
pub struct TracingLog {
    session_id: String,
}

impl TracingLog {
    /// Creates a log bound to the given session.
    #[must_use]
    pub fn new(session_id: &SessionId) -> Self {
        Self {
            session_id: session_id.to_string(),
        }
    }
}

impl SessionLog for TracingLog {
    fn on_incoming(&self, bytes: &[u8]) {
        debug!(
            session = %self.session_id,
            payload = %String::from_utf8_lossy(bytes),
            "incoming"
        );
    }

    fn on_outgoing(&self, bytes: &[u8]) {
        debug!(
            session = %self.session_id,
            payload = %String::from_utf8_lossy(bytes),
            "outgoing"
        );
    }

    fn on_event(&self, event: &str) {
        info!(session = %self.session_id, "{event}");
    }
}

/// Discards all log output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl SessionLog for NullLog {
    fn on_incoming(&self, _bytes: &[u8]) {}

    fn on_outgoing(&self, _bytes: &[u8]) {}

    fn on_event(&self, _event: &str) {}
}
