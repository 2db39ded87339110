/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Application callback trait.
//!
//! The session engine drives trading logic through this trait: lifecycle
//! notifications (`on_create`, `on_logon`, `on_logout`), outbound hooks
//! (`to_admin`, `to_app`), and inbound delivery (`from_admin`, `from_app`).
//!
//! Callbacks run on the session coordinator task and must not block. A
//! callback cannot re-enter the session synchronously; sends issued from
//! inside a callback go through [`crate::SessionHandle`], which posts onto
//! the session's event channel.

use crate::reject::Reject;
use oxfix_core::message::Message;
use oxfix_core::types::SessionId;
use thiserror::Error;

/// Returned from [`Application::to_app`] to veto an outbound message.
///
/// During resend replay a vetoed message is replaced by a gap-fill; on first
/// send it is silently dropped without consuming a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("do not send")]
pub struct DoNotSend;

/// Error returned from [`Application::from_admin`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FromAdminError {
    /// Refuse the counterparty's Logon; the session sends a Logout carrying
    /// the reason and disconnects.
    #[error("logon rejected: {reason}")]
    RejectLogon {
        /// Human-readable reason, sent as the Logout Text field.
        reason: String,
    },

    /// Reject the message at the session level.
    #[error(transparent)]
    Reject(#[from] Reject),
}

/// Callbacks implemented by the embedding application.
///
/// Default implementations accept everything, so implementors only override
/// the hooks they care about.
pub trait Application: Send {
    /// Called once when the session is created.
    fn on_create(&mut self, _session_id: &SessionId) {}

    /// Called when the logon handshake completes.
    fn on_logon(&mut self, _session_id: &SessionId) {}

    /// Called when a logged-on (or logon-initiating, or logout-waiting)
    /// session disconnects.
    fn on_logout(&mut self, _session_id: &SessionId) {}

    /// Called before an administrative message is sent; the application may
    /// inspect or amend it.
    fn to_admin(&mut self, _msg: &mut Message, _session_id: &SessionId) {}

    /// Called for every inbound administrative message.
    ///
    /// # Errors
    /// Return [`FromAdminError::RejectLogon`] to refuse a Logon, or a
    /// [`Reject`] to reject the message at the session level.
    fn from_admin(&mut self, _msg: &Message, _session_id: &SessionId) -> Result<(), FromAdminError> {
        Ok(())
    }

    /// Called before an application message is sent (including resends).
    ///
    /// # Errors
    /// Return [`DoNotSend`] to veto the send.
    fn to_app(&mut self, _msg: &mut Message, _session_id: &SessionId) -> Result<(), DoNotSend> {
        Ok(())
    }

    /// Called for every inbound application message.
    ///
    /// # Errors
    /// Return a [`Reject`] to reject the message at the session level; the
    /// target sequence number still advances.
    fn from_app(&mut self, _msg: &Message, _session_id: &SessionId) -> Result<(), Reject> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxfix_core::types::CompId;

    struct Passthrough;
    impl Application for Passthrough {}

    #[test]
    fn test_default_callbacks_accept() {
        let mut app = Passthrough;
        let session_id = SessionId::new(
            "FIX.4.4",
            CompId::new("A").unwrap(),
            CompId::new("B").unwrap(),
        );
        let mut msg = Message::with_msg_type("0");

        app.on_create(&session_id);
        app.to_admin(&mut msg, &session_id);
        assert!(app.from_admin(&msg, &session_id).is_ok());
        assert!(app.to_app(&mut msg, &session_id).is_ok());
        assert!(app.from_app(&msg, &session_id).is_ok());
    }

    #[test]
    fn test_from_admin_error_display() {
        let err = FromAdminError::RejectLogon {
            reason: "unknown counterparty".to_string(),
        };
        assert_eq!(err.to_string(), "logon rejected: unknown counterparty");
    }
}
