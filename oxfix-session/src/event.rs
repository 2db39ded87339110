/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session events.
//!
//! Everything that can happen to a session - transport lifecycle, inbound
//! frames, timer deadlines, outbound application sends, stop requests -
//! arrives on one multi-producer channel and is handled inside the
//! coordinator loop. Timer callbacks and external callers never touch
//! session state directly.

use bytes::Bytes;
use oxfix_core::message::Message;
use oxfix_core::types::Timestamp;
use tokio::sync::mpsc;

/// A timer deadline firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Nothing received from the counterparty for ~1.2x HeartBtInt.
    PeerTimeout,
    /// Nothing sent for one HeartBtInt; a Heartbeat is due.
    NeedHeartbeat,
    /// The counterparty did not answer our Logon in time.
    LogonTimeout,
    /// The counterparty did not answer our Logout in time.
    LogoutTimeout,
}

/// One raw inbound frame with its receive timestamp.
#[derive(Debug, Clone)]
pub struct FixIn {
    /// The complete frame bytes.
    pub bytes: Bytes,
    /// When the frame was read off the transport.
    pub receive_time: Timestamp,
}

/// An event delivered to the session coordinator.
#[derive(Debug)]
pub enum SessionEvent {
    /// The transport connected; carries the outbound byte sink.
    Connected(mpsc::UnboundedSender<Bytes>),
    /// The transport dropped.
    Disconnected,
    /// A complete inbound frame.
    Incoming(FixIn),
    /// A timer deadline fired.
    Timer(TimerEvent),
    /// An application message to send, admission-gated on logon.
    SendApp(Message),
    /// Stop the session (clean logout when logged on).
    Stop,
}
