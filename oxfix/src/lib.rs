/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # oxfix
//!
//! A FIX 4.x / 5.x session-layer engine for Rust.
//!
//! oxfix implements the FIX session layer so an application can exchange
//! trading messages with a counterparty over a reliable byte stream: logon
//! handshake, heartbeat liveness, sequence-number gap detection and
//! recovery, orderly logout, session-time windows, and persistent replay of
//! previously sent messages.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use oxfix::prelude::*;
//!
//! let session_id = SessionId::new(
//!     "FIX.4.4",
//!     CompId::new("SENDER").unwrap(),
//!     CompId::new("TARGET").unwrap(),
//! );
//! let config = SessionConfig::new().with_initiate_logon(true);
//! let session = Session::new(
//!     session_id,
//!     config,
//!     Box::new(MemoryStore::new()),
//!     Box::new(MyApplication),
//! );
//!
//! let handle = session.spawn();
//! Initiator::connect("127.0.0.1:9876", handle).await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: Fundamental types, messages, and error definitions
//! - [`codec`]: Tag=value encoding and decoding
//! - [`session`]: Session layer state machine and coordinator
//! - [`store`]: Message persistence
//! - [`transport`]: Network framing and connection wiring

pub mod core {
    //! Fundamental types, messages, and error definitions.
    pub use oxfix_core::*;
}

pub mod codec {
    //! Tag=value encoding and decoding.
    pub use oxfix_codec::*;
}

pub mod session {
    //! Session layer state machine and coordinator.
    pub use oxfix_session::*;
}

pub mod store {
    //! Message persistence.
    pub use oxfix_store::*;
}

pub mod transport {
    //! Network framing and connection wiring.
    pub use oxfix_transport::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use oxfix_core::{
        CompId, DecodeError, EncodeError, FieldMap, FixError, Message, MsgType, Result, SessionError,
        SessionId, StoreError, Timestamp,
    };

    // Codec
    pub use oxfix_codec::{calculate_checksum, decode, encode, Decoder};

    // Session
    pub use oxfix_session::{
        Application, Clock, DoNotSend, FromAdminError, NullLog, Reject, RejectReason, Session,
        SessionConfig, SessionHandle, SessionLog, SessionSchedule, SessionState, SystemClock,
        TracingLog,
    };

    // Store
    pub use oxfix_store::{MemoryStore, MessageStore};

    // Transport
    pub use oxfix_transport::{spawn_connection, Acceptor, FrameCodec, Initiator};
}
