/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # oxfix Session
//!
//! FIX session layer protocol implementation for the oxfix engine.
//!
//! This crate provides:
//! - **Session coordinator**: single-task event loop owning all session state
//! - **State machine**: closed-sum session states with per-variant behavior
//! - **Recovery**: sequence-gap detection, chunked ResendRequests, gap-fill
//!   replay from the message store
//! - **Liveness**: heartbeat/TestRequest timers with peer-timeout escalation
//! - **Scheduling**: session-time windows and daily sequence reset
//! - **Seams**: [`Application`], [`SessionLog`], and [`Clock`] traits

pub mod admin;
pub mod application;
pub mod clock;
pub mod config;
pub mod event;
pub mod log;
pub mod reject;
pub mod schedule;
pub mod sequence;
pub mod session;
pub mod state;
pub mod timer;

#[cfg(test)]
pub(crate) mod testutil;

pub use application::{Application, DoNotSend, FromAdminError};
pub use clock::{Clock, SystemClock};
pub use config::SessionConfig;
pub use event::{FixIn, SessionEvent, TimerEvent};
pub use log::{NullLog, SessionLog, TracingLog};
pub use reject::{Reject, RejectReason, VerifyError};
pub use schedule::SessionSchedule;
pub use sequence::{check_sequence, ResendRange, SeqCheck};
pub use session::{Session, SessionHandle};
pub use state::{PendingBase, SessionState};
pub use timer::TimerSet;
