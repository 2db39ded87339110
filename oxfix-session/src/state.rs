/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The session state machine.
//!
//! [`SessionState`] is a closed sum over the protocol states. Each variant
//! decides how the session responds to inbound messages, timer events, and
//! stop requests; handlers take the state by value plus the session, and
//! return the next state, so transitions stay pure and the variants hold no
//! back-pointers.
//!
//! The pending-timeout state wraps one of the two logged-on states and
//! inherits its behavior for anything that is not a second peer timeout.

use crate::admin;
use crate::reject::{Reject, RejectReason, VerifyError};
use crate::session::{HandlerError, Session};
use crate::event::TimerEvent;
use crate::timer::peer_timeout;
use oxfix_core::message::Message;
use oxfix_core::tags::{self, MsgType};
use std::fmt;
use std::time::Duration;

/// The logged-on state a pending timeout falls back into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingBase {
    /// Normal steady state.
    InSession,
    /// An inbound gap is being filled.
    Resend,
}

/// The session protocol states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Outside the configured trading window.
    NotSessionTime,
    /// In session time but no transport attached.
    Latent,
    /// Connected, awaiting the counterparty's Logon.
    Logon,
    /// Logged on, normal message exchange.
    InSession,
    /// Logged on, filling an inbound sequence gap.
    Resend,
    /// One peer-liveness timeout elapsed; a TestRequest is outstanding.
    PendingTimeout(PendingBase),
    /// Our Logout is out; awaiting the counterparty's reply.
    Logout,
}

impl SessionState {
    /// Returns true if a transport connection is attached in this state.
    #[must_use]
    pub fn is_connected(self) -> bool {
        !matches!(self, Self::NotSessionTime | Self::Latent)
    }

    /// Returns true if the logon handshake has completed in this state.
    #[must_use]
    pub fn is_logged_on(self) -> bool {
        matches!(
            self,
            Self::InSession | Self::Resend | Self::PendingTimeout(_)
        )
    }

    /// Returns true if this state is inside the trading window.
    #[must_use]
    pub fn is_session_time(self) -> bool {
        !matches!(self, Self::NotSessionTime)
    }

    /// Handles one inbound message, returning the next state.
    pub(crate) async fn fix_msg_in(self, s: &mut Session, msg: Message) -> SessionState {
        match self {
            Self::NotSessionTime | Self::Latent => {
                s.log.on_event(&format!(
                    "invalid session state: unexpected message while in {self}"
                ));
                self
            }
            Self::Logon => logon_fix_msg_in(s, msg).await,
            Self::InSession => in_session_fix_msg_in(s, msg).await,
            Self::Resend => resend_fix_msg_in(s, msg).await,
            Self::PendingTimeout(PendingBase::InSession) => in_session_fix_msg_in(s, msg).await,
            Self::PendingTimeout(PendingBase::Resend) => resend_fix_msg_in(s, msg).await,
            Self::Logout => logout_fix_msg_in(s, msg).await,
        }
    }

    /// Handles one timer event, returning the next state.
    pub(crate) async fn timeout(self, s: &mut Session, event: TimerEvent) -> SessionState {
        match self {
            Self::InSession | Self::Resend => match event {
                TimerEvent::NeedHeartbeat => {
                    if let Err(err) = s.send_admin(admin::heartbeat(None), None).await {
                        return s.handle_state_error(&err);
                    }
                    self
                }
                TimerEvent::PeerTimeout => {
                    let test_req_id = admin::generate_test_req_id(s.clock.now());
                    if let Err(err) = s.send_admin(admin::test_request(&test_req_id), None).await {
                        return s.handle_state_error(&err);
                    }
                    s.log.on_event(&format!("sent test request {test_req_id}"));
                    s.outstanding_test_req = Some(test_req_id);
                    s.timers.arm_peer(peer_timeout(s.heart_bt_int));
                    Self::PendingTimeout(self.pending_base())
                }
                _ => self,
            },
            Self::PendingTimeout(_) => match event {
                TimerEvent::PeerTimeout => {
                    s.log.on_event("session timeout");
                    Self::Latent
                }
                TimerEvent::NeedHeartbeat => {
                    if let Err(err) = s.send_admin(admin::heartbeat(None), None).await {
                        return s.handle_state_error(&err);
                    }
                    self
                }
                _ => self,
            },
            Self::Logon => match event {
                TimerEvent::LogonTimeout => {
                    s.log.on_event("timed out waiting for logon response");
                    Self::Latent
                }
                _ => self,
            },
            Self::Logout => match event {
                TimerEvent::LogoutTimeout => {
                    s.log.on_event("timed out waiting for logout response");
                    Self::Latent
                }
                _ => self,
            },
            Self::Latent | Self::NotSessionTime => self,
        }
    }

    /// Triggers a clean stop, returning the next state.
    pub(crate) async fn stop(self, s: &mut Session) -> SessionState {
        match self {
            Self::InSession | Self::Resend | Self::PendingTimeout(_) => {
                match s.initiate_logout("").await {
                    Ok(()) => Self::Logout,
                    Err(err) => s.handle_state_error(&err),
                }
            }
            Self::Logon => Self::Latent,
            _ => self,
        }
    }

    /// Terminates the state immediately (session-time preemption); a
    /// logged-on state still sends its Logout.
    pub(crate) async fn shutdown_now(self, s: &mut Session) {
        if self.is_logged_on() {
            if let Err(err) = s.send_logout_in_reply_to("", None).await {
                s.log_error(&err);
            }
        }
    }

    fn pending_base(self) -> PendingBase {
        match self {
            Self::Resend | Self::PendingTimeout(PendingBase::Resend) => PendingBase::Resend,
            _ => PendingBase::InSession,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotSessionTime => "not session time",
            Self::Latent => "latent state",
            Self::Logon => "logon state",
            Self::InSession => "in session",
            Self::Resend => "resend state",
            Self::PendingTimeout(PendingBase::InSession) => "pending timeout (in session)",
            Self::PendingTimeout(PendingBase::Resend) => "pending timeout (resend)",
            Self::Logout => "logout state",
        };
        f.write_str(name)
    }
}

/// State machine bookkeeping owned by the session.
#[derive(Debug)]
pub(crate) struct StateMachine {
    pub(crate) current: SessionState,
    pub(crate) pending_stop: bool,
    pub(crate) stopped: bool,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        Self {
            current: SessionState::Latent,
            pending_stop: false,
            stopped: false,
        }
    }
}

// ---- logon state ----------------------------------------------------------

async fn logon_fix_msg_in(s: &mut Session, msg: Message) -> SessionState {
    if msg.msg_type() != Some(MsgType::Logon) {
        s.log.on_event(&format!(
            "invalid session state: received {} while waiting for logon",
            msg.header.get(tags::MSG_TYPE).unwrap_or("?")
        ));
        return SessionState::Latent;
    }

    match handle_logon(s, &msg).await {
        Ok(next) => next,
        Err(HandlerError::Verify(VerifyError::RejectLogon { reason })) => {
            s.shutdown_with_reason(&msg, true, &reason).await
        }
        Err(HandlerError::Verify(err @ VerifyError::TargetTooLow { .. })) => {
            let reason = err.to_string();
            s.shutdown_with_reason(&msg, false, &reason).await
        }
        Err(HandlerError::Verify(err @ VerifyError::IncorrectBeginString { .. })) => {
            let reason = err.to_string();
            s.shutdown_with_reason(&msg, true, &reason).await
        }
        Err(HandlerError::Verify(err)) => {
            s.log.on_event(&format!("logon verification failed: {err}"));
            SessionState::Latent
        }
        Err(HandlerError::Fatal(err)) => s.handle_state_error(&err),
    }
}

/// Shared Logon handling for the handshake and mid-session resync.
///
/// Applies resets (configured, or an unsolicited ResetSeqNumFlag=Y), runs
/// verification ignoring a too-high sequence number, replies when acceptor,
/// fires `on_logon`, and only then resolves a detected gap by entering the
/// resend state.
async fn handle_logon(s: &mut Session, msg: &Message) -> Result<SessionState, HandlerError> {
    let mut reset_store = false;
    if s.config.initiate_logon {
        s.log.on_event("received logon response");
    } else {
        s.log.on_event("received logon request");
        reset_store = s.config.reset_on_logon;
        if s.config.refresh_on_logon {
            s.store.refresh().await?;
        }
    }

    let reset_seq_num_flag = msg.body.get_bool(tags::RESET_SEQ_NUM_FLAG).unwrap_or(false);
    if reset_seq_num_flag && !s.sent_reset {
        s.log
            .on_event("logon contains ResetSeqNumFlag=Y, resetting sequence numbers to 1");
        reset_store = true;
    }
    if reset_store {
        s.store.reset().await?;
    }

    s.verify_select(msg, false, true).await?;

    if !s.config.initiate_logon {
        if !s.config.heart_bt_int_override {
            if let Some(secs) = msg.body.get_u64(tags::HEART_BT_INT) {
                s.heart_bt_int = Duration::from_secs(secs);
            }
        }
        s.log.on_event("responding to logon request");
        s.send_logon_in_reply_to(reset_seq_num_flag, Some(msg)).await?;
    }
    s.sent_reset = false;

    s.timers.arm_peer(peer_timeout(s.heart_bt_int));
    s.timers.arm_heartbeat(s.heart_bt_int);

    s.application.on_logon(&s.session_id);

    match s.check_target_too_high(msg) {
        Ok(()) => {}
        Err(VerifyError::TargetTooHigh { expected, received }) => {
            s.do_target_too_high(expected, received).await?;
            return Ok(SessionState::Resend);
        }
        Err(err) => return Err(err.into()),
    }

    s.store.incr_next_target_seq().await?;
    Ok(SessionState::InSession)
}

// ---- in-session state -----------------------------------------------------

pub(crate) async fn in_session_fix_msg_in(s: &mut Session, msg: Message) -> SessionState {
    let msg_type = match msg.msg_type() {
        Some(msg_type) => msg_type,
        None => {
            let reject = Reject::required_tag_missing(tags::MSG_TYPE);
            return process_reject(s, msg, reject.into()).await;
        }
    };

    match msg_type {
        MsgType::Logon => match handle_logon(s, &msg).await {
            Ok(next) => next,
            Err(_) => {
                if let Err(err) = s.initiate_logout_in_reply_to("", Some(&msg)).await {
                    return s.handle_state_error(&err);
                }
                SessionState::Logout
            }
        },
        MsgType::Logout => handle_logout(s, msg).await,
        MsgType::ResendRequest => handle_resend_request(s, msg).await,
        MsgType::SequenceReset => handle_sequence_reset(s, msg).await,
        MsgType::TestRequest => handle_test_request(s, msg).await,
        _ => {
            if let Err(err) = s.verify(&msg).await {
                return process_reject(s, msg, err).await;
            }
            if msg_type == MsgType::Heartbeat {
                s.note_heartbeat(&msg);
            }
            if let Err(err) = s.store.incr_next_target_seq().await {
                return s.handle_state_error(&err.into());
            }
            SessionState::InSession
        }
    }
}

/// Counterparty Logout: reply when we did not initiate, consume its
/// sequence number, optionally reset, drop to latent.
async fn handle_logout(s: &mut Session, msg: Message) -> SessionState {
    if let Err(err) = s.verify_select(&msg, false, false).await {
        return process_reject(s, msg, err).await;
    }

    if s.is_logged_on() {
        s.log.on_event("received logout request");
        s.log.on_event("sending logout response");
        if let Err(err) = s.send_logout_in_reply_to("", Some(&msg)).await {
            s.log_error(&err);
        }
    } else {
        s.log.on_event("received logout response");
    }

    if let Err(err) = s.store.incr_next_target_seq().await {
        s.log_error(&err.into());
    }
    if s.config.reset_on_logout {
        if let Err(err) = s.drop_and_reset().await {
            s.log_error(&err);
        }
    }

    SessionState::Latent
}

/// Counterparty asks us to replay `[BeginSeqNo, EndSeqNo]`.
async fn handle_resend_request(s: &mut Session, msg: Message) -> SessionState {
    if let Err(err) = s.verify_select(&msg, false, false).await {
        return process_reject(s, msg, err).await;
    }

    let begin = match msg.body.get_u64(tags::BEGIN_SEQ_NO) {
        Some(begin) => begin,
        None => {
            let reject = Reject::required_tag_missing(tags::BEGIN_SEQ_NO);
            return process_reject(s, msg, reject.into()).await;
        }
    };
    let mut end = match msg.body.get_u64(tags::END_SEQ_NO) {
        Some(end) => end,
        None => {
            let reject = Reject::required_tag_missing(tags::END_SEQ_NO);
            return process_reject(s, msg, reject.into()).await;
        }
    };

    s.log
        .on_event(&format!("received ResendRequest from {begin} to {end}"));

    // EndSeqNo 0 (and the legacy 999999) means "through the last sent".
    let next_sender = s.store.next_sender_seq();
    if end == 0 || end == 999_999 || end >= next_sender {
        end = next_sender.saturating_sub(1);
    }

    if let Err(err) = s.resend_messages(begin, end, &msg).await {
        return s.handle_state_error(&err);
    }

    if s.check_target_too_low(&msg).is_err() || s.check_target_too_high(&msg).is_err() {
        return SessionState::InSession;
    }
    if let Err(err) = s.store.incr_next_target_seq().await {
        return s.handle_state_error(&err.into());
    }
    SessionState::InSession
}

/// SequenceReset: a gap-fill is sequence-checked like any message; a hard
/// reset (GapFill=N) is honored regardless of its own sequence number.
async fn handle_sequence_reset(s: &mut Session, msg: Message) -> SessionState {
    let gap_fill = msg.body.get_bool(tags::GAP_FILL_FLAG).unwrap_or(false);

    if let Err(err) = s.verify_select(&msg, gap_fill, gap_fill).await {
        return process_reject(s, msg, err).await;
    }

    if let Some(new_seq_no) = msg.body.get_u64(tags::NEW_SEQ_NO) {
        let expected = s.store.next_target_seq();
        s.log.on_event(&format!(
            "received SequenceReset from {expected} to {new_seq_no}"
        ));
        if new_seq_no > expected {
            if let Err(err) = s.store.set_next_target_seq(new_seq_no).await {
                return s.handle_state_error(&err.into());
            }
        } else if new_seq_no < expected {
            if let Err(err) = s.do_reject(&msg, &Reject::value_is_incorrect(None)).await {
                return s.handle_state_error(&err);
            }
        }
    }
    SessionState::InSession
}

/// TestRequest: answer with a Heartbeat echoing the TestReqID.
async fn handle_test_request(s: &mut Session, msg: Message) -> SessionState {
    if let Err(err) = s.verify(&msg).await {
        return process_reject(s, msg, err).await;
    }

    match msg.body.get(tags::TEST_REQ_ID).map(str::to_string) {
        None => s.log.on_event("test request with no TestReqID"),
        Some(test_req_id) => {
            let reply = admin::heartbeat(Some(&test_req_id));
            if let Err(err) = s.send_admin(reply, Some(&msg)).await {
                return s.handle_state_error(&err);
            }
        }
    }

    if let Err(err) = s.store.incr_next_target_seq().await {
        return s.handle_state_error(&err.into());
    }
    SessionState::InSession
}

/// Routes a failed verification: gaps feed the resend protocol, CompID and
/// SendingTime problems escalate to logout, everything else draws a Reject
/// and advances the target.
async fn process_reject(s: &mut Session, msg: Message, err: HandlerError) -> SessionState {
    let verify = match err {
        HandlerError::Verify(verify) => verify,
        HandlerError::Fatal(fatal) => return s.handle_state_error(&fatal),
    };

    match verify {
        VerifyError::TargetTooHigh { expected, received } => {
            if s.resend_range.is_none() {
                if let Err(err) = s.do_target_too_high(expected, received).await {
                    return s.handle_state_error(&err);
                }
            }
            // Hold the post-gap message until the counterparty's replay
            // catches up to it.
            s.message_stash.insert(received, msg);
            SessionState::Resend
        }
        VerifyError::TargetTooLow { expected, received } => {
            do_target_too_low(s, msg, expected, received).await
        }
        err @ VerifyError::IncorrectBeginString { .. } => {
            let reason = err.to_string();
            if let Err(err) = s.initiate_logout(&reason).await {
                return s.handle_state_error(&err);
            }
            SessionState::Logout
        }
        VerifyError::RejectLogon { reason } => {
            if let Err(err) = s.initiate_logout(&reason).await {
                return s.handle_state_error(&err);
            }
            SessionState::Logout
        }
        VerifyError::Reject(reject) => match reject.reason() {
            RejectReason::CompIdProblem | RejectReason::SendingTimeAccuracyProblem
                if !reject.is_business() =>
            {
                if let Err(err) = s.do_reject(&msg, &reject).await {
                    return s.handle_state_error(&err);
                }
                if let Err(err) = s.initiate_logout("").await {
                    return s.handle_state_error(&err);
                }
                SessionState::Logout
            }
            _ => {
                if let Err(err) = s.do_reject(&msg, &reject).await {
                    return s.handle_state_error(&err);
                }
                if let Err(err) = s.store.incr_next_target_seq().await {
                    return s.handle_state_error(&err.into());
                }
                SessionState::InSession
            }
        },
    }
}

/// A too-low sequence number is ignorable only as a well-formed possible
/// duplicate; otherwise the session logs out.
async fn do_target_too_low(
    s: &mut Session,
    msg: Message,
    expected: u64,
    received: u64,
) -> SessionState {
    let poss_dup = msg.header.get_bool(tags::POSS_DUP_FLAG).unwrap_or(false);
    if !poss_dup {
        let reason = VerifyError::TargetTooLow { expected, received }.to_string();
        return s.shutdown_with_reason(&msg, false, &reason).await;
    }

    if let Err(VerifyError::Reject(reject)) = s.check_sending_time(&msg) {
        if let Err(err) = s.do_reject(&msg, &reject).await {
            return s.handle_state_error(&err);
        }
        if let Err(err) = s.initiate_logout("").await {
            return s.handle_state_error(&err);
        }
        return SessionState::Logout;
    }

    if !msg.header.has(tags::ORIG_SENDING_TIME) {
        let reject = Reject::conditionally_required_field_missing(tags::ORIG_SENDING_TIME);
        if let Err(err) = s.do_reject(&msg, &reject).await {
            return s.handle_state_error(&err);
        }
        return SessionState::InSession;
    }

    let orig = msg.header.get_timestamp(tags::ORIG_SENDING_TIME);
    let sending = msg.header.get_timestamp(tags::SENDING_TIME);
    match (orig, sending) {
        (Some(orig), Some(sending)) if sending < orig => {
            let reject = Reject::sending_time_accuracy_problem();
            if let Err(err) = s.do_reject(&msg, &reject).await {
                return s.handle_state_error(&err);
            }
            if let Err(err) = s.initiate_logout("").await {
                return s.handle_state_error(&err);
            }
            SessionState::Logout
        }
        (Some(_), Some(_)) => {
            // Duplicate of something already processed.
            SessionState::InSession
        }
        _ => {
            let reject = Reject::incorrect_data_format(tags::ORIG_SENDING_TIME);
            if let Err(err) = s.do_reject(&msg, &reject).await {
                return s.handle_state_error(&err);
            }
            SessionState::InSession
        }
    }
}

// ---- resend state ---------------------------------------------------------

/// Delegates to the in-session handling, then advances the gap-recovery
/// bookkeeping: request the next chunk once the target passes the current
/// one, and when the whole range is satisfied, replay the stashed post-gap
/// messages in order and return to the steady state.
async fn resend_fix_msg_in(s: &mut Session, msg: Message) -> SessionState {
    let mut next = in_session_fix_msg_in(s, msg).await;
    if !next.is_logged_on() {
        s.clear_resend_state();
        return next;
    }

    let range = match s.resend_range {
        Some(range) => range,
        None => return next,
    };

    if let Some(chunk_end) = range.chunk_end {
        if chunk_end < s.store.next_target_seq() {
            let begin = s.store.next_target_seq();
            if let Err(err) = s.send_resend_request(begin, range.end).await {
                return s.handle_state_error(&err);
            }
            return SessionState::Resend;
        }
    }

    if range.end >= s.store.next_target_seq() {
        return SessionState::Resend;
    }

    loop {
        let target = s.store.next_target_seq();
        let stashed = match s.message_stash.remove(&target) {
            Some(stashed) => stashed,
            None => break,
        };
        next = in_session_fix_msg_in(s, stashed).await;
        if !next.is_logged_on() {
            s.clear_resend_state();
            return next;
        }
    }

    s.clear_resend_state();
    SessionState::InSession
}

// ---- logout state ---------------------------------------------------------

/// Everything is handled as in session, but only a Logout (which lands in
/// latent) releases the state; rejects and app deliveries leave us waiting.
async fn logout_fix_msg_in(s: &mut Session, msg: Message) -> SessionState {
    let next = in_session_fix_msg_in(s, msg).await;
    if next == SessionState::Latent {
        return SessionState::Latent;
    }
    // A gap detected while logging out is abandoned; the resend states are
    // the only holders of a resend range.
    s.clear_resend_state();
    SessionState::Logout
}
