/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The session coordinator.
//!
//! One task owns all mutable session state and drives the state machine from
//! a single event channel: transport lifecycle, inbound frames, timer
//! deadlines, outbound application sends, and stop requests. Every entry
//! point re-checks the session-time window first, so leaving the trading
//! window preempts whatever else is going on.
//!
//! Outbound messages are persisted under their sequence number before the
//! bytes are handed to the transport; replay after a crash depends on that
//! ordering.

use crate::admin;
use crate::application::{Application, FromAdminError};
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::event::{FixIn, SessionEvent, TimerEvent};
use crate::log::{NullLog, SessionLog, TracingLog};
use crate::reject::{Reject, VerifyError};
use crate::schedule::SessionSchedule;
use crate::sequence::{check_sequence, plan_resend_request, ResendRange, SeqCheck};
use crate::state::{SessionState, StateMachine};
use crate::timer::{peer_timeout, TimerSet};
use bytes::Bytes;
use chrono::{DateTime, Offset, Utc};
use oxfix_core::error::{EncodeError, FixError, SessionError, StoreError};
use oxfix_core::message::Message;
use oxfix_core::tags::{self, MsgType};
use oxfix_core::types::{SessionId, Timestamp};
use oxfix_store::MessageStore;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

/// Event channel capacity.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Sleep horizon used when no timer is armed.
const IDLE_SLEEP: Duration = Duration::from_secs(86_400);

/// Error surfaced by a state handler.
#[derive(Debug)]
pub(crate) enum HandlerError {
    /// A verification outcome the state machine routes (gaps, rejects).
    Verify(VerifyError),
    /// A store/encode failure; the session logs it and drops to latent.
    Fatal(FixError),
}

impl From<VerifyError> for HandlerError {
    fn from(err: VerifyError) -> Self {
        Self::Verify(err)
    }
}

impl From<Reject> for HandlerError {
    fn from(err: Reject) -> Self {
        Self::Verify(VerifyError::Reject(err))
    }
}

impl From<FixError> for HandlerError {
    fn from(err: FixError) -> Self {
        Self::Fatal(err)
    }
}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        Self::Fatal(FixError::Store(err))
    }
}

impl From<EncodeError> for HandlerError {
    fn from(err: EncodeError) -> Self {
        Self::Fatal(FixError::Encode(err))
    }
}

/// A FIX session: coordinator state plus its collaborators.
///
/// Construct with [`Session::new`], then either [`Session::spawn`] it onto
/// the runtime or drive [`Session::run`] with a channel from
/// [`SessionHandle::channel`].
pub struct Session {
    pub(crate) session_id: SessionId,
    pub(crate) config: SessionConfig,
    pub(crate) store: Box<dyn MessageStore>,
    pub(crate) application: Box<dyn Application>,
    pub(crate) log: Box<dyn SessionLog>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) state: StateMachine,
    /// Effective heartbeat interval; the peer's Logon may override it.
    pub(crate) heart_bt_int: Duration,
    /// True while our own Logon-with-reset is outstanding.
    pub(crate) sent_reset: bool,
    /// SendingTime staleness checks are suspended during resend replay.
    pub(crate) skip_check_latency: bool,
    /// TestReqID we are waiting to see echoed in a Heartbeat.
    pub(crate) outstanding_test_req: Option<String>,
    /// Outbound application messages pending admission.
    pub(crate) send_queue: VecDeque<Message>,
    /// The inbound gap being filled, present only in the resend states.
    pub(crate) resend_range: Option<ResendRange>,
    /// Post-gap inbound messages held until the gap is filled.
    pub(crate) message_stash: BTreeMap<u64, Message>,
    pub(crate) timers: TimerSet,
    /// Outbound byte sink while the transport is up.
    pub(crate) conn: Option<mpsc::UnboundedSender<Bytes>>,
    /// One-shot fired when the session re-enters its trading window.
    pub(crate) notify_in_session: Option<Arc<Notify>>,
    decoder: oxfix_codec::Decoder,
}

/// Cloneable control surface for a running session.
///
/// All methods post onto the session's event channel; none of them touch
/// session state directly, which also makes sends issued from inside
/// application callbacks safe (they are deferred to the next loop
/// iteration).
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Creates a handle and the receiving end for [`Session::run`].
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// Enqueues an application message for an admission-gated send.
    ///
    /// Success means the message is queued, not that it was (or will be)
    /// transmitted; messages queued while not logged on are dropped.
    ///
    /// # Errors
    /// Returns `SessionError::ChannelClosed` if the session has shut down.
    pub async fn send(&self, msg: Message) -> Result<(), SessionError> {
        self.tx
            .send(SessionEvent::SendApp(msg))
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    /// Delivers one complete inbound frame.
    ///
    /// # Errors
    /// Returns `SessionError::ChannelClosed` if the session has shut down.
    pub async fn incoming(&self, bytes: Bytes, receive_time: Timestamp) -> Result<(), SessionError> {
        self.tx
            .send(SessionEvent::Incoming(FixIn {
                bytes,
                receive_time,
            }))
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    /// Notifies the session that the transport connected, handing it the
    /// outbound byte sink.
    ///
    /// # Errors
    /// Returns `SessionError::ChannelClosed` if the session has shut down.
    pub async fn connected(
        &self,
        outbound: mpsc::UnboundedSender<Bytes>,
    ) -> Result<(), SessionError> {
        self.tx
            .send(SessionEvent::Connected(outbound))
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    /// Notifies the session that the transport dropped.
    ///
    /// # Errors
    /// Returns `SessionError::ChannelClosed` if the session has shut down.
    pub async fn disconnected(&self) -> Result<(), SessionError> {
        self.tx
            .send(SessionEvent::Disconnected)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    /// Requests a stop: a clean logout when logged on, immediate otherwise.
    /// Idempotent.
    ///
    /// # Errors
    /// Returns `SessionError::ChannelClosed` if the session has shut down.
    pub async fn stop(&self) -> Result<(), SessionError> {
        self.tx
            .send(SessionEvent::Stop)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }
}

impl Session {
    /// Creates a session. Fires `on_create` on the application.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        config: SessionConfig,
        store: Box<dyn MessageStore>,
        mut application: Box<dyn Application>,
    ) -> Self {
        application.on_create(&session_id);
        let log: Box<dyn SessionLog> = Box::new(TracingLog::new(&session_id));
        let heart_bt_int = config.heart_bt_int;
        Self {
            session_id,
            config,
            store,
            application,
            log,
            clock: Arc::new(SystemClock),
            state: StateMachine::new(),
            heart_bt_int,
            sent_reset: false,
            skip_check_latency: false,
            outstanding_test_req: None,
            send_queue: VecDeque::new(),
            resend_range: None,
            message_stash: BTreeMap::new(),
            timers: TimerSet::new(),
            conn: None,
            notify_in_session: None,
            decoder: oxfix_codec::Decoder::new(),
        }
    }

    /// Replaces the session log.
    #[must_use]
    pub fn with_log(mut self, log: Box<dyn SessionLog>) -> Self {
        self.log = log;
        self
    }

    /// Silences the session log.
    #[must_use]
    pub fn with_null_log(self) -> Self {
        self.with_log(Box::new(NullLog))
    }

    /// Replaces the clock (for tests).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the session identity.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns the current state variant.
    #[must_use]
    pub fn current_state(&self) -> SessionState {
        self.state.current
    }

    /// Returns true if the logon handshake has completed.
    #[must_use]
    pub fn is_logged_on(&self) -> bool {
        self.state.current.is_logged_on()
    }

    /// Returns true if a transport connection is attached.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.current.is_connected()
    }

    /// Returns true if the session is inside its trading window.
    #[must_use]
    pub fn is_session_time(&self) -> bool {
        self.state.current.is_session_time()
    }

    /// Returns true once a requested stop has converged.
    #[must_use]
    pub fn stopped(&self) -> bool {
        self.state.stopped
    }

    /// Spawns the coordinator loop onto the current runtime.
    #[must_use]
    pub fn spawn(self) -> SessionHandle {
        let (handle, events) = SessionHandle::channel();
        tokio::spawn(self.run(events));
        handle
    }

    /// Runs the coordinator loop until the session stops or every handle is
    /// dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) {
        self.start().await;

        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.state.stopped {
            let deadline = self.timers.next_deadline();
            let timer_sleep = sleep_until(deadline.unwrap_or_else(|| Instant::now() + IDLE_SLEEP));

            tokio::select! {
                biased;
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => self.on_event(event).await,
                    None => {
                        // Every handle dropped: nothing can control this
                        // session any more, so stop without waiting for the
                        // counterparty's Logout.
                        self.on_event(SessionEvent::Stop).await;
                        break;
                    }
                },
                _ = ticker.tick() => self.on_tick().await,
                () = timer_sleep, if deadline.is_some() => self.fire_due_timers().await,
            }
        }
    }

    /// Transitions from stopped to latent and arms the session-time check.
    pub(crate) async fn start(&mut self) {
        self.state.pending_stop = false;
        self.state.stopped = false;
        self.state.current = SessionState::Latent;
        self.check_session_time(self.clock.now()).await;
    }

    pub(crate) async fn on_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected(outbound) => self.on_connected(outbound).await,
            SessionEvent::Disconnected => self.on_disconnected().await,
            SessionEvent::Incoming(fix_in) => self.on_incoming(fix_in).await,
            SessionEvent::Timer(timer_event) => self.on_timeout(timer_event).await,
            SessionEvent::SendApp(msg) => {
                self.send_queue.push_back(msg);
                self.send_app_messages().await;
            }
            SessionEvent::Stop => self.handle_stop().await,
        }
    }

    pub(crate) async fn on_tick(&mut self) {
        let now = self.clock.now();
        self.check_session_time(now).await;
        self.check_reset_time(now).await;
    }

    pub(crate) async fn fire_due_timers(&mut self) {
        let due = self.timers.take_due(Instant::now());
        for event in due {
            self.on_timeout(event).await;
        }
    }

    /// Transport connected. Refused outside the trading window or when a
    /// connection is already attached.
    pub(crate) async fn on_connected(&mut self, outbound: mpsc::UnboundedSender<Bytes>) {
        self.check_session_time(self.clock.now()).await;
        if !self.is_session_time() {
            self.log.on_event("connection outside of session time");
            return;
        }
        if self.is_connected() {
            self.log.on_event("already connected");
            return;
        }

        self.conn = Some(outbound);

        if !self.config.initiate_logon {
            // Acceptors wait for the counterparty's Logon.
            self.set_state(SessionState::Logon).await;
            return;
        }

        if self.config.refresh_on_logon {
            if let Err(err) = self.store.refresh().await {
                self.log_error(&err.into());
                return;
            }
        }
        if self.config.reset_on_logon {
            if let Err(err) = self.store.reset().await {
                self.log_error(&err.into());
                return;
            }
        }

        self.log.on_event("sending logon request");
        if let Err(err) = self.send_logon().await {
            self.log_error(&err);
            return;
        }
        self.set_state(SessionState::Logon).await;
        self.timers.arm_logon(self.config.logon_timeout);
    }

    pub(crate) async fn on_disconnected(&mut self) {
        if self.is_connected() {
            self.set_state(SessionState::Latent).await;
        }
    }

    /// Raw inbound bytes: log, parse, dispatch. The peer-liveness deadline
    /// re-arms on every frame, parseable or not.
    pub(crate) async fn on_incoming(&mut self, fix_in: FixIn) {
        self.check_session_time(self.clock.now()).await;
        if !self.is_connected() {
            return;
        }

        self.log.on_incoming(&fix_in.bytes);

        match self.decoder.decode(&fix_in.bytes) {
            Ok(mut msg) => {
                msg.receive_time = Some(fix_in.receive_time);
                self.fix_msg_in(msg).await;
            }
            Err(err) => {
                self.log.on_event(&format!(
                    "message parse error: {err}, {:?}",
                    String::from_utf8_lossy(&fix_in.bytes)
                ));
            }
        }

        // Handling may have disconnected us; timers stay down in that case.
        if self.is_connected() {
            self.timers.arm_peer(peer_timeout(self.heart_bt_int));
        }
    }

    pub(crate) async fn fix_msg_in(&mut self, msg: Message) {
        let current = self.state.current;
        let next = current.fix_msg_in(self, msg).await;
        self.set_state(next).await;
    }

    pub(crate) async fn on_timeout(&mut self, event: TimerEvent) {
        self.check_session_time(self.clock.now()).await;
        let current = self.state.current;
        let next = current.timeout(self, event).await;
        self.set_state(next).await;
    }

    pub(crate) async fn handle_stop(&mut self) {
        self.state.pending_stop = true;
        let current = self.state.current;
        let next = current.stop(self).await;
        self.set_state(next).await;
    }

    /// Drains the send queue when logged on; drops it otherwise.
    pub(crate) async fn send_app_messages(&mut self) {
        self.check_session_time(self.clock.now()).await;

        if self.is_logged_on() {
            while let Some(msg) = self.send_queue.pop_front() {
                if let Err(err) = self.send_app_message(msg).await {
                    self.log_error(&err);
                }
            }
        } else if !self.send_queue.is_empty() {
            self.log
                .on_event("dropping queued application messages: not logged on");
            self.send_queue.clear();
        }
    }

    /// Prepares and transmits one application message: header fill, sequence
    /// assignment, `to_app` veto, persist, transmit, increment.
    async fn send_app_message(&mut self, mut msg: Message) -> Result<(), FixError> {
        self.fill_default_header(&mut msg, None);
        let seq_num = self.store.next_sender_seq();
        msg.header.set_u64(tags::MSG_SEQ_NUM, seq_num);

        if self.application.to_app(&mut msg, &self.session_id).is_err() {
            self.log.on_event("application vetoed outbound message");
            return Ok(());
        }

        let bytes = oxfix_codec::encode(&msg)?;
        self.store
            .save_message_and_incr_next_sender_seq(seq_num, &bytes)
            .await?;
        self.transmit(bytes);
        Ok(())
    }

    /// Prepares and transmits one administrative message. A Logon carrying
    /// ResetSeqNumFlag=Y resets the store first and re-reads its sequence
    /// number.
    pub(crate) async fn send_admin(
        &mut self,
        mut msg: Message,
        in_reply_to: Option<&Message>,
    ) -> Result<(), FixError> {
        self.fill_default_header(&mut msg, in_reply_to);
        let mut seq_num = self.store.next_sender_seq();
        msg.header.set_u64(tags::MSG_SEQ_NUM, seq_num);

        self.application.to_admin(&mut msg, &self.session_id);

        if msg.msg_type() == Some(MsgType::Logon)
            && msg.body.get_bool(tags::RESET_SEQ_NUM_FLAG).unwrap_or(false)
        {
            self.store.reset().await?;
            self.sent_reset = true;
            seq_num = self.store.next_sender_seq();
            msg.header.set_u64(tags::MSG_SEQ_NUM, seq_num);
        }

        let bytes = oxfix_codec::encode(&msg)?;
        self.store
            .save_message_and_incr_next_sender_seq(seq_num, &bytes)
            .await?;
        self.transmit(bytes);
        Ok(())
    }

    /// Hands bytes to the transport and re-arms the heartbeat deadline.
    pub(crate) fn transmit(&mut self, bytes: Bytes) {
        match &self.conn {
            Some(conn) => {
                self.log.on_outgoing(&bytes);
                if conn.send(bytes).is_err() {
                    self.log.on_event("failed to send: transport closed");
                }
            }
            None => {
                self.log.on_event("failed to send: disconnected");
                return;
            }
        }
        self.timers.arm_heartbeat(self.heart_bt_int);
    }

    /// Stamps the standard header: BeginString, comp/sub/location ids,
    /// SendingTime, and optionally LastMsgSeqNumProcessed.
    pub(crate) fn fill_default_header(&self, msg: &mut Message, in_reply_to: Option<&Message>) {
        msg.header
            .set(tags::BEGIN_STRING, self.session_id.begin_string.clone());
        msg.header
            .set(tags::SENDER_COMP_ID, self.session_id.sender_comp_id.as_str());
        msg.header
            .set(tags::TARGET_COMP_ID, self.session_id.target_comp_id.as_str());
        if let Some(sub) = &self.session_id.sender_sub_id {
            msg.header.set(tags::SENDER_SUB_ID, sub.clone());
        }
        if let Some(loc) = &self.session_id.sender_location_id {
            msg.header.set(tags::SENDER_LOCATION_ID, loc.clone());
        }
        if let Some(sub) = &self.session_id.target_sub_id {
            msg.header.set(tags::TARGET_SUB_ID, sub.clone());
        }
        if let Some(loc) = &self.session_id.target_location_id {
            msg.header.set(tags::TARGET_LOCATION_ID, loc.clone());
        }
        msg.header
            .set_timestamp(tags::SENDING_TIME, Timestamp::new(self.clock.now()));

        if self.config.enable_last_msg_seq_num_processed {
            let last = match in_reply_to.and_then(Message::seq_num) {
                Some(seq) => seq,
                None => self.store.next_target_seq().saturating_sub(1),
            };
            msg.header.set_u64(tags::LAST_MSG_SEQ_NUM_PROCESSED, last);
        }
    }

    pub(crate) async fn send_logon(&mut self) -> Result<(), FixError> {
        self.send_logon_in_reply_to(self.config.reset_on_logon, None)
            .await
    }

    /// Sends a Logon, dropping any queued application messages first.
    pub(crate) async fn send_logon_in_reply_to(
        &mut self,
        set_reset_seq_num: bool,
        in_reply_to: Option<&Message>,
    ) -> Result<(), FixError> {
        self.send_queue.clear();
        let logon = admin::logon(
            self.heart_bt_int,
            set_reset_seq_num,
            self.config.default_appl_ver_id.as_deref(),
        );
        self.send_admin(logon, in_reply_to).await
    }

    pub(crate) async fn send_logout_in_reply_to(
        &mut self,
        reason: &str,
        in_reply_to: Option<&Message>,
    ) -> Result<(), FixError> {
        let text = if reason.is_empty() { None } else { Some(reason) };
        self.send_admin(admin::logout(text), in_reply_to).await
    }

    pub(crate) async fn initiate_logout(&mut self, reason: &str) -> Result<(), FixError> {
        self.initiate_logout_in_reply_to(reason, None).await
    }

    /// Sends a Logout and arms the logout timeout.
    pub(crate) async fn initiate_logout_in_reply_to(
        &mut self,
        reason: &str,
        in_reply_to: Option<&Message>,
    ) -> Result<(), FixError> {
        self.send_logout_in_reply_to(reason, in_reply_to).await?;
        self.log.on_event("initiated logout request");
        self.timers.arm_logout(self.config.logout_timeout);
        Ok(())
    }

    /// Logs the reason, sends a Logout carrying it, optionally consumes the
    /// offending message's sequence number, and drops to latent.
    pub(crate) async fn shutdown_with_reason(
        &mut self,
        msg: &Message,
        incr_next_target: bool,
        reason: &str,
    ) -> SessionState {
        self.log.on_event(reason);
        if let Err(err) = self.send_logout_in_reply_to(reason, Some(msg)).await {
            self.log_error(&err);
        }
        if incr_next_target {
            if let Err(err) = self.store.incr_next_target_seq().await {
                self.log_error(&err.into());
            }
        }
        SessionState::Latent
    }

    // ---- inbound verification ---------------------------------------------

    pub(crate) async fn verify(&mut self, msg: &Message) -> Result<(), HandlerError> {
        self.verify_select(msg, true, true).await
    }

    /// The inbound verification pipeline: BeginString, CompIDs, SendingTime
    /// staleness, sequence checks, then the application callback.
    pub(crate) async fn verify_select(
        &mut self,
        msg: &Message,
        check_too_high: bool,
        check_too_low: bool,
    ) -> Result<(), HandlerError> {
        self.check_begin_string(msg)?;
        self.check_comp_id(msg)?;
        self.check_sending_time(msg)?;
        if check_too_high {
            self.check_target_too_high(msg)?;
        }
        if check_too_low {
            self.check_target_too_low(msg)?;
        }
        self.from_callback(msg)
    }

    fn from_callback(&mut self, msg: &Message) -> Result<(), HandlerError> {
        if msg.is_admin() {
            self.application
                .from_admin(msg, &self.session_id)
                .map_err(|err| match err {
                    FromAdminError::RejectLogon { reason } => {
                        HandlerError::Verify(VerifyError::RejectLogon { reason })
                    }
                    FromAdminError::Reject(reject) => {
                        HandlerError::Verify(VerifyError::Reject(reject))
                    }
                })
        } else {
            self.application
                .from_app(msg, &self.session_id)
                .map_err(|reject| HandlerError::Verify(VerifyError::Reject(reject)))
        }
    }

    pub(crate) fn check_begin_string(&self, msg: &Message) -> Result<(), VerifyError> {
        match msg.header.get(tags::BEGIN_STRING) {
            Some(begin) if begin == self.session_id.begin_string => Ok(()),
            other => Err(VerifyError::IncorrectBeginString {
                received: other.unwrap_or_default().to_string(),
            }),
        }
    }

    /// Inbound comp ids must mirror ours: their sender is our target.
    pub(crate) fn check_comp_id(&self, msg: &Message) -> Result<(), VerifyError> {
        let sender = msg.header.get(tags::SENDER_COMP_ID);
        let target = msg.header.get(tags::TARGET_COMP_ID);
        match (sender, target) {
            (None, _) => Err(Reject::required_tag_missing(tags::SENDER_COMP_ID).into()),
            (_, None) => Err(Reject::required_tag_missing(tags::TARGET_COMP_ID).into()),
            (Some(sender), Some(target))
                if sender == self.session_id.target_comp_id.as_str()
                    && target == self.session_id.sender_comp_id.as_str() =>
            {
                Ok(())
            }
            _ => Err(Reject::comp_id_problem().into()),
        }
    }

    /// SendingTime must be within `max_latency` of the receive time. The
    /// check is suspended while a resend is in flight, since replayed
    /// messages are legitimately old.
    pub(crate) fn check_sending_time(&self, msg: &Message) -> Result<(), VerifyError> {
        if self.skip_check_latency {
            return Ok(());
        }

        let raw = match msg.header.get(tags::SENDING_TIME) {
            Some(raw) => raw,
            None => return Err(Reject::required_tag_missing(tags::SENDING_TIME).into()),
        };
        let sending_time = match Timestamp::parse_fix(raw) {
            Some(ts) => ts,
            None => return Err(Reject::incorrect_data_format(tags::SENDING_TIME).into()),
        };

        let received = msg
            .receive_time
            .map(Timestamp::as_datetime)
            .unwrap_or_else(|| self.clock.now());
        let delta = (received - sending_time.as_datetime()).abs();
        let max_latency =
            chrono::Duration::from_std(self.config.max_latency).unwrap_or(chrono::Duration::MAX);
        if delta > max_latency {
            return Err(Reject::sending_time_accuracy_problem().into());
        }
        Ok(())
    }

    pub(crate) fn check_target_too_high(&self, msg: &Message) -> Result<(), VerifyError> {
        let received = self.require_seq_num(msg)?;
        match check_sequence(self.store.next_target_seq(), received) {
            SeqCheck::TooHigh { expected, received } => {
                Err(VerifyError::TargetTooHigh { expected, received })
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn check_target_too_low(&self, msg: &Message) -> Result<(), VerifyError> {
        let received = self.require_seq_num(msg)?;
        match check_sequence(self.store.next_target_seq(), received) {
            SeqCheck::TooLow { expected, received } => {
                Err(VerifyError::TargetTooLow { expected, received })
            }
            _ => Ok(()),
        }
    }

    fn require_seq_num(&self, msg: &Message) -> Result<u64, VerifyError> {
        if !msg.header.has(tags::MSG_SEQ_NUM) {
            return Err(Reject::required_tag_missing(tags::MSG_SEQ_NUM).into());
        }
        msg.seq_num()
            .ok_or_else(|| Reject::incorrect_data_format(tags::MSG_SEQ_NUM).into())
    }

    // ---- gap recovery -----------------------------------------------------

    /// Detected an inbound gap: log it and request a resend of
    /// `[expected, received - 1]`.
    pub(crate) async fn do_target_too_high(
        &mut self,
        expected: u64,
        received: u64,
    ) -> Result<(), FixError> {
        self.log.on_event(&format!(
            "MsgSeqNum too high, expecting {expected} but received {received}"
        ));
        self.send_resend_request(expected, received - 1).await
    }

    /// Sends one (possibly chunked) ResendRequest and installs the resend
    /// range. Staleness checks stay suspended until the range is satisfied.
    pub(crate) async fn send_resend_request(
        &mut self,
        begin: u64,
        range_end: u64,
    ) -> Result<(), FixError> {
        let (wire_end, chunk_end) =
            plan_resend_request(begin, range_end, self.config.resend_request_chunk_size);

        self.send_admin(admin::resend_request(begin, wire_end), None)
            .await?;

        self.resend_range = Some(ResendRange {
            begin,
            end: range_end,
            chunk_end,
        });
        self.skip_check_latency = true;
        self.log
            .on_event(&format!("sent ResendRequest from {begin} to {wire_end}"));
        Ok(())
    }

    /// Clears gap-recovery state when leaving the resend states.
    pub(crate) fn clear_resend_state(&mut self) {
        self.resend_range = None;
        self.message_stash.clear();
        self.skip_check_latency = false;
    }

    /// Replays stored messages `[begin, end]` for an inbound ResendRequest.
    ///
    /// Administrative messages and application messages the `to_app` hook
    /// vetoes are not replayed; each contiguous run of them collapses into a
    /// single SequenceReset(GapFill=Y). Replayed application messages carry
    /// PossDupFlag=Y and OrigSendingTime, with BodyLength and CheckSum
    /// recomputed. Replayed bytes do not consume new sequence numbers.
    pub(crate) async fn resend_messages(
        &mut self,
        begin: u64,
        end: u64,
        in_reply_to: &Message,
    ) -> Result<(), FixError> {
        let stored = self.store.get_messages(begin, end).await?;

        let mut seq_num = begin;
        let mut next_seq_num = seq_num;
        for (stored_seq, bytes) in stored {
            let mut msg = match self.decoder.decode(&bytes) {
                Ok(msg) => msg,
                Err(err) => {
                    self.log
                        .on_event(&format!("stored message {stored_seq} unparseable: {err}"));
                    return Err(err.into());
                }
            };

            if msg.is_admin() {
                next_seq_num = stored_seq + 1;
                continue;
            }
            if !self.prepare_resend(&mut msg) {
                next_seq_num = stored_seq + 1;
                continue;
            }

            if seq_num != stored_seq {
                self.generate_sequence_reset(seq_num, stored_seq, in_reply_to)?;
            }

            self.log.on_event(&format!("resending message {stored_seq}"));
            let bytes = oxfix_codec::encode(&msg)?;
            self.transmit(bytes);

            seq_num = stored_seq + 1;
            next_seq_num = seq_num;
        }

        if seq_num != next_seq_num {
            self.generate_sequence_reset(seq_num, next_seq_num, in_reply_to)?;
        }
        Ok(())
    }

    /// Stamps PossDupFlag/OrigSendingTime for replay and offers the
    /// application its `to_app` veto.
    ///
    /// # Returns
    /// `false` if the application answered DoNotSend.
    fn prepare_resend(&mut self, msg: &mut Message) -> bool {
        msg.header.set_bool(tags::POSS_DUP_FLAG, true);
        if let Some(orig) = msg.header.get(tags::SENDING_TIME).map(str::to_string) {
            msg.header.set(tags::ORIG_SENDING_TIME, orig);
        }
        msg.header
            .set_timestamp(tags::SENDING_TIME, Timestamp::new(self.clock.now()));

        self.application.to_app(msg, &self.session_id).is_ok()
    }

    /// Emits a SequenceReset(GapFill=Y) covering `[begin, new_seq_no)`,
    /// stamped with the original sequence number and PossDupFlag=Y.
    fn generate_sequence_reset(
        &mut self,
        begin: u64,
        new_seq_no: u64,
        in_reply_to: &Message,
    ) -> Result<(), FixError> {
        let mut msg = admin::sequence_reset(new_seq_no, true);
        self.fill_default_header(&mut msg, Some(in_reply_to));
        msg.header.set_u64(tags::MSG_SEQ_NUM, begin);
        msg.header.set_bool(tags::POSS_DUP_FLAG, true);
        if let Some(sending_time) = msg.header.get(tags::SENDING_TIME).map(str::to_string) {
            msg.header.set(tags::ORIG_SENDING_TIME, sending_time);
        }

        let bytes = oxfix_codec::encode(&msg)?;
        self.transmit(bytes);
        self.log
            .on_event(&format!("sent SequenceReset to {new_seq_no}"));
        Ok(())
    }

    /// Builds and sends the session- or business-level Reject for a refused
    /// inbound message.
    pub(crate) async fn do_reject(&mut self, msg: &Message, reject: &Reject) -> Result<(), FixError> {
        let mut reply = if reject.is_business() {
            let mut reply = Message::with_msg_type("j");
            if let Some(reason) = reject.business_reason() {
                reply.body.set_u64(tags::BUSINESS_REJECT_REASON, reason);
            }
            reply
        } else {
            let mut reply = Message::with_msg_type("3");
            reply
                .body
                .set_u64(tags::SESSION_REJECT_REASON, reject.reason().value());
            if let Some(ref_tag) = reject.ref_tag() {
                reply.body.set_u64(tags::REF_TAG_ID, u64::from(ref_tag));
            }
            reply
        };

        reply.body.set(tags::TEXT, reject.text());
        if let Some(msg_type) = msg.header.get(tags::MSG_TYPE) {
            reply.body.set(tags::REF_MSG_TYPE, msg_type);
        }
        if let Some(seq_num) = msg.seq_num() {
            reply.body.set_u64(tags::REF_SEQ_NUM, seq_num);
        }

        self.log
            .on_event(&format!("message rejected: {}", reject.text()));
        self.send_admin(reply, Some(msg)).await
    }

    // ---- session time -----------------------------------------------------

    /// Preempts the current state when the trading window opens or closes,
    /// and resets the session when the store's creation time belongs to a
    /// previous window instance.
    pub(crate) async fn check_session_time(&mut self, now: DateTime<Utc>) {
        let schedule = match &self.config.schedule {
            Some(schedule) => schedule.clone(),
            None => return,
        };

        if !schedule.is_in_range(now) {
            if self.is_session_time() {
                self.log.on_event("not in session");
            }
            let current = self.state.current;
            current.shutdown_now(self).await;
            self.set_state(SessionState::NotSessionTime).await;
            if self.notify_in_session.is_none() {
                self.notify_in_session = Some(Arc::new(Notify::new()));
            }
            return;
        }

        if !self.is_session_time() {
            self.log.on_event("in session");
            self.notify_in_session_time();
            self.set_state(SessionState::Latent).await;
        }

        if !schedule.is_in_same_range(self.store.creation_time(), now) {
            self.log.on_event("session reset");
            let current = self.state.current;
            current.shutdown_now(self).await;
            if let Err(err) = self.drop_and_reset().await {
                self.log_error(&err);
            }
            self.set_state(SessionState::Latent).await;
        }
    }

    /// Emits a Logon with ResetSeqNumFlag=Y at the configured daily reset
    /// time, as a mid-session resynchronization.
    pub(crate) async fn check_reset_time(&mut self, now: DateTime<Utc>) {
        let reset_time = match self.config.reset_seq_time {
            Some(time) => time,
            None => return,
        };
        let offset = self
            .config
            .schedule
            .as_ref()
            .map(SessionSchedule::offset)
            .unwrap_or_else(|| Utc.fix());

        if SessionSchedule::matches_time_of_day(now, offset, reset_time) {
            self.log.on_event("daily sequence reset");
            if let Err(err) = self.send_logon_in_reply_to(true, None).await {
                self.log_error(&err);
            }
        }
    }

    // ---- state transitions ------------------------------------------------

    /// Installs the next state, running disconnect side-effects when leaving
    /// a connected state and converging a pending stop.
    pub(crate) async fn set_state(&mut self, next: SessionState) {
        if !next.is_connected() {
            if self.is_connected() {
                self.handle_disconnect_state().await;
            }
            if self.state.pending_stop {
                self.state.stopped = true;
                self.notify_in_session_time();
            }
        }
        self.state.current = next;
    }

    /// `on_logout` fires when the outgoing state was logged on, waiting for
    /// a logout reply, or an initiator mid-handshake.
    async fn handle_disconnect_state(&mut self) {
        let current = self.state.current;
        let do_on_logout = current.is_logged_on()
            || current == SessionState::Logout
            || (current == SessionState::Logon && self.config.initiate_logon);

        if do_on_logout {
            self.application.on_logout(&self.session_id);
        }
        self.on_disconnect().await;
    }

    /// Drops the transport, disarms every timer, clears gap-recovery state.
    async fn on_disconnect(&mut self) {
        self.log.on_event("disconnected");
        if self.config.reset_on_disconnect {
            if let Err(err) = self.drop_and_reset().await {
                self.log_error(&err);
            }
        }
        self.conn = None;
        self.timers.disarm_all();
        self.clear_resend_state();
        self.outstanding_test_req = None;
    }

    /// Drops the send queue and resets the store.
    pub(crate) async fn drop_and_reset(&mut self) -> Result<(), FixError> {
        self.send_queue.clear();
        self.store.reset().await?;
        Ok(())
    }

    /// Fires (at most once per out-of-window episode) the in-session-time
    /// notifier.
    pub(crate) fn notify_in_session_time(&mut self) {
        if let Some(notify) = self.notify_in_session.take() {
            notify.notify_waiters();
        }
    }

    /// Clears an outstanding TestRequest when the Heartbeat echoes its id.
    pub(crate) fn note_heartbeat(&mut self, msg: &Message) {
        if let (Some(outstanding), Some(echoed)) = (
            self.outstanding_test_req.as_deref(),
            msg.body.get(tags::TEST_REQ_ID),
        ) {
            if outstanding == echoed {
                self.outstanding_test_req = None;
            }
        }
    }

    /// Logs a fatal handler error and drops to latent.
    pub(crate) fn handle_state_error(&mut self, err: &FixError) -> SessionState {
        self.log_error(err);
        SessionState::Latent
    }

    pub(crate) fn log_error(&self, err: &FixError) {
        self.log.on_event(&format!("error: {err}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::SessionSchedule;
    use crate::testutil::SessionRig;
    use chrono::{NaiveTime, TimeZone};
    use std::sync::atomic::Ordering;

    fn order() -> Message {
        let mut msg = Message::with_msg_type("D");
        msg.body.set(11, "ORDER-1");
        msg
    }

    // ---- logon scenarios --------------------------------------------------

    #[tokio::test]
    async fn test_initiator_logon_handshake() {
        let mut rig = SessionRig::with_config(SessionConfig::new().with_initiate_logon(true));
        rig.session.conn = None;

        rig.session.on_connected(rig.outbound_tx.clone()).await;

        assert_eq!(rig.session.current_state(), SessionState::Logon);
        let sent = rig.last_sent().unwrap();
        assert_eq!(sent.msg_type(), Some(MsgType::Logon));
        assert_eq!(sent.seq_num(), Some(1));
        assert_eq!(sent.body.get(tags::ENCRYPT_METHOD), Some("0"));
        assert_eq!(sent.body.get_u64(tags::HEART_BT_INT), Some(30));
        assert_eq!(rig.next_sender(), 2);
        assert!(!rig.session.timers.all_disarmed());

        let mut reply = rig.factory.logon();
        reply.body.set_u64(tags::HEART_BT_INT, 30);
        rig.session.fix_msg_in(reply).await;

        assert_eq!(rig.session.current_state(), SessionState::InSession);
        assert_eq!(rig.next_target(), 2);
        assert_eq!(rig.next_sender(), 2);
        assert_eq!(rig.app().on_logon_count, 1);
    }

    #[tokio::test]
    async fn test_initiator_reset_on_logon() {
        let mut rig = SessionRig::with_config(
            SessionConfig::new()
                .with_initiate_logon(true)
                .with_reset_on_logon(true),
        );
        rig.session.conn = None;
        rig.session.store.set_next_sender_seq(5).await.unwrap();
        rig.session.store.set_next_target_seq(5).await.unwrap();

        rig.session.on_connected(rig.outbound_tx.clone()).await;

        let sent = rig.last_sent().unwrap();
        assert_eq!(sent.msg_type(), Some(MsgType::Logon));
        assert_eq!(sent.seq_num(), Some(1));
        assert_eq!(sent.body.get_bool(tags::RESET_SEQ_NUM_FLAG), Some(true));
        assert!(rig.session.sent_reset);

        let mut reply = rig.factory.logon();
        reply.body.set_u64(tags::HEART_BT_INT, 30);
        reply.body.set_bool(tags::RESET_SEQ_NUM_FLAG, true);
        rig.session.fix_msg_in(reply).await;

        assert_eq!(rig.session.current_state(), SessionState::InSession);
        assert_eq!(rig.next_sender(), 2);
        assert_eq!(rig.next_target(), 2);
        assert!(!rig.session.sent_reset);
    }

    #[tokio::test]
    async fn test_acceptor_refuses_second_connection() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);

        let (other_tx, _other_rx) = mpsc::unbounded_channel();
        rig.session.on_connected(other_tx).await;

        // Still wired to the first transport.
        assert_eq!(rig.session.current_state(), SessionState::InSession);
        rig.session.transmit(Bytes::from_static(b"x"));
        assert_eq!(rig.outbound.try_recv().unwrap(), Bytes::from_static(b"x"));
    }

    // ---- outbound sends ---------------------------------------------------

    #[tokio::test]
    async fn test_send_persists_before_transmit() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);

        rig.session.on_event(SessionEvent::SendApp(order())).await;

        let wire = rig.outbound.try_recv().unwrap();
        let stored = rig.session.store.get_messages(1, 1).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].0, 1);
        assert_eq!(stored[0].1, wire);

        let msg = oxfix_codec::decode(&wire).unwrap();
        assert_eq!(msg.msg_type(), Some(MsgType::Application("D".to_string())));
        assert_eq!(msg.seq_num(), Some(1));
        assert_eq!(msg.header.get(tags::SENDER_COMP_ID), Some("SENDER"));
        assert_eq!(msg.header.get(tags::TARGET_COMP_ID), Some("TARGET"));
        assert!(msg.header.has(tags::SENDING_TIME));

        assert_eq!(rig.next_sender(), 2);
        assert_eq!(rig.app().to_app_count, 1);
        assert!(rig.app().last_to_app.is_some());
    }

    #[tokio::test]
    async fn test_send_queue_dropped_when_not_logged_on() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::Latent);

        rig.session.on_event(SessionEvent::SendApp(order())).await;

        assert!(rig.session.send_queue.is_empty());
        assert!(rig.no_message_sent());
        assert_eq!(rig.next_sender(), 1);
        assert_eq!(rig.app().to_app_count, 0);
        assert!(rig
            .session
            .store
            .get_messages(1, 100)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_send_veto_consumes_no_sequence_number() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);
        rig.app().veto_to_app = true;

        rig.session.on_event(SessionEvent::SendApp(order())).await;

        assert_eq!(rig.app().to_app_count, 1);
        assert!(rig.no_message_sent());
        assert_eq!(rig.next_sender(), 1);
    }

    #[tokio::test]
    async fn test_send_preserves_order() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);

        let mut first = order();
        first.body.set(11, "FIRST");
        let mut second = order();
        second.body.set(11, "SECOND");
        rig.session.on_event(SessionEvent::SendApp(first)).await;
        rig.session.on_event(SessionEvent::SendApp(second)).await;

        let sent = rig.drain_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].seq_num(), Some(1));
        assert_eq!(sent[0].body.get(11), Some("FIRST"));
        assert_eq!(sent[1].seq_num(), Some(2));
        assert_eq!(sent[1].body.get(11), Some("SECOND"));
    }

    #[tokio::test]
    async fn test_to_admin_runs_once_per_admin_send() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);

        rig.session
            .send_admin(crate::admin::heartbeat(None), None)
            .await
            .unwrap();

        assert_eq!(rig.app().to_admin_count, 1);
        assert_eq!(rig.drain_sent().len(), 1);
    }

    // ---- replay of inbound resend requests --------------------------------

    #[tokio::test]
    async fn test_replay_coalesces_admin_messages_into_gap_fills() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);

        // Outbound history: admin(1), app(2), app(3), admin(4), app(5).
        rig.session
            .send_admin(crate::admin::heartbeat(None), None)
            .await
            .unwrap();
        rig.session.on_event(SessionEvent::SendApp(order())).await;
        rig.session.on_event(SessionEvent::SendApp(order())).await;
        rig.session
            .send_admin(crate::admin::heartbeat(None), None)
            .await
            .unwrap();
        rig.session.on_event(SessionEvent::SendApp(order())).await;
        assert_eq!(rig.next_sender(), 6);
        rig.drain_sent();

        let request = rig.factory.resend_request(1, 0);
        rig.session.fix_msg_in(request).await;

        let sent = rig.drain_sent();
        assert_eq!(sent.len(), 5);

        // Heartbeat at seq 1 collapses into a gap-fill to 2.
        assert_eq!(sent[0].msg_type(), Some(MsgType::SequenceReset));
        assert_eq!(sent[0].seq_num(), Some(1));
        assert_eq!(sent[0].body.get_u64(tags::NEW_SEQ_NO), Some(2));
        assert_eq!(sent[0].body.get_bool(tags::GAP_FILL_FLAG), Some(true));
        assert_eq!(sent[0].header.get_bool(tags::POSS_DUP_FLAG), Some(true));

        // Application messages replay with PossDup stamping.
        for (index, seq) in [(1, 2), (2, 3)] {
            assert_eq!(sent[index].msg_type(), Some(MsgType::Application("D".to_string())));
            assert_eq!(sent[index].seq_num(), Some(seq));
            assert_eq!(sent[index].header.get_bool(tags::POSS_DUP_FLAG), Some(true));
            assert!(sent[index].header.has(tags::ORIG_SENDING_TIME));
        }

        // Heartbeat at seq 4 collapses into a gap-fill to 5.
        assert_eq!(sent[3].msg_type(), Some(MsgType::SequenceReset));
        assert_eq!(sent[3].seq_num(), Some(4));
        assert_eq!(sent[3].body.get_u64(tags::NEW_SEQ_NO), Some(5));

        assert_eq!(sent[4].seq_num(), Some(5));

        // Replays consume no new sequence numbers; the request itself did.
        assert_eq!(rig.next_sender(), 6);
        assert_eq!(rig.next_target(), 2);
    }

    #[tokio::test]
    async fn test_replay_contiguous_admin_run_becomes_one_gap_fill() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);

        rig.session
            .send_admin(crate::admin::heartbeat(None), None)
            .await
            .unwrap();
        rig.session
            .send_admin(crate::admin::heartbeat(None), None)
            .await
            .unwrap();
        rig.drain_sent();

        let request = rig.factory.resend_request(1, 0);
        rig.session.fix_msg_in(request).await;

        let sent = rig.drain_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].msg_type(), Some(MsgType::SequenceReset));
        assert_eq!(sent[0].seq_num(), Some(1));
        assert_eq!(sent[0].body.get_u64(tags::NEW_SEQ_NO), Some(3));
        assert_eq!(sent[0].body.get_bool(tags::GAP_FILL_FLAG), Some(true));
    }

    #[tokio::test]
    async fn test_replay_honors_do_not_send() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);

        rig.session.on_event(SessionEvent::SendApp(order())).await;
        rig.drain_sent();
        rig.app().veto_to_app = true;

        let request = rig.factory.resend_request(1, 0);
        rig.session.fix_msg_in(request).await;

        let sent = rig.drain_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].msg_type(), Some(MsgType::SequenceReset));
        assert_eq!(sent[0].body.get_u64(tags::NEW_SEQ_NO), Some(2));
    }

    #[tokio::test]
    async fn test_replay_bounded_request() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);

        for _ in 0..3 {
            rig.session.on_event(SessionEvent::SendApp(order())).await;
        }
        rig.drain_sent();

        let request = rig.factory.resend_request(2, 2);
        rig.session.fix_msg_in(request).await;

        let sent = rig.drain_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].seq_num(), Some(2));
        assert_eq!(sent[0].header.get_bool(tags::POSS_DUP_FLAG), Some(true));
    }

    // ---- stop -------------------------------------------------------------

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);

        rig.session.handle_stop().await;
        rig.session.handle_stop().await;

        assert_eq!(rig.session.current_state(), SessionState::Logout);
        let sent = rig.drain_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].msg_type(), Some(MsgType::Logout));

        let reply = rig.factory.logout();
        rig.session.fix_msg_in(reply).await;

        assert!(rig.session.stopped());
        assert_eq!(rig.app().on_logout_count, 1);
        assert!(rig.session.timers.all_disarmed());
    }

    #[tokio::test]
    async fn test_disconnect_disarms_all_timers() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);
        rig.session.timers.arm_peer(Duration::from_secs(36));
        rig.session.timers.arm_heartbeat(Duration::from_secs(30));

        rig.session.on_disconnected().await;

        assert_eq!(rig.session.current_state(), SessionState::Latent);
        assert!(rig.session.timers.all_disarmed());
        assert!(rig.session.conn.is_none());
    }

    #[tokio::test]
    async fn test_reset_on_disconnect() {
        let mut rig =
            SessionRig::with_config(SessionConfig::new().with_reset_on_disconnect(true));
        rig.set_state(SessionState::InSession);
        rig.session.store.set_next_sender_seq(7).await.unwrap();

        rig.session.on_disconnected().await;

        assert_eq!(rig.next_sender(), 1);
        assert_eq!(rig.counters.resets.load(Ordering::SeqCst), 1);
    }

    // ---- parse errors -----------------------------------------------------

    #[tokio::test]
    async fn test_parse_error_drops_frame_but_rearms_peer_timer() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);

        rig.session
            .on_incoming(FixIn {
                bytes: Bytes::from_static(b"not a fix message"),
                receive_time: Timestamp::new(rig.clock.now()),
            })
            .await;

        assert_eq!(rig.session.current_state(), SessionState::InSession);
        assert_eq!(rig.next_target(), 1);
        assert!(!rig.session.timers.all_disarmed());
    }

    // ---- session time -----------------------------------------------------

    fn nine_to_five() -> SessionSchedule {
        SessionSchedule::daily(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_leaving_window_parks_the_session() {
        let mut rig =
            SessionRig::with_config(SessionConfig::new().with_schedule(nine_to_five()));
        rig.set_state(SessionState::InSession);

        rig.clock
            .set(Utc.with_ymd_and_hms(2026, 1, 27, 18, 0, 0).unwrap());
        rig.session.on_tick().await;

        assert_eq!(rig.session.current_state(), SessionState::NotSessionTime);
        assert_eq!(rig.app().on_logout_count, 1);
        assert!(rig.session.timers.all_disarmed());
        assert!(rig.session.conn.is_none());

        let sent = rig.drain_sent();
        assert_eq!(sent.last().unwrap().msg_type(), Some(MsgType::Logout));
    }

    #[tokio::test]
    async fn test_reentering_window_resets_previous_day_state() {
        let mut rig =
            SessionRig::with_config(SessionConfig::new().with_schedule(nine_to_five()));
        rig.set_state(SessionState::NotSessionTime);
        rig.session.conn = None;
        rig.session.store.set_next_sender_seq(40).await.unwrap();

        // Next trading day: back in range, but the store was created in the
        // previous window instance.
        rig.clock
            .set(Utc.with_ymd_and_hms(2026, 1, 28, 10, 0, 0).unwrap());
        rig.session.on_tick().await;

        assert_eq!(rig.session.current_state(), SessionState::Latent);
        assert_eq!(rig.next_sender(), 1);
        assert!(rig.counters.resets.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_same_window_does_not_reset() {
        let mut rig =
            SessionRig::with_config(SessionConfig::new().with_schedule(nine_to_five()));
        rig.set_state(SessionState::InSession);
        rig.session.store.set_next_sender_seq(40).await.unwrap();

        rig.clock
            .set(Utc.with_ymd_and_hms(2026, 1, 27, 14, 0, 0).unwrap());
        rig.session.on_tick().await;

        assert_eq!(rig.session.current_state(), SessionState::InSession);
        assert_eq!(rig.next_sender(), 40);
        assert_eq!(rig.counters.resets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_daily_reset_time_sends_logon_with_reset() {
        let reset_at = NaiveTime::from_hms_opt(12, 30, 0).unwrap();
        let mut rig =
            SessionRig::with_config(SessionConfig::new().with_reset_seq_time(reset_at));
        rig.set_state(SessionState::InSession);
        rig.session.store.set_next_sender_seq(9).await.unwrap();

        rig.clock
            .set(Utc.with_ymd_and_hms(2026, 1, 27, 12, 30, 0).unwrap());
        rig.session.on_tick().await;

        let sent = rig.last_sent().unwrap();
        assert_eq!(sent.msg_type(), Some(MsgType::Logon));
        assert_eq!(sent.body.get_bool(tags::RESET_SEQ_NUM_FLAG), Some(true));
        assert_eq!(sent.seq_num(), Some(1));
        assert!(rig.session.sent_reset);
        assert_eq!(rig.next_sender(), 2);
    }

    #[tokio::test]
    async fn test_tick_without_reset_time_sends_nothing() {
        let mut rig = SessionRig::new();
        rig.set_state(SessionState::InSession);

        rig.session.on_tick().await;
        assert!(rig.no_message_sent());
    }

    // ---- run loop ---------------------------------------------------------

    #[tokio::test]
    async fn test_run_loop_stops_from_latent() {
        let mut rig = SessionRig::new();
        rig.session.conn = None;

        let (handle, events) = SessionHandle::channel();
        let task = tokio::spawn(rig.session.run(events));

        handle.stop().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        // The loop is gone; the handle reports the closed channel.
        assert!(handle.send(order()).await.is_err());
    }

    #[tokio::test]
    async fn test_run_loop_accepts_logon_and_logs_out() {
        let mut rig = SessionRig::new();
        rig.session.conn = None;

        let mut logon = rig.factory.logon();
        logon.body.set_u64(tags::HEART_BT_INT, 30);
        let logon_bytes = oxfix_codec::encode(&logon).unwrap();
        let logout = rig.factory.logout();
        let logout_bytes = oxfix_codec::encode(&logout).unwrap();
        let receive_time = Timestamp::new(rig.clock.now());

        let app = rig.app.clone();
        let (handle, events) = SessionHandle::channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(rig.session.run(events));

        handle.connected(out_tx).await.unwrap();
        handle.incoming(logon_bytes, receive_time).await.unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(5), out_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let reply = oxfix_codec::decode(&reply).unwrap();
        assert_eq!(reply.msg_type(), Some(MsgType::Logon));

        handle.stop().await.unwrap();
        let our_logout = tokio::time::timeout(Duration::from_secs(5), out_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let our_logout = oxfix_codec::decode(&our_logout).unwrap();
        assert_eq!(our_logout.msg_type(), Some(MsgType::Logout));

        handle.incoming(logout_bytes, receive_time).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(app.lock().unwrap().on_logon_count, 1);
        assert_eq!(app.lock().unwrap().on_logout_count, 1);
    }
}
