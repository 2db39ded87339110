/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Shared test rig for the session state machine tests.
//!
//! Provides a scripted mock application, a manually advanced clock, a
//! counting store, an inbound message factory speaking as the counterparty,
//! and capture of everything the session transmits.

use crate::application::{Application, DoNotSend, FromAdminError};
use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::reject::Reject;
use crate::session::Session;
use crate::state::SessionState;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use oxfix_core::message::Message;
use oxfix_core::tags;
use oxfix_core::types::{CompId, SessionId, Timestamp};
use oxfix_store::{MemoryStore, MessageStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// A clock pinned to a settable instant.
pub(crate) struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub(crate) fn new(start: DateTime<Utc>) -> Self {
        Self(Mutex::new(start))
    }

    pub(crate) fn set(&self, instant: DateTime<Utc>) {
        *self.0.lock().unwrap() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Observable application activity plus scripted results.
#[derive(Default)]
pub(crate) struct MockAppState {
    pub on_create_count: usize,
    pub on_logon_count: usize,
    pub on_logout_count: usize,
    pub to_admin_count: usize,
    pub from_admin_count: usize,
    pub to_app_count: usize,
    pub from_app_count: usize,
    pub from_admin_result: Option<FromAdminError>,
    pub from_app_result: Option<Reject>,
    pub veto_to_app: bool,
    pub last_to_admin: Option<Message>,
    pub last_to_app: Option<Message>,
    pub last_from_app: Option<Message>,
}

pub(crate) struct MockApplication {
    pub state: Arc<Mutex<MockAppState>>,
}

impl Application for MockApplication {
    fn on_create(&mut self, _session_id: &SessionId) {
        self.state.lock().unwrap().on_create_count += 1;
    }

    fn on_logon(&mut self, _session_id: &SessionId) {
        self.state.lock().unwrap().on_logon_count += 1;
    }

    fn on_logout(&mut self, _session_id: &SessionId) {
        self.state.lock().unwrap().on_logout_count += 1;
    }

    fn to_admin(&mut self, msg: &mut Message, _session_id: &SessionId) {
        let mut state = self.state.lock().unwrap();
        state.to_admin_count += 1;
        state.last_to_admin = Some(msg.clone());
    }

    fn from_admin(&mut self, _msg: &Message, _session_id: &SessionId) -> Result<(), FromAdminError> {
        let mut state = self.state.lock().unwrap();
        state.from_admin_count += 1;
        match state.from_admin_result.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn to_app(&mut self, msg: &mut Message, _session_id: &SessionId) -> Result<(), DoNotSend> {
        let mut state = self.state.lock().unwrap();
        state.to_app_count += 1;
        state.last_to_app = Some(msg.clone());
        if state.veto_to_app {
            Err(DoNotSend)
        } else {
            Ok(())
        }
    }

    fn from_app(&mut self, msg: &Message, _session_id: &SessionId) -> Result<(), Reject> {
        let mut state = self.state.lock().unwrap();
        state.from_app_count += 1;
        state.last_from_app = Some(msg.clone());
        match state.from_app_result.clone() {
            Some(reject) => Err(reject),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub(crate) struct StoreCounters {
    pub resets: AtomicUsize,
    pub refreshes: AtomicUsize,
}

/// Memory store that counts resets/refreshes and takes its creation time
/// from the rig clock, so session-time rollover is testable.
pub(crate) struct TestStore {
    inner: MemoryStore,
    counters: Arc<StoreCounters>,
    clock: Arc<ManualClock>,
    creation_time: Mutex<DateTime<Utc>>,
}

impl TestStore {
    pub(crate) fn new(counters: Arc<StoreCounters>, clock: Arc<ManualClock>) -> Self {
        let creation_time = Mutex::new(clock.now());
        Self {
            inner: MemoryStore::new(),
            counters,
            clock,
            creation_time,
        }
    }
}

#[async_trait]
impl MessageStore for TestStore {
    fn next_sender_seq(&self) -> u64 {
        self.inner.next_sender_seq()
    }

    fn next_target_seq(&self) -> u64 {
        self.inner.next_target_seq()
    }

    async fn incr_next_sender_seq(&self) -> Result<(), oxfix_core::error::StoreError> {
        self.inner.incr_next_sender_seq().await
    }

    async fn incr_next_target_seq(&self) -> Result<(), oxfix_core::error::StoreError> {
        self.inner.incr_next_target_seq().await
    }

    async fn set_next_sender_seq(&self, seq: u64) -> Result<(), oxfix_core::error::StoreError> {
        self.inner.set_next_sender_seq(seq).await
    }

    async fn set_next_target_seq(&self, seq: u64) -> Result<(), oxfix_core::error::StoreError> {
        self.inner.set_next_target_seq(seq).await
    }

    async fn save_message(&self, seq_num: u64, body: &[u8]) -> Result<(), oxfix_core::error::StoreError> {
        self.inner.save_message(seq_num, body).await
    }

    async fn get_messages(
        &self,
        begin: u64,
        end: u64,
    ) -> Result<Vec<(u64, Bytes)>, oxfix_core::error::StoreError> {
        self.inner.get_messages(begin, end).await
    }

    fn creation_time(&self) -> DateTime<Utc> {
        *self.creation_time.lock().unwrap()
    }

    async fn reset(&self) -> Result<(), oxfix_core::error::StoreError> {
        self.counters.resets.fetch_add(1, Ordering::SeqCst);
        *self.creation_time.lock().unwrap() = self.clock.now();
        self.inner.reset().await
    }

    async fn refresh(&self) -> Result<(), oxfix_core::error::StoreError> {
        self.counters.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Builds inbound messages from the counterparty's perspective
/// (SenderCompID=TARGET, TargetCompID=SENDER), stamping consecutive
/// sequence numbers.
pub(crate) struct MessageFactory {
    seq: u64,
    clock: Arc<ManualClock>,
}

impl MessageFactory {
    pub(crate) fn new(clock: Arc<ManualClock>) -> Self {
        Self { seq: 1, clock }
    }

    /// Sets the sequence number the next built message will carry.
    pub(crate) fn set_next_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    fn base(&mut self, msg_type: &str) -> Message {
        let mut msg = Message::with_msg_type(msg_type);
        msg.header.set(tags::BEGIN_STRING, "FIX.4.4");
        msg.header.set(tags::SENDER_COMP_ID, "TARGET");
        msg.header.set(tags::TARGET_COMP_ID, "SENDER");
        msg.header.set_u64(tags::MSG_SEQ_NUM, self.seq);
        msg.header
            .set_timestamp(tags::SENDING_TIME, Timestamp::new(self.clock.now()));
        msg.receive_time = Some(Timestamp::new(self.clock.now()));
        self.seq += 1;
        msg
    }

    pub(crate) fn logon(&mut self) -> Message {
        let mut msg = self.base("A");
        msg.body.set_u64(tags::ENCRYPT_METHOD, 0);
        msg
    }

    pub(crate) fn logout(&mut self) -> Message {
        self.base("5")
    }

    pub(crate) fn heartbeat(&mut self, test_req_id: Option<&str>) -> Message {
        let mut msg = self.base("0");
        if let Some(id) = test_req_id {
            msg.body.set(tags::TEST_REQ_ID, id);
        }
        msg
    }

    pub(crate) fn test_request(&mut self, test_req_id: &str) -> Message {
        let mut msg = self.base("1");
        msg.body.set(tags::TEST_REQ_ID, test_req_id);
        msg
    }

    pub(crate) fn resend_request(&mut self, begin: u64, end: u64) -> Message {
        let mut msg = self.base("2");
        msg.body.set_u64(tags::BEGIN_SEQ_NO, begin);
        msg.body.set_u64(tags::END_SEQ_NO, end);
        msg
    }

    pub(crate) fn sequence_reset(&mut self, new_seq_no: u64) -> Message {
        let mut msg = self.base("4");
        msg.body.set_u64(tags::NEW_SEQ_NO, new_seq_no);
        msg
    }

    pub(crate) fn new_order_single(&mut self) -> Message {
        let mut msg = self.base("D");
        msg.body.set(11, "ORDER-1");
        msg
    }
}

/// A session wired to a mock application, counting store, manual clock, and
/// an outbound capture channel, pre-connected like the original test rig.
pub(crate) struct SessionRig {
    pub session: Session,
    pub app: Arc<Mutex<MockAppState>>,
    pub counters: Arc<StoreCounters>,
    pub clock: Arc<ManualClock>,
    pub factory: MessageFactory,
    pub outbound: mpsc::UnboundedReceiver<Bytes>,
    pub outbound_tx: mpsc::UnboundedSender<Bytes>,
}

impl SessionRig {
    pub(crate) fn new() -> Self {
        Self::with_config(SessionConfig::new())
    }

    pub(crate) fn with_config(config: SessionConfig) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 27, 12, 0, 0).unwrap(),
        ));
        let app = Arc::new(Mutex::new(MockAppState::default()));
        let counters = Arc::new(StoreCounters::default());
        let store = TestStore::new(counters.clone(), clock.clone());
        let session_id = SessionId::new(
            "FIX.4.4",
            CompId::new("SENDER").unwrap(),
            CompId::new("TARGET").unwrap(),
        );
        let session = Session::new(
            session_id,
            config,
            Box::new(store),
            Box::new(MockApplication { state: app.clone() }),
        )
        .with_null_log()
        .with_clock(clock.clone());

        let (outbound_tx, outbound) = mpsc::unbounded_channel();
        let factory = MessageFactory::new(clock.clone());
        let mut rig = Self {
            session,
            app,
            counters,
            clock,
            factory,
            outbound,
            outbound_tx,
        };
        rig.session.conn = Some(rig.outbound_tx.clone());
        rig
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.session.state.current = state;
    }

    pub(crate) fn app(&self) -> MutexGuard<'_, MockAppState> {
        self.app.lock().unwrap()
    }

    pub(crate) fn next_sender(&self) -> u64 {
        self.session.store.next_sender_seq()
    }

    pub(crate) fn next_target(&self) -> u64 {
        self.session.store.next_target_seq()
    }

    pub(crate) async fn incr_next_sender(&self) {
        self.session.store.incr_next_sender_seq().await.unwrap();
    }

    pub(crate) async fn incr_next_target(&self) {
        self.session.store.incr_next_target_seq().await.unwrap();
    }

    /// Drains and decodes everything transmitted since the last call.
    pub(crate) fn drain_sent(&mut self) -> Vec<Message> {
        let mut sent = Vec::new();
        while let Ok(bytes) = self.outbound.try_recv() {
            sent.push(oxfix_codec::decode(&bytes).expect("transmitted frame decodes"));
        }
        sent
    }

    pub(crate) fn last_sent(&mut self) -> Option<Message> {
        self.drain_sent().pop()
    }

    pub(crate) fn no_message_sent(&mut self) -> bool {
        self.drain_sent().is_empty()
    }
}
