/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session configuration.
//!
//! All options are fixed for the lifetime of a session run. The one value
//! that can drift at runtime is the effective heartbeat interval, which the
//! counterparty's Logon may override unless `heart_bt_int_override` is set.

use crate::schedule::SessionSchedule;
use chrono::NaiveTime;
use std::time::Duration;

/// Configuration for a FIX session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Heartbeat interval (tag 108); also seeds the peer-liveness timeout.
    pub heart_bt_int: Duration,
    /// How long to wait for the counterparty's Logon after sending ours.
    pub logon_timeout: Duration,
    /// How long to wait for the counterparty's Logout after sending ours.
    pub logout_timeout: Duration,
    /// Maximum tolerated difference between SendingTime and receive time.
    pub max_latency: Duration,
    /// ResendRequest chunk size; 0 requests the whole gap at once.
    pub resend_request_chunk_size: u64,
    /// Trading window; `None` means the session is always in session time.
    pub schedule: Option<SessionSchedule>,
    /// Whether this side sends the Logon on connect (initiator vs acceptor).
    pub initiate_logon: bool,
    /// Reset sequence numbers when the logon handshake starts.
    pub reset_on_logon: bool,
    /// Reset sequence numbers when a Logout completes.
    pub reset_on_logout: bool,
    /// Reset sequence numbers whenever the transport drops.
    pub reset_on_disconnect: bool,
    /// Refresh store state from backing storage when the handshake starts.
    pub refresh_on_logon: bool,
    /// Stamp LastMsgSeqNumProcessed (tag 369) on outbound headers.
    pub enable_last_msg_seq_num_processed: bool,
    /// Ignore the HeartBtInt carried in the counterparty's Logon.
    pub heart_bt_int_override: bool,
    /// Daily time at which to emit a Logon with ResetSeqNumFlag=Y.
    pub reset_seq_time: Option<NaiveTime>,
    /// DefaultApplVerID (tag 1137) for FIXT Logons.
    pub default_appl_ver_id: Option<String>,
}

impl SessionConfig {
    /// Creates a configuration with conventional defaults: 30s heartbeat,
    /// 10s logon/logout timeouts, 120s max latency, unchunked resends,
    /// acceptor role, no resets.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heart_bt_int: Duration::from_secs(30),
            logon_timeout: Duration::from_secs(10),
            logout_timeout: Duration::from_secs(10),
            max_latency: Duration::from_secs(120),
            resend_request_chunk_size: 0,
            schedule: None,
            initiate_logon: false,
            reset_on_logon: false,
            reset_on_logout: false,
            reset_on_disconnect: false,
            refresh_on_logon: false,
            enable_last_msg_seq_num_processed: false,
            heart_bt_int_override: false,
            reset_seq_time: None,
            default_appl_ver_id: None,
        }
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heart_bt_int(mut self, interval: Duration) -> Self {
        self.heart_bt_int = interval;
        self
    }

    /// Sets the logon timeout.
    #[must_use]
    pub fn with_logon_timeout(mut self, timeout: Duration) -> Self {
        self.logon_timeout = timeout;
        self
    }

    /// Sets the logout timeout.
    #[must_use]
    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Sets the SendingTime staleness tolerance.
    #[must_use]
    pub fn with_max_latency(mut self, max_latency: Duration) -> Self {
        self.max_latency = max_latency;
        self
    }

    /// Sets the ResendRequest chunk size (0 = unlimited).
    #[must_use]
    pub const fn with_resend_request_chunk_size(mut self, size: u64) -> Self {
        self.resend_request_chunk_size = size;
        self
    }

    /// Sets the trading window.
    #[must_use]
    pub fn with_schedule(mut self, schedule: SessionSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Sets whether this side initiates the logon handshake.
    #[must_use]
    pub const fn with_initiate_logon(mut self, initiate: bool) -> Self {
        self.initiate_logon = initiate;
        self
    }

    /// Sets whether to reset sequence numbers on logon.
    #[must_use]
    pub const fn with_reset_on_logon(mut self, reset: bool) -> Self {
        self.reset_on_logon = reset;
        self
    }

    /// Sets whether to reset sequence numbers on logout.
    #[must_use]
    pub const fn with_reset_on_logout(mut self, reset: bool) -> Self {
        self.reset_on_logout = reset;
        self
    }

    /// Sets whether to reset sequence numbers on disconnect.
    #[must_use]
    pub const fn with_reset_on_disconnect(mut self, reset: bool) -> Self {
        self.reset_on_disconnect = reset;
        self
    }

    /// Sets whether to refresh the store when the handshake starts.
    #[must_use]
    pub const fn with_refresh_on_logon(mut self, refresh: bool) -> Self {
        self.refresh_on_logon = refresh;
        self
    }

    /// Sets whether to stamp LastMsgSeqNumProcessed on outbound headers.
    #[must_use]
    pub const fn with_enable_last_msg_seq_num_processed(mut self, enable: bool) -> Self {
        self.enable_last_msg_seq_num_processed = enable;
        self
    }

    /// Sets whether to ignore the counterparty's HeartBtInt.
    #[must_use]
    pub const fn with_heart_bt_int_override(mut self, ignore_peer: bool) -> Self {
        self.heart_bt_int_override = ignore_peer;
        self
    }

    /// Sets the daily sequence-reset time.
    #[must_use]
    pub const fn with_reset_seq_time(mut self, time: NaiveTime) -> Self {
        self.reset_seq_time = Some(time);
        self
    }

    /// Sets the DefaultApplVerID for FIXT Logons.
    #[must_use]
    pub fn with_default_appl_ver_id(mut self, ver: impl Into<String>) -> Self {
        self.default_appl_ver_id = Some(ver.into());
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
