/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Logical session timers.
//!
//! Each timer is a deadline slot owned by the coordinator: arming sets an
//! instant, disarming clears it, and the event loop sleeps until the
//! earliest armed deadline. A wakeup that finds nothing due (because the
//! deadline was re-armed or cleared in the meantime) is simply ignored, so
//! cancellation races are benign.

use crate::event::TimerEvent;
use smallvec::SmallVec;
use std::time::Duration;
use tokio::time::Instant;

/// Grace multiplier applied to HeartBtInt for the peer-liveness deadline
/// (1.2x, expressed as interval + interval/5).
#[must_use]
pub fn peer_timeout(heart_bt_int: Duration) -> Duration {
    heart_bt_int + heart_bt_int / 5
}

/// The four session timer deadlines.
///
/// `peer` re-arms on every inbound frame; `heartbeat` re-arms on every
/// transmit; `logon` and `logout` are one-shots armed when the respective
/// message is sent. All four disarm on disconnect.
#[derive(Debug, Default)]
pub struct TimerSet {
    peer: Option<Instant>,
    heartbeat: Option<Instant>,
    logon: Option<Instant>,
    logout: Option<Instant>,
}

impl TimerSet {
    /// Creates a set with all timers disarmed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the peer-liveness deadline.
    pub fn arm_peer(&mut self, after: Duration) {
        self.peer = Some(Instant::now() + after);
    }

    /// Arms the heartbeat deadline.
    pub fn arm_heartbeat(&mut self, after: Duration) {
        self.heartbeat = Some(Instant::now() + after);
    }

    /// Arms the logon timeout.
    pub fn arm_logon(&mut self, after: Duration) {
        self.logon = Some(Instant::now() + after);
    }

    /// Arms the logout timeout.
    pub fn arm_logout(&mut self, after: Duration) {
        self.logout = Some(Instant::now() + after);
    }

    /// Disarms every timer.
    pub fn disarm_all(&mut self) {
        self.peer = None;
        self.heartbeat = None;
        self.logon = None;
        self.logout = None;
    }

    /// Returns true if no timer is armed.
    #[must_use]
    pub fn all_disarmed(&self) -> bool {
        self.peer.is_none()
            && self.heartbeat.is_none()
            && self.logon.is_none()
            && self.logout.is_none()
    }

    /// Returns the earliest armed deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.peer, self.heartbeat, self.logon, self.logout]
            .into_iter()
            .flatten()
            .min()
    }

    /// Clears and returns the events for every deadline at or before `now`.
    pub fn take_due(&mut self, now: Instant) -> SmallVec<[TimerEvent; 4]> {
        let mut due = SmallVec::new();
        if Self::is_due(&mut self.logon, now) {
            due.push(TimerEvent::LogonTimeout);
        }
        if Self::is_due(&mut self.logout, now) {
            due.push(TimerEvent::LogoutTimeout);
        }
        if Self::is_due(&mut self.peer, now) {
            due.push(TimerEvent::PeerTimeout);
        }
        if Self::is_due(&mut self.heartbeat, now) {
            due.push(TimerEvent::NeedHeartbeat);
        }
        due
    }

    /// Clears the slot and returns true when its deadline has passed.
    fn is_due(slot: &mut Option<Instant>, now: Instant) -> bool {
        match *slot {
            Some(deadline) if deadline <= now => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_timeout_is_twenty_percent_grace() {
        assert_eq!(
            peer_timeout(Duration::from_secs(30)),
            Duration::from_secs(36)
        );
        assert_eq!(peer_timeout(Duration::from_secs(1)), Duration::from_millis(1200));
    }

    #[test]
    fn test_new_set_is_disarmed() {
        let timers = TimerSet::new();
        assert!(timers.all_disarmed());
        assert!(timers.next_deadline().is_none());
    }

    #[test]
    fn test_next_deadline_is_earliest() {
        let mut timers = TimerSet::new();
        timers.arm_heartbeat(Duration::from_secs(30));
        timers.arm_peer(Duration::from_secs(36));
        timers.arm_logon(Duration::from_secs(10));

        let deadline = timers.next_deadline().unwrap();
        assert!(deadline <= Instant::now() + Duration::from_secs(10));
    }

    #[test]
    fn test_take_due_clears_fired_slots() {
        let mut timers = TimerSet::new();
        timers.arm_peer(Duration::from_secs(0));
        timers.arm_heartbeat(Duration::from_secs(3600));

        let due = timers.take_due(Instant::now());
        assert_eq!(due.as_slice(), &[TimerEvent::PeerTimeout]);
        // Peer slot cleared, heartbeat still armed.
        assert!(!timers.all_disarmed());
        assert!(timers.take_due(Instant::now()).is_empty());
    }

    #[test]
    fn test_disarm_all() {
        let mut timers = TimerSet::new();
        timers.arm_peer(Duration::from_secs(1));
        timers.arm_logout(Duration::from_secs(1));
        timers.disarm_all();

        assert!(timers.all_disarmed());
        assert!(timers.take_due(Instant::now() + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let mut timers = TimerSet::new();
        timers.arm_peer(Duration::from_secs(0));
        timers.arm_peer(Duration::from_secs(3600));

        assert!(timers.take_due(Instant::now()).is_empty());
    }
}
