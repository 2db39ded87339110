/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Administrative message construction.
//!
//! Builders here produce message skeletons: MsgType plus the body fields
//! specific to each administrative type. The session coordinator fills the
//! standard header (comp ids, MsgSeqNum, SendingTime), runs the `to_admin`
//! hook, and computes BodyLength/CheckSum at encode time.

use chrono::{DateTime, Utc};
use oxfix_core::message::Message;
use oxfix_core::tags;
use std::time::Duration;

/// Builds a Logon (35=A) with EncryptMethod=0 and the given heartbeat
/// interval.
///
/// # Arguments
/// * `heart_bt_int` - HeartBtInt to advertise
/// * `reset_seq_num` - Whether to set ResetSeqNumFlag=Y
/// * `default_appl_ver_id` - DefaultApplVerID for FIXT sessions
#[must_use]
pub fn logon(
    heart_bt_int: Duration,
    reset_seq_num: bool,
    default_appl_ver_id: Option<&str>,
) -> Message {
    let mut msg = Message::with_msg_type("A");
    msg.body.set_u64(tags::ENCRYPT_METHOD, 0);
    msg.body.set_u64(tags::HEART_BT_INT, heart_bt_int.as_secs());
    if reset_seq_num {
        msg.body.set_bool(tags::RESET_SEQ_NUM_FLAG, true);
    }
    if let Some(ver) = default_appl_ver_id {
        msg.body.set(tags::DEFAULT_APPL_VER_ID, ver);
    }
    msg
}

/// Builds a Logout (35=5) with an optional Text reason.
#[must_use]
pub fn logout(text: Option<&str>) -> Message {
    let mut msg = Message::with_msg_type("5");
    if let Some(text) = text {
        msg.body.set(tags::TEXT, text);
    }
    msg
}

/// Builds a Heartbeat (35=0), echoing a TestReqID when responding to a
/// TestRequest.
#[must_use]
pub fn heartbeat(test_req_id: Option<&str>) -> Message {
    let mut msg = Message::with_msg_type("0");
    if let Some(id) = test_req_id {
        msg.body.set(tags::TEST_REQ_ID, id);
    }
    msg
}

/// Builds a TestRequest (35=1) carrying the given TestReqID.
#[must_use]
pub fn test_request(test_req_id: &str) -> Message {
    let mut msg = Message::with_msg_type("1");
    msg.body.set(tags::TEST_REQ_ID, test_req_id);
    msg
}

/// Builds a ResendRequest (35=2) for `[begin, end]`; `end` 0 means
/// "everything from begin onward".
#[must_use]
pub fn resend_request(begin: u64, end: u64) -> Message {
    let mut msg = Message::with_msg_type("2");
    msg.body.set_u64(tags::BEGIN_SEQ_NO, begin);
    msg.body.set_u64(tags::END_SEQ_NO, end);
    msg
}

/// Builds a SequenceReset (35=4) advancing the peer's expected target to
/// `new_seq_no`.
#[must_use]
pub fn sequence_reset(new_seq_no: u64, gap_fill: bool) -> Message {
    let mut msg = Message::with_msg_type("4");
    msg.body.set_u64(tags::NEW_SEQ_NO, new_seq_no);
    if gap_fill {
        msg.body.set_bool(tags::GAP_FILL_FLAG, true);
    }
    msg
}

/// Generates a unique TestReqID from the current instant.
#[must_use]
pub fn generate_test_req_id(now: DateTime<Utc>) -> String {
    format!("TEST{}", now.timestamp_nanos_opt().unwrap_or(0))
}
