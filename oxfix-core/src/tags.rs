/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session-layer field tags and message types.
//!
//! This module provides:
//! - Tag constants for every field the session layer reads or writes
//! - [`MsgType`]: session-level message type classification
//! - Header/trailer tag routing used by the codec

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// BeginString (FIX version marker).
pub const BEGIN_STRING: u32 = 8;
/// BodyLength.
pub const BODY_LENGTH: u32 = 9;
/// CheckSum.
pub const CHECK_SUM: u32 = 10;
/// BeginSeqNo on a ResendRequest.
pub const BEGIN_SEQ_NO: u32 = 7;
/// EndSeqNo on a ResendRequest (0 means "through last sent").
pub const END_SEQ_NO: u32 = 16;
/// MsgSeqNum.
pub const MSG_SEQ_NUM: u32 = 34;
/// MsgType.
pub const MSG_TYPE: u32 = 35;
/// NewSeqNo on a SequenceReset.
pub const NEW_SEQ_NO: u32 = 36;
/// PossDupFlag.
pub const POSS_DUP_FLAG: u32 = 43;
/// RefSeqNum on a Reject.
pub const REF_SEQ_NUM: u32 = 45;
/// SenderCompID.
pub const SENDER_COMP_ID: u32 = 49;
/// SenderSubID.
pub const SENDER_SUB_ID: u32 = 50;
/// SendingTime.
pub const SENDING_TIME: u32 = 52;
/// TargetCompID.
pub const TARGET_COMP_ID: u32 = 56;
/// TargetSubID.
pub const TARGET_SUB_ID: u32 = 57;
/// Text.
pub const TEXT: u32 = 58;
/// PossResend.
pub const POSS_RESEND: u32 = 97;
/// EncryptMethod on a Logon.
pub const ENCRYPT_METHOD: u32 = 98;
/// HeartBtInt on a Logon.
pub const HEART_BT_INT: u32 = 108;
/// TestReqID on a TestRequest or echoing Heartbeat.
pub const TEST_REQ_ID: u32 = 112;
/// OnBehalfOfCompID.
pub const ON_BEHALF_OF_COMP_ID: u32 = 115;
/// DeliverToCompID.
pub const DELIVER_TO_COMP_ID: u32 = 128;
/// OrigSendingTime on a possible-duplicate message.
pub const ORIG_SENDING_TIME: u32 = 122;
/// GapFillFlag on a SequenceReset.
pub const GAP_FILL_FLAG: u32 = 123;
/// ResetSeqNumFlag on a Logon.
pub const RESET_SEQ_NUM_FLAG: u32 = 141;
/// SenderLocationID.
pub const SENDER_LOCATION_ID: u32 = 142;
/// TargetLocationID.
pub const TARGET_LOCATION_ID: u32 = 143;
/// LastMsgSeqNumProcessed.
pub const LAST_MSG_SEQ_NUM_PROCESSED: u32 = 369;
/// RefTagID on a Reject.
pub const REF_TAG_ID: u32 = 371;
/// RefMsgType on a Reject.
pub const REF_MSG_TYPE: u32 = 372;
/// SessionRejectReason on a Reject.
pub const SESSION_REJECT_REASON: u32 = 373;
/// BusinessRejectRefID on a BusinessMessageReject.
pub const BUSINESS_REJECT_REF_ID: u32 = 379;
/// BusinessRejectReason on a BusinessMessageReject.
pub const BUSINESS_REJECT_REASON: u32 = 380;
/// DefaultApplVerID on a FIXT Logon.
pub const DEFAULT_APPL_VER_ID: u32 = 1137;

/// Standard header tags (FIX 4.x standard header).
const HEADER_TAGS: &[u32] = &[
    BEGIN_STRING,
    BODY_LENGTH,
    MSG_TYPE,
    MSG_SEQ_NUM,
    POSS_DUP_FLAG,
    POSS_RESEND,
    SENDER_COMP_ID,
    SENDER_SUB_ID,
    SENDER_LOCATION_ID,
    SENDING_TIME,
    TARGET_COMP_ID,
    TARGET_SUB_ID,
    TARGET_LOCATION_ID,
    ON_BEHALF_OF_COMP_ID,
    DELIVER_TO_COMP_ID,
    ORIG_SENDING_TIME,
    LAST_MSG_SEQ_NUM_PROCESSED,
];

/// Standard trailer tags (SignatureLength, Signature, CheckSum).
const TRAILER_TAGS: &[u32] = &[89, 93, CHECK_SUM];

/// Returns true if the tag belongs to the standard message header.
#[inline]
#[must_use]
pub fn is_header_tag(tag: u32) -> bool {
    HEADER_TAGS.contains(&tag)
}

/// Returns true if the tag belongs to the standard message trailer.
#[inline]
#[must_use]
pub fn is_trailer_tag(tag: u32) -> bool {
    TRAILER_TAGS.contains(&tag)
}

/// Session-level classification of FIX message types.
///
/// The administrative types are the ones the session layer acts on;
/// everything else passes through to the application as
/// [`MsgType::Application`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MsgType {
    /// Heartbeat (0).
    #[default]
    Heartbeat,
    /// Test Request (1).
    TestRequest,
    /// Resend Request (2).
    ResendRequest,
    /// Reject (3).
    Reject,
    /// Sequence Reset (4).
    SequenceReset,
    /// Logout (5).
    Logout,
    /// Logon (A).
    Logon,
    /// Business Message Reject (j).
    BusinessMessageReject,
    /// Application-level message, carried but not interpreted.
    Application(String),
}

impl FromStr for MsgType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "0" => Self::Heartbeat,
            "1" => Self::TestRequest,
            "2" => Self::ResendRequest,
            "3" => Self::Reject,
            "4" => Self::SequenceReset,
            "5" => Self::Logout,
            "A" => Self::Logon,
            "j" => Self::BusinessMessageReject,
            other => Self::Application(other.to_string()),
        })
    }
}

impl MsgType {
    /// Returns the wire representation of this message type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "0",
            Self::TestRequest => "1",
            Self::ResendRequest => "2",
            Self::Reject => "3",
            Self::SequenceReset => "4",
            Self::Logout => "5",
            Self::Logon => "A",
            Self::BusinessMessageReject => "j",
            Self::Application(s) => s.as_str(),
        }
    }

    /// Returns true if this is an administrative message handled by the
    /// session layer.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        !matches!(self, Self::Application(_))
    }

    /// Returns true if this is an application message.
    #[must_use]
    pub fn is_app(&self) -> bool {
        !self.is_admin()
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
