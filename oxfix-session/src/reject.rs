/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session-level reject taxonomy and verification errors.
//!
//! [`Reject`] describes one session- or business-level rejection of an
//! inbound message (tag 373 / 380 reasons, optional referenced tag, text).
//! [`VerifyError`] is the full set of outcomes from the inbound verification
//! pipeline, including the sequence-gap signals that drive the resend
//! protocol rather than an actual Reject message.

use thiserror::Error;

/// SessionRejectReason (tag 373) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// 0: Invalid tag number.
    InvalidTagNumber,
    /// 1: Required tag missing.
    RequiredTagMissing,
    /// 2: Tag not defined for this message type.
    TagNotDefinedForThisMessageType,
    /// 3: Undefined tag.
    UndefinedTag,
    /// 4: Tag specified without a value.
    TagSpecifiedWithoutAValue,
    /// 5: Value is incorrect (out of range) for this tag.
    ValueIsIncorrect,
    /// 6: Incorrect data format for value.
    IncorrectDataFormat,
    /// 7: Decryption problem.
    DecryptionProblem,
    /// 8: Signature problem.
    SignatureProblem,
    /// 9: CompID problem.
    CompIdProblem,
    /// 10: SendingTime accuracy problem.
    SendingTimeAccuracyProblem,
    /// 11: Invalid MsgType.
    InvalidMsgType,
    /// 12: XML validation error.
    XmlValidationError,
    /// 13: Tag appears more than once.
    TagAppearsMoreThanOnce,
    /// 14: Tag specified out of required order.
    TagSpecifiedOutOfRequiredOrder,
    /// 15: Repeating group fields out of order.
    RepeatingGroupFieldsOutOfOrder,
    /// 16: Incorrect NumInGroup count for repeating group.
    IncorrectNumInGroupCountForRepeatingGroup,
    /// 17: Non-"data" value includes field delimiter.
    NonDataValueIncludesFieldDelimiter,
    /// 99: Other.
    Other,
}

impl RejectReason {
    /// Returns the tag 373 wire value.
    #[must_use]
    pub const fn value(self) -> u64 {
        match self {
            Self::InvalidTagNumber => 0,
            Self::RequiredTagMissing => 1,
            Self::TagNotDefinedForThisMessageType => 2,
            Self::UndefinedTag => 3,
            Self::TagSpecifiedWithoutAValue => 4,
            Self::ValueIsIncorrect => 5,
            Self::IncorrectDataFormat => 6,
            Self::DecryptionProblem => 7,
            Self::SignatureProblem => 8,
            Self::CompIdProblem => 9,
            Self::SendingTimeAccuracyProblem => 10,
            Self::InvalidMsgType => 11,
            Self::XmlValidationError => 12,
            Self::TagAppearsMoreThanOnce => 13,
            Self::TagSpecifiedOutOfRequiredOrder => 14,
            Self::RepeatingGroupFieldsOutOfOrder => 15,
            Self::IncorrectNumInGroupCountForRepeatingGroup => 16,
            Self::NonDataValueIncludesFieldDelimiter => 17,
            Self::Other => 99,
        }
    }
}

/// BusinessRejectReason (tag 380) value for a conditionally required field.
const BUSINESS_REJECT_CONDITIONALLY_REQUIRED_FIELD_MISSING: u64 = 5;

/// One session- or business-level rejection.
///
/// Session rejects go out as `35=3` with tag 373; business rejects as `35=j`
/// with tag 380. Either way the text, referenced tag, and referenced
/// sequence number travel with the reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{text}")]
pub struct Reject {
    reason: RejectReason,
    ref_tag: Option<u32>,
    business_reason: Option<u64>,
    text: String,
}

impl Reject {
    /// Creates a session-level reject with the given reason and text.
    #[must_use]
    pub fn new(reason: RejectReason, text: impl Into<String>) -> Self {
        Self {
            reason,
            ref_tag: None,
            business_reason: None,
            text: text.into(),
        }
    }

    /// Attaches the referenced tag (emitted as RefTagID).
    #[must_use]
    pub fn with_ref_tag(mut self, tag: u32) -> Self {
        self.ref_tag = Some(tag);
        self
    }

    /// Required tag missing (373=1).
    #[must_use]
    pub fn required_tag_missing(tag: u32) -> Self {
        Self::new(RejectReason::RequiredTagMissing, "required tag missing").with_ref_tag(tag)
    }

    /// Conditionally required field missing, sent as a BusinessMessageReject
    /// (380=5).
    #[must_use]
    pub fn conditionally_required_field_missing(tag: u32) -> Self {
        let mut reject = Self::new(
            RejectReason::RequiredTagMissing,
            format!("conditionally required field missing ({tag})"),
        )
        .with_ref_tag(tag);
        reject.business_reason = Some(BUSINESS_REJECT_CONDITIONALLY_REQUIRED_FIELD_MISSING);
        reject
    }

    /// Value is incorrect (373=5), optionally referencing the offending tag.
    #[must_use]
    pub fn value_is_incorrect(tag: Option<u32>) -> Self {
        let reject = Self::new(RejectReason::ValueIsIncorrect, "value is incorrect");
        match tag {
            Some(tag) => reject.with_ref_tag(tag),
            None => reject,
        }
    }

    /// Incorrect data format (373=6).
    #[must_use]
    pub fn incorrect_data_format(tag: u32) -> Self {
        Self::new(
            RejectReason::IncorrectDataFormat,
            "incorrect data format for value",
        )
        .with_ref_tag(tag)
    }

    /// CompID problem (373=9).
    #[must_use]
    pub fn comp_id_problem() -> Self {
        Self::new(RejectReason::CompIdProblem, "CompID problem")
    }

    /// SendingTime accuracy problem (373=10).
    #[must_use]
    pub fn sending_time_accuracy_problem() -> Self {
        Self::new(
            RejectReason::SendingTimeAccuracyProblem,
            "SendingTime accuracy problem",
        )
    }

    /// Invalid MsgType (373=11).
    #[must_use]
    pub fn invalid_msg_type() -> Self {
        Self::new(RejectReason::InvalidMsgType, "invalid MsgType")
    }

    /// Returns the session reject reason.
    #[must_use]
    pub const fn reason(&self) -> RejectReason {
        self.reason
    }

    /// Returns the referenced tag, if any.
    #[must_use]
    pub const fn ref_tag(&self) -> Option<u32> {
        self.ref_tag
    }

    /// Returns the BusinessRejectReason when this is a business-level reject.
    #[must_use]
    pub const fn business_reason(&self) -> Option<u64> {
        self.business_reason
    }

    /// Returns true if this goes out as a BusinessMessageReject (35=j).
    #[must_use]
    pub const fn is_business(&self) -> bool {
        self.business_reason.is_some()
    }

    /// Returns the reject text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Outcome of the inbound verification pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// MsgSeqNum above the expected target: an inbound gap.
    #[error("MsgSeqNum too high, expecting {expected} but received {received}")]
    TargetTooHigh {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },

    /// MsgSeqNum below the expected target.
    #[error("MsgSeqNum too low, expecting {expected} but received {received}")]
    TargetTooLow {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },

    /// BeginString does not match the session's configured version.
    #[error("incorrect BeginString: received {received:?}")]
    IncorrectBeginString {
        /// The received BeginString value.
        received: String,
    },

    /// The application refused the Logon.
    #[error("logon rejected: {reason}")]
    RejectLogon {
        /// Reason carried in the Logout Text field.
        reason: String,
    },

    /// Session- or business-level rejection of the message.
    #[error(transparent)]
    Reject(#[from] Reject),
}
