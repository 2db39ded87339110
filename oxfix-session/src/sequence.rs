/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Sequence-number gap detection and resend-range tracking.
//!
//! This module classifies inbound sequence numbers against the expected
//! target and tracks an in-flight inbound gap being filled, including the
//! chunked re-request arithmetic driven by `ResendRequestChunkSize`.

/// Result of checking an inbound sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqCheck {
    /// Sequence number is exactly the expected target.
    InOrder,
    /// Sequence number is higher than expected (gap detected).
    TooHigh {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },
    /// Sequence number is lower than expected (possible duplicate).
    TooLow {
        /// Expected sequence number.
        expected: u64,
        /// Received sequence number.
        received: u64,
    },
}

/// Classifies a received sequence number against the expected target.
#[inline]
#[must_use]
pub fn check_sequence(expected: u64, received: u64) -> SeqCheck {
    if received == expected {
        SeqCheck::InOrder
    } else if received > expected {
        SeqCheck::TooHigh { expected, received }
    } else {
        SeqCheck::TooLow { expected, received }
    }
}

/// An inbound gap being filled by the counterparty.
///
/// Present on the session exactly while it is in the resend state (or a
/// pending-timeout wrapping it). `chunk_end` is set when the outstanding
/// ResendRequest covers only a prefix of the gap; once the target passes it,
/// the next chunk is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendRange {
    /// First missing sequence number when the gap was detected.
    pub begin: u64,
    /// Last missing sequence number.
    pub end: u64,
    /// End of the currently requested chunk, when chunking is active.
    pub chunk_end: Option<u64>,
}

/// Plans one outbound ResendRequest for the gap `[begin, range_end]`.
///
/// # Arguments
/// * `begin` - First sequence number to request
/// * `range_end` - Last missing sequence number
/// * `chunk_size` - Configured chunk size (0 = unlimited)
///
/// # Returns
/// `(wire_end_seq_no, chunk_end)`: the EndSeqNo to put on the wire (0 means
/// "everything from BeginSeqNo on", used whenever the request covers the
/// remainder of the gap) and the chunk end to track, if the request covers
/// only a prefix.
#[must_use]
pub fn plan_resend_request(begin: u64, range_end: u64, chunk_size: u64) -> (u64, Option<u64>) {
    let chunk_end = if chunk_size != 0 {
        begin + chunk_size - 1
    } else {
        range_end
    };

    if chunk_end < range_end {
        (chunk_end, Some(chunk_end))
    } else {
        (0, None)
    }
}
