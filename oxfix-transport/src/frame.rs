/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Tokio codec for FIX message framing.
//!
//! A frame's length is only knowable after reading its first two fields:
//! BeginString (8) and BodyLength (9). The framer parses those as
//! `tag=value` prefixes, derives the total frame length from the declared
//! body length plus the fixed `10=XXX<SOH>` trailer, and hands off complete
//! frames. Structural validation beyond framing belongs to the message
//! decoder; the framer only (optionally) verifies the checksum so corrupt
//! input can be cut off at the transport.

use bytes::{BufMut, Bytes, BytesMut};
use memchr::memchr;
use oxfix_codec::checksum::{calculate_checksum, parse_checksum};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// SOH delimiter.
const SOH: u8 = 0x01;

/// Length of the `10=XXX<SOH>` trailer.
const TRAILER_LEN: usize = 7;

/// Errors that can occur during framing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Stream does not open with a BeginString field.
    #[error("invalid begin string: frame must start with 8=")]
    InvalidBeginString,

    /// BodyLength field missing or unparseable.
    #[error("invalid body length field (tag 9)")]
    InvalidBodyLength,

    /// The bytes where the checksum trailer should sit are not `10=XXX<SOH>`.
    #[error("malformed checksum trailer")]
    TrailerMismatch,

    /// Checksum mismatch.
    #[error("checksum mismatch: calculated {calculated}, declared {declared}")]
    ChecksumMismatch {
        /// Calculated checksum.
        calculated: u8,
        /// Declared checksum in the frame.
        declared: u8,
    },

    /// Frame exceeds the maximum size.
    #[error("frame too large: {size} bytes exceeds maximum {max_size}")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max_size: usize,
    },

    /// I/O error.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// One `tag=value` field split off the front of the buffer.
struct RawField<'a> {
    tag: &'a [u8],
    value: &'a [u8],
    /// Offset just past the field's terminating SOH.
    end: usize,
}

/// Splits the field starting at `from`, or `None` while its terminating SOH
/// has not arrived yet. A field without `=` yields the whole body as the
/// tag, which the callers' tag comparisons then refuse.
fn next_field(buf: &[u8], from: usize) -> Option<RawField<'_>> {
    let rest = buf.get(from..)?;
    let soh = memchr(SOH, rest)?;
    let field = &rest[..soh];
    let (tag, value) = match memchr(b'=', field) {
        Some(eq) => (&field[..eq], &field[eq + 1..]),
        None => (field, &field[..0]),
    };
    Some(RawField {
        tag,
        value,
        end: from + soh + 1,
    })
}

/// Tokio codec extracting complete FIX frames.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximum frame size in bytes.
    max_frame_size: usize,
    /// Whether to validate checksums at the framing layer.
    validate_checksum: bool,
}

impl FrameCodec {
    /// Creates a codec with a 1MB frame limit and checksum validation on.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_size: 1024 * 1024,
            validate_checksum: true,
        }
    }

    /// Sets the maximum frame size.
    #[must_use]
    pub const fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Sets whether to validate checksums while framing.
    #[must_use]
    pub const fn with_checksum_validation(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        // Cheap sanity before any field has fully arrived.
        if src[0] != b'8' {
            return Err(FrameError::InvalidBeginString);
        }

        let version = match next_field(src, 0) {
            Some(field) => field,
            None => return Ok(None),
        };
        if version.tag != b"8" {
            return Err(FrameError::InvalidBeginString);
        }

        let length = match next_field(src, version.end) {
            Some(field) => field,
            None => return Ok(None),
        };
        if length.tag != b"9" {
            return Err(FrameError::InvalidBodyLength);
        }
        let declared_body: usize = std::str::from_utf8(length.value)
            .ok()
            .and_then(|value| value.parse().ok())
            .ok_or(FrameError::InvalidBodyLength)?;

        // BodyLength counts the bytes between its own SOH and the trailer.
        let frame_len = length.end + declared_body + TRAILER_LEN;
        if frame_len > self.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: frame_len,
                max_size: self.max_frame_size,
            });
        }
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let trailer = &src[frame_len - TRAILER_LEN..frame_len];
        if !trailer.starts_with(b"10=") || trailer[TRAILER_LEN - 1] != SOH {
            return Err(FrameError::TrailerMismatch);
        }
        if self.validate_checksum {
            let declared_sum =
                parse_checksum(&trailer[3..6]).ok_or(FrameError::TrailerMismatch)?;
            let calculated = calculate_checksum(&src[..frame_len - TRAILER_LEN]);
            if calculated != declared_sum {
                return Err(FrameError::ChecksumMismatch {
                    calculated,
                    declared: declared_sum,
                });
            }
        }

        Ok(Some(src.split_to(frame_len).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.put_slice(&item);
        Ok(())
    }
}
