/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIX message decoder.
//!
//! Parses a complete SOH-delimited tag=value frame into a [`Message`],
//! validating the mandatory 8/9/35 header ordering, the declared BodyLength,
//! and (optionally) the CheckSum. Fields are routed to the header, body, or
//! trailer by tag.

use crate::checksum::{calculate_checksum, parse_checksum};
use memchr::memchr;
use oxfix_core::error::DecodeError;
use oxfix_core::message::Message;
use oxfix_core::tags;

/// SOH (Start of Header) delimiter used in FIX messages.
pub const SOH: u8 = 0x01;

/// Equals sign delimiter between tag and value.
pub const EQUALS: u8 = b'=';

/// FIX message decoder.
#[derive(Debug, Clone)]
pub struct Decoder {
    /// Whether to validate the CheckSum field.
    validate_checksum: bool,
}

impl Decoder {
    /// Creates a decoder with checksum validation enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            validate_checksum: true,
        }
    }

    /// Sets whether to validate checksums during decoding.
    #[must_use]
    pub const fn with_checksum_validation(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }

    /// Decodes a complete FIX message.
    ///
    /// # Arguments
    /// * `input` - The full frame, from `8=` through the trailing SOH after
    ///   the checksum
    ///
    /// # Errors
    /// Returns `DecodeError` if the frame is malformed, truncated, or fails
    /// BodyLength/CheckSum validation.
    pub fn decode(&self, input: &[u8]) -> Result<Message, DecodeError> {
        let mut fields = FieldIter { input, offset: 0 };

        let (first_tag, begin_string, _) = fields.next_field()?.ok_or(DecodeError::Incomplete)?;
        if first_tag != tags::BEGIN_STRING {
            return Err(DecodeError::InvalidBeginString);
        }

        let (second_tag, body_length_value, _) =
            fields.next_field()?.ok_or(DecodeError::MissingBodyLength)?;
        if second_tag != tags::BODY_LENGTH {
            return Err(DecodeError::MissingBodyLength);
        }
        let declared_body_length: usize = body_length_value
            .parse()
            .map_err(|_| DecodeError::InvalidBodyLength)?;
        let body_start = fields.offset;

        let (third_tag, msg_type, _) = fields.next_field()?.ok_or(DecodeError::MissingMsgType)?;
        if third_tag != tags::MSG_TYPE {
            return Err(DecodeError::MissingMsgType);
        }

        let mut msg = Message::new();
        msg.header.set(tags::BEGIN_STRING, begin_string);
        msg.header.set(tags::MSG_TYPE, msg_type);

        loop {
            let field_start = fields.offset;
            let (tag, value, _) = match fields.next_field()? {
                Some(field) => field,
                None => return Err(DecodeError::Incomplete),
            };

            if tag == tags::CHECK_SUM {
                let actual_body_length = field_start - body_start;
                if actual_body_length != declared_body_length {
                    return Err(DecodeError::InvalidBodyLength);
                }

                if self.validate_checksum {
                    let declared = parse_checksum(value.as_bytes())
                        .ok_or_else(|| DecodeError::InvalidFieldValue {
                            tag: tags::CHECK_SUM,
                            reason: "expected three ascii digits".to_string(),
                        })?;
                    let calculated = calculate_checksum(&input[..field_start]);
                    if calculated != declared {
                        return Err(DecodeError::ChecksumMismatch {
                            calculated,
                            declared,
                        });
                    }
                }
                return Ok(msg);
            }

            if tags::is_header_tag(tag) {
                msg.header.set(tag, value);
            } else if tags::is_trailer_tag(tag) {
                msg.trailer.set(tag, value);
            } else {
                msg.body.set(tag, value);
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes a message with full validation.
///
/// # Errors
/// Returns `DecodeError` if the frame is malformed (see [`Decoder::decode`]).
pub fn decode(input: &[u8]) -> Result<Message, DecodeError> {
    Decoder::new().decode(input)
}

/// Iterator over tag=value fields in a buffer.
struct FieldIter<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> FieldIter<'a> {
    /// Returns the next `(tag, value, field_end)` triple, or `None` at end of
    /// input.
    fn next_field(&mut self) -> Result<Option<(u32, &'a str, usize)>, DecodeError> {
        if self.offset >= self.input.len() {
            return Ok(None);
        }

        let rest = &self.input[self.offset..];
        let soh = memchr(SOH, rest).ok_or(DecodeError::Incomplete)?;
        let field = &rest[..soh];

        let equals = memchr(EQUALS, field).ok_or_else(|| {
            DecodeError::InvalidTag(String::from_utf8_lossy(field).into_owned())
        })?;
        let tag: u32 = std::str::from_utf8(&field[..equals])?
            .parse()
            .map_err(|_| DecodeError::InvalidTag(String::from_utf8_lossy(&field[..equals]).into_owned()))?;
        let value = std::str::from_utf8(&field[equals + 1..])?;

        let field_end = self.offset + soh + 1;
        self.offset = field_end;
        Ok(Some((tag, value, field_end)))
    }
}
