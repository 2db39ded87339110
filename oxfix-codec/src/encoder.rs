/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIX message encoder.
//!
//! Serializes a [`Message`] to the wire: MsgType first, remaining header
//! fields in ascending tag order, body fields in insertion order, then the
//! trailer. BeginString, BodyLength, and CheckSum framing is computed here,
//! so callers never set tags 9 or 10 themselves.

use crate::checksum::{calculate_checksum, format_checksum};
use crate::decoder::SOH;
use bytes::{BufMut, Bytes, BytesMut};
use oxfix_core::error::EncodeError;
use oxfix_core::message::Message;
use oxfix_core::tags;
use smallvec::SmallVec;

/// Encodes a message to a complete FIX frame.
///
/// # Arguments
/// * `msg` - The message to encode; the header must carry BeginString (8)
///   and MsgType (35)
///
/// # Errors
/// Returns `EncodeError::MissingField` if BeginString or MsgType is absent.
pub fn encode(msg: &Message) -> Result<Bytes, EncodeError> {
    let begin_string = msg
        .header
        .get(tags::BEGIN_STRING)
        .ok_or(EncodeError::MissingField {
            tag: tags::BEGIN_STRING,
        })?;
    let msg_type = msg
        .header
        .get(tags::MSG_TYPE)
        .ok_or(EncodeError::MissingField { tag: tags::MSG_TYPE })?;

    let mut body = BytesMut::with_capacity(256);
    put_field(&mut body, tags::MSG_TYPE, msg_type);

    let mut header_fields: SmallVec<[(u32, &str); 16]> = msg
        .header
        .iter()
        .filter(|f| {
            f.tag != tags::BEGIN_STRING && f.tag != tags::BODY_LENGTH && f.tag != tags::MSG_TYPE
        })
        .map(|f| (f.tag, f.value.as_str()))
        .collect();
    header_fields.sort_by_key(|(tag, _)| *tag);
    for (tag, value) in header_fields {
        put_field(&mut body, tag, value);
    }

    for field in msg.body.iter() {
        put_field(&mut body, field.tag, &field.value);
    }
    for field in msg.trailer.iter() {
        if field.tag != tags::CHECK_SUM {
            put_field(&mut body, field.tag, &field.value);
        }
    }

    let mut frame = BytesMut::with_capacity(body.len() + 32);
    put_field(&mut frame, tags::BEGIN_STRING, begin_string);
    let mut length_buf = itoa::Buffer::new();
    put_field(&mut frame, tags::BODY_LENGTH, length_buf.format(body.len()));
    frame.extend_from_slice(&body);

    let checksum = calculate_checksum(&frame);
    frame.extend_from_slice(b"10=");
    frame.extend_from_slice(&format_checksum(checksum));
    frame.put_u8(SOH);

    Ok(frame.freeze())
}

/// Appends one `tag=value<SOH>` field.
fn put_field(buf: &mut BytesMut, tag: u32, value: &str) {
    let mut tag_buf = itoa::Buffer::new();
    buf.extend_from_slice(tag_buf.format(tag).as_bytes());
    buf.put_u8(b'=');
    buf.extend_from_slice(value.as_bytes());
    buf.put_u8(SOH);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use oxfix_core::tags::MsgType;

    fn heartbeat() -> Message {
        let mut msg = Message::with_msg_type("0");
        msg.header.set(tags::BEGIN_STRING, "FIX.4.4");
        msg.header.set_u64(tags::MSG_SEQ_NUM, 2);
        msg.header.set(tags::SENDER_COMP_ID, "SENDER");
        msg.header.set(tags::TARGET_COMP_ID, "TARGET");
        msg.header.set(tags::SENDING_TIME, "20260127-14:30:00.000");
        msg
    }

    #[test]
    fn test_encode_frames_and_checksums() {
        let bytes = encode(&heartbeat()).unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(text.starts_with("8=FIX.4.4\x019="));
        assert!(text.ends_with('\x01'));
        // Round-trips through the validating decoder, which checks both
        // BodyLength and CheckSum.
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.msg_type(), Some(MsgType::Heartbeat));
        assert_eq!(decoded.seq_num(), Some(2));
    }

    #[test]
    fn test_encode_msg_type_first_then_sorted_header() {
        let bytes = encode(&heartbeat()).unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        let body = text.split_once("\x01").unwrap().1;
        let body = body.split_once("\x01").unwrap().1;
        assert!(body.starts_with("35=0\x0134=2\x0149=SENDER\x01"));
    }

    #[test]
    fn test_encode_body_preserves_insertion_order() {
        let mut msg = heartbeat();
        msg.header.set(tags::MSG_TYPE, "A");
        msg.body.set_u64(tags::ENCRYPT_METHOD, 0);
        msg.body.set_u64(tags::HEART_BT_INT, 30);
        msg.body.set_bool(tags::RESET_SEQ_NUM_FLAG, true);

        let bytes = encode(&msg).unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let encrypt = text.find("98=0").unwrap();
        let heart_bt = text.find("108=30").unwrap();
        let reset = text.find("141=Y").unwrap();
        assert!(encrypt < heart_bt && heart_bt < reset);
    }

    #[test]
    fn test_encode_missing_begin_string() {
        let msg = Message::with_msg_type("0");
        let err = encode(&msg).unwrap_err();
        assert_eq!(
            err,
            EncodeError::MissingField {
                tag: tags::BEGIN_STRING
            }
        );
    }

    #[test]
    fn test_encode_missing_msg_type() {
        let mut msg = Message::new();
        msg.header.set(tags::BEGIN_STRING, "FIX.4.4");
        let err = encode(&msg).unwrap_err();
        assert_eq!(err, EncodeError::MissingField { tag: tags::MSG_TYPE });
    }

    #[test]
    fn test_encode_ignores_stale_checksum() {
        let mut msg = heartbeat();
        msg.trailer.set(tags::CHECK_SUM, "999");

        let bytes = encode(&msg).unwrap();
        assert!(decode(&bytes).is_ok());
    }
}
