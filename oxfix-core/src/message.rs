/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Mutable message representation for the session layer.
//!
//! This module provides:
//! - [`FieldMap`]: an ordered collection of tag=value fields
//! - [`Message`]: header/body/trailer field maps plus receive metadata
//!
//! The session layer both inspects inbound messages (sequence numbers,
//! flags, timestamps) and constructs or amends outbound ones (header fill,
//! possible-duplicate stamping during replay), so fields are stored as
//! owned strings rather than zero-copy views.

use crate::tags;
use crate::types::Timestamp;
use std::fmt;

/// A single tag=value field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// The field tag number.
    pub tag: u32,
    /// The field value, without delimiters.
    pub value: String,
}

/// Ordered collection of fields.
///
/// Insertion order is preserved; setting an existing tag replaces its value
/// in place. FIX booleans are encoded as `Y`/`N` and timestamps in UTC
/// `YYYYMMDD-HH:MM:SS.sss` format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: Vec<Field>,
}

impl FieldMap {
    /// Creates an empty field map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of fields.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the map holds no fields.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Removes all fields.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Sets a field, replacing any existing value for the tag in place.
    ///
    /// # Arguments
    /// * `tag` - The field tag number
    /// * `value` - The field value
    pub fn set(&mut self, tag: u32, value: impl Into<String>) {
        let value = value.into();
        if let Some(field) = self.fields.iter_mut().find(|f| f.tag == tag) {
            field.value = value;
        } else {
            self.fields.push(Field { tag, value });
        }
    }

    /// Sets an unsigned integer field.
    pub fn set_u64(&mut self, tag: u32, value: u64) {
        self.set(tag, value.to_string());
    }

    /// Sets a boolean field (`Y`/`N`).
    pub fn set_bool(&mut self, tag: u32, value: bool) {
        self.set(tag, if value { "Y" } else { "N" });
    }

    /// Sets a UTC timestamp field in FIX format.
    pub fn set_timestamp(&mut self, tag: u32, value: Timestamp) {
        self.set(tag, value.format_fix());
    }

    /// Returns the value for a tag, if present.
    #[must_use]
    pub fn get(&self, tag: u32) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.tag == tag)
            .map(|f| f.value.as_str())
    }

    /// Returns the value for a tag parsed as an unsigned integer.
    #[must_use]
    pub fn get_u64(&self, tag: u32) -> Option<u64> {
        self.get(tag).and_then(|v| v.parse().ok())
    }

    /// Returns the value for a tag parsed as a FIX boolean (`Y`/`N`).
    #[must_use]
    pub fn get_bool(&self, tag: u32) -> Option<bool> {
        match self.get(tag) {
            Some("Y") => Some(true),
            Some("N") => Some(false),
            _ => None,
        }
    }

    /// Returns the value for a tag parsed as a FIX UTC timestamp.
    #[must_use]
    pub fn get_timestamp(&self, tag: u32) -> Option<Timestamp> {
        self.get(tag).and_then(Timestamp::parse_fix)
    }

    /// Returns true if the tag is present.
    #[must_use]
    pub fn has(&self, tag: u32) -> bool {
        self.fields.iter().any(|f| f.tag == tag)
    }

    /// Removes a field, returning its value if it was present.
    pub fn remove(&mut self, tag: u32) -> Option<String> {
        let index = self.fields.iter().position(|f| f.tag == tag)?;
        Some(self.fields.remove(index).value)
    }

    /// Iterates over the fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }
}

/// A FIX message as seen by the session layer.
///
/// Fields are split into the standard header, the body, and the trailer.
/// BodyLength (9) and CheckSum (10) are computed at encode time and should
/// not be set by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Standard header fields.
    pub header: FieldMap,
    /// Body fields.
    pub body: FieldMap,
    /// Standard trailer fields.
    pub trailer: FieldMap,
    /// Receive timestamp, stamped by the session on inbound messages.
    pub receive_time: Option<Timestamp>,
}

impl Message {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a message with the given MsgType set in the header.
    ///
    /// # Arguments
    /// * `msg_type` - The message type wire value (e.g. `"A"` for Logon)
    #[must_use]
    pub fn with_msg_type(msg_type: &str) -> Self {
        let mut msg = Self::new();
        msg.header.set(tags::MSG_TYPE, msg_type);
        msg
    }

    /// Returns the parsed message type, if the header carries one.
    #[must_use]
    pub fn msg_type(&self) -> Option<tags::MsgType> {
        self.header.get(tags::MSG_TYPE).and_then(|v| v.parse().ok())
    }

    /// Returns the MsgSeqNum, if present and numeric.
    #[must_use]
    pub fn seq_num(&self) -> Option<u64> {
        self.header.get_u64(tags::MSG_SEQ_NUM)
    }

    /// Returns true if this is an administrative message.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.msg_type().map(|t| t.is_admin()).unwrap_or(false)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in self.header.iter().chain(self.body.iter()).chain(self.trailer.iter()) {
            write!(f, "{}={}|", field.tag, field.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::MsgType;

    #[test]
    fn test_field_map_set_get() {
        let mut map = FieldMap::new();
        map.set(35, "A");
        map.set(108, "30");

        assert_eq!(map.get(35), Some("A"));
        assert_eq!(map.get_u64(108), Some(30));
        assert_eq!(map.get(999), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_field_map_replace_in_place() {
        let mut map = FieldMap::new();
        map.set(34, "1");
        map.set(49, "SENDER");
        map.set(34, "2");

        assert_eq!(map.get(34), Some("2"));
        assert_eq!(map.len(), 2);
        // Replaced value keeps its original position.
        assert_eq!(map.iter().next().map(|f| f.tag), Some(34));
    }

    #[test]
    fn test_field_map_bool() {
        let mut map = FieldMap::new();
        map.set_bool(141, true);
        map.set_bool(43, false);

        assert_eq!(map.get_bool(141), Some(true));
        assert_eq!(map.get_bool(43), Some(false));
        assert_eq!(map.get_bool(999), None);

        map.set(123, "X");
        assert_eq!(map.get_bool(123), None);
    }

    #[test]
    fn test_field_map_timestamp() {
        let mut map = FieldMap::new();
        let ts = Timestamp::parse_fix("20260127-14:30:00.123").unwrap();
        map.set_timestamp(52, ts);

        assert_eq!(map.get(52), Some("20260127-14:30:00.123"));
        assert_eq!(map.get_timestamp(52), Some(ts));
    }

    #[test]
    fn test_field_map_remove() {
        let mut map = FieldMap::new();
        map.set(58, "text");
        assert_eq!(map.remove(58), Some("text".to_string()));
        assert_eq!(map.remove(58), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_message_msg_type() {
        let msg = Message::with_msg_type("A");
        assert_eq!(msg.msg_type(), Some(MsgType::Logon));
        assert!(msg.is_admin());

        let order = Message::with_msg_type("D");
        assert_eq!(
            order.msg_type(),
            Some(MsgType::Application("D".to_string()))
        );
        assert!(!order.is_admin());
    }

    #[test]
    fn test_message_seq_num() {
        let mut msg = Message::with_msg_type("0");
        assert_eq!(msg.seq_num(), None);

        msg.header.set_u64(tags::MSG_SEQ_NUM, 42);
        assert_eq!(msg.seq_num(), Some(42));
    }
}
