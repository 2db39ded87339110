/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Core types for FIX session operations.
//!
//! This module provides fundamental types used throughout the oxfix engine:
//! - [`CompId`]: Component identifier (SenderCompID, TargetCompID)
//! - [`SessionId`]: Full session identity keying persistent state
//! - [`Timestamp`]: FIX-formatted UTC timestamp

use arrayvec::ArrayString;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length for CompID strings in bytes.
pub const COMP_ID_MAX_LEN: usize = 32;

/// Component identifier for FIX sessions.
///
/// Used for SenderCompID (tag 49), TargetCompID (tag 56), and related fields.
/// Maximum length is 32 characters as per FIX specification.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CompId(ArrayString<COMP_ID_MAX_LEN>);

impl CompId {
    /// Creates a new CompId from a string slice.
    ///
    /// # Arguments
    /// * `s` - The component identifier string
    ///
    /// # Returns
    /// `Some(CompId)` if the string fits within the maximum length, `None` otherwise.
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        ArrayString::from(s).ok().map(Self)
    }

    /// Returns the CompId as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the length of the CompId in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the CompId is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for CompId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompId {
    type Err = arrayvec::CapacityError<()>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArrayString::try_from(s)
            .map(Self)
            .map_err(|_| arrayvec::CapacityError::new(()))
    }
}

/// Full identity of a FIX session.
///
/// A session is uniquely keyed by BeginString plus the sender/target
/// component identifiers (and their optional sub/location qualifiers).
/// Equality is case-sensitive. Persistent session state is indexed by
/// this identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    /// FIX version marker, e.g. `FIX.4.4` or `FIXT.1.1` (tag 8).
    pub begin_string: String,
    /// Our component identifier (tag 49 on outbound messages).
    pub sender_comp_id: CompId,
    /// Counterparty component identifier (tag 56 on outbound messages).
    pub target_comp_id: CompId,
    /// Optional sender sub identifier (tag 50).
    pub sender_sub_id: Option<String>,
    /// Optional sender location identifier (tag 142).
    pub sender_location_id: Option<String>,
    /// Optional target sub identifier (tag 57).
    pub target_sub_id: Option<String>,
    /// Optional target location identifier (tag 143).
    pub target_location_id: Option<String>,
    /// Optional free-form qualifier distinguishing otherwise identical sessions.
    pub qualifier: Option<String>,
}

impl SessionId {
    /// Creates a session identity from the required components.
    ///
    /// # Arguments
    /// * `begin_string` - The FIX version string
    /// * `sender_comp_id` - Our CompID
    /// * `target_comp_id` - Counterparty CompID
    #[must_use]
    pub fn new(
        begin_string: impl Into<String>,
        sender_comp_id: CompId,
        target_comp_id: CompId,
    ) -> Self {
        Self {
            begin_string: begin_string.into(),
            sender_comp_id,
            target_comp_id,
            sender_sub_id: None,
            sender_location_id: None,
            target_sub_id: None,
            target_location_id: None,
            qualifier: None,
        }
    }

    /// Sets the session qualifier.
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Sets the sender sub identifier.
    #[must_use]
    pub fn with_sender_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.sender_sub_id = Some(sub_id.into());
        self
    }

    /// Sets the target sub identifier.
    #[must_use]
    pub fn with_target_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.target_sub_id = Some(sub_id.into());
        self
    }

    /// Sets the sender location identifier.
    #[must_use]
    pub fn with_sender_location_id(mut self, location_id: impl Into<String>) -> Self {
        self.sender_location_id = Some(location_id.into());
        self
    }

    /// Sets the target location identifier.
    #[must_use]
    pub fn with_target_location_id(mut self, location_id: impl Into<String>) -> Self {
        self.target_location_id = Some(location_id.into());
        self
    }

    /// Returns true if the session speaks a FIXT transport version.
    #[must_use]
    pub fn is_fixt(&self) -> bool {
        self.begin_string.starts_with("FIXT")
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}",
            self.begin_string, self.sender_comp_id, self.target_comp_id
        )?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, "/{}", qualifier)?;
        }
        Ok(())
    }
}

/// FIX UTC timestamp formats, millisecond precision first.
const FIX_TIMESTAMP_FORMATS: &[&str] = &["%Y%m%d-%H:%M:%S%.f", "%Y%m%d-%H:%M:%S"];

/// FIX protocol UTC timestamp.
///
/// SendingTime (tag 52) and OrigSendingTime (tag 122) are formatted as
/// `YYYYMMDD-HH:MM:SS.sss`; seconds-precision values without the fractional
/// part are accepted on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp from a UTC datetime.
    #[inline]
    #[must_use]
    pub const fn new(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the current UTC timestamp.
    #[inline]
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying UTC datetime.
    #[inline]
    #[must_use]
    pub const fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Formats the timestamp in FIX format with millisecond precision.
    ///
    /// Format: `YYYYMMDD-HH:MM:SS.sss`
    #[must_use]
    pub fn format_fix(self) -> String {
        self.0.format("%Y%m%d-%H:%M:%S%.3f").to_string()
    }

    /// Parses a FIX UTC timestamp, with or without fractional seconds.
    ///
    /// # Arguments
    /// * `s` - The timestamp string (e.g. `20260127-14:30:00.123`)
    ///
    /// # Returns
    /// `Some(Timestamp)` if the string is a valid FIX timestamp, `None` otherwise.
    #[must_use]
    pub fn parse_fix(s: &str) -> Option<Self> {
        for format in FIX_TIMESTAMP_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Some(Self(naive.and_utc()));
            }
        }
        None
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_comp_id() {
        let id = CompId::new("SENDER").unwrap();
        assert_eq!(id.as_str(), "SENDER");
        assert_eq!(id.len(), 6);
        assert!(!id.is_empty());
    }

    #[test]
    fn test_comp_id_too_long() {
        let long_str = "A".repeat(COMP_ID_MAX_LEN + 1);
        assert!(CompId::new(&long_str).is_none());
    }

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new(
            "FIX.4.4",
            CompId::new("SENDER").unwrap(),
            CompId::new("TARGET").unwrap(),
        );
        assert_eq!(id.to_string(), "FIX.4.4:SENDER->TARGET");

        let qualified = id.clone().with_qualifier("primary");
        assert_eq!(qualified.to_string(), "FIX.4.4:SENDER->TARGET/primary");
    }

    #[test]
    fn test_session_id_equality_is_case_sensitive() {
        let a = SessionId::new(
            "FIX.4.4",
            CompId::new("SENDER").unwrap(),
            CompId::new("TARGET").unwrap(),
        );
        let b = SessionId::new(
            "FIX.4.4",
            CompId::new("sender").unwrap(),
            CompId::new("TARGET").unwrap(),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_session_id_is_fixt() {
        let fixt = SessionId::new(
            "FIXT.1.1",
            CompId::new("A").unwrap(),
            CompId::new("B").unwrap(),
        );
        assert!(fixt.is_fixt());

        let fix44 = SessionId::new(
            "FIX.4.4",
            CompId::new("A").unwrap(),
            CompId::new("B").unwrap(),
        );
        assert!(!fix44.is_fixt());
    }

    #[test]
    fn test_timestamp_format() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 27, 14, 30, 0).unwrap();
        let ts = Timestamp::new(dt);
        assert_eq!(ts.format_fix(), "20260127-14:30:00.000");
    }

    #[test]
    fn test_timestamp_parse_with_millis() {
        let ts = Timestamp::parse_fix("20260127-14:30:00.123").unwrap();
        assert_eq!(ts.format_fix(), "20260127-14:30:00.123");
    }

    #[test]
    fn test_timestamp_parse_without_millis() {
        let ts = Timestamp::parse_fix("20260127-14:30:00").unwrap();
        assert_eq!(ts.format_fix(), "20260127-14:30:00.000");
    }

    #[test]
    fn test_timestamp_parse_invalid() {
        assert!(Timestamp::parse_fix("not a timestamp").is_none());
        assert!(Timestamp::parse_fix("2026-01-27 14:30:00").is_none());
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = Timestamp::parse_fix("20260127-14:30:00.456").unwrap();
        let parsed = Timestamp::parse_fix(&ts.format_fix()).unwrap();
        assert_eq!(ts, parsed);
    }
}
