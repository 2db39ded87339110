/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # oxfix Codec
//!
//! Tag=value encoding and decoding for the oxfix FIX session engine.
//!
//! This crate provides:
//! - **Checksum**: mod-256 checksum calculation and formatting
//! - **Decoder**: complete frames → [`oxfix_core::Message`], with
//!   BodyLength/CheckSum validation
//! - **Encoder**: [`oxfix_core::Message`] → wire bytes, computing the
//!   BeginString/BodyLength/CheckSum framing

pub mod checksum;
pub mod decoder;
pub mod encoder;

pub use checksum::{calculate_checksum, format_checksum, parse_checksum};
pub use decoder::{decode, Decoder, EQUALS, SOH};
pub use encoder::encode;
