/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # oxfix Core
//!
//! Fundamental types for the oxfix FIX session engine.
//!
//! This crate provides:
//! - **Identity**: [`CompId`], [`SessionId`]
//! - **Messages**: [`FieldMap`], [`Message`], [`MsgType`], tag constants
//! - **Time**: [`Timestamp`] in FIX UTC format
//! - **Errors**: the unified [`FixError`] hierarchy

pub mod error;
pub mod message;
pub mod tags;
pub mod types;

pub use error::{DecodeError, EncodeError, FixError, Result, SessionError, StoreError};
pub use message::{Field, FieldMap, Message};
pub use tags::MsgType;
pub use types::{CompId, SessionId, Timestamp, COMP_ID_MAX_LEN};
