/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # oxfix Transport
//!
//! Network transport plumbing for the oxfix FIX session engine.
//!
//! This crate provides:
//! - [`FrameCodec`]: tokio codec extracting complete FIX frames from a byte
//!   stream
//! - [`spawn_connection`]: drives one stream against a running session
//! - [`Initiator`] / [`Acceptor`]: TCP conveniences for each session role

pub mod connection;
pub mod frame;

pub use connection::{spawn_connection, spawn_connection_with_codec, Acceptor, Initiator};
pub use frame::{FrameCodec, FrameError};
