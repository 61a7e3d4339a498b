//! mouthsync Link - Talking to the remote compositor
//!
//! This crate provides:
//! - The typed adapter contract implemented by a transport
//! - A link session that tracks connection state and serializes calls

pub mod adapter;
pub mod session;

pub use adapter::*;
pub use session::*;
