//! Network front ends.
//!
//! A plain TCP listener for line-based clients and an SSH shell server.
//! Both hand each connection to the same chat session handler.

pub mod input;
mod listener;
pub mod ssh;

pub use input::{EchoMode, InputResult, LineBuffer, DEFAULT_MAX_LINE_BYTES};
pub use listener::{ChatListener, ConnectionPermit};
