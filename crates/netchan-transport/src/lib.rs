//! Transport layer for netchan.
//!
//! Turns an address string into a listening socket or a connected stream:
//! - `host:port` and `:port` select TCP
//! - `unix:<path>` selects a Unix domain socket (unix targets)
//!
//! This is the lowest layer of netchan. Everything else builds on top of
//! the [`NetListener`] and [`NetStream`] types provided here.

pub mod address;
pub mod error;
pub mod listener;
pub mod stream;

pub use address::{Address, UNIX_PREFIX};
pub use error::{Result, TransportError};
pub use listener::NetListener;
pub use stream::NetStream;
