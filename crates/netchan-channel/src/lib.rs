//! Typed channels named by network addresses.
//!
//! A reader binds an address in a [`Registry`] and receives a
//! [`ReadHandle`]; writers [`open`] the same address and push values that
//! arrive, in order per writer, on that handle.
//!
//! Behind each bound address sit a listener thread and a fixed pool of
//! decode workers. Delivery is unbuffered end to end: a writer's send
//! returns once its encoder has taken the value, and a worker holding a
//! decoded value waits until a reader takes it.

mod acceptor;
pub mod config;
mod connections;
mod entry;
pub mod error;
mod pool;
pub mod reader;
pub mod registry;
pub mod session;
mod signal;

pub use config::{ChannelConfig, WriterConfig, DEFAULT_WORKERS};
pub use error::{
    ChanError, RecvError, RecvTimeoutError, Result, SendError, SendTimeoutError, TryRecvError,
};
pub use reader::{Iter, ReadHandle};
pub use registry::Registry;
pub use session::{open, open_with_config, SessionState, WriteHandle};
