//! Typed channels named by network addresses.
//!
//! A reader binds an address and gets a channel; writers anywhere on the
//! network open the same address and push values that arrive, decoded, on
//! that channel.
//!
//! ```no_run
//! use netchan::Registry;
//!
//! let registry = Registry::new();
//! let reader = registry.bind::<String>(":9000")?;
//!
//! let writer = netchan::open::<String>(":9000")?;
//! writer.send("hello".to_string()).ok();
//! assert_eq!(reader.recv().ok().as_deref(), Some("hello"));
//!
//! writer.close()?;
//! registry.unbind(":9000");
//! # Ok::<(), netchan::ChanError>(())
//! ```
//!
//! # Crate Structure
//!
//! - [`transport`]: address parsing, listeners and connected streams
//! - [`codec`]: self-delimiting JSON value streams
//! - [`channel`]: registry, read handles and writer sessions

/// Re-export transport types.
pub mod transport {
    pub use netchan_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use netchan_codec::*;
}

/// Re-export channel types.
pub mod channel {
    pub use netchan_channel::*;
}

#[cfg(feature = "logging")]
pub mod logging;

pub use netchan_channel::{
    open, open_with_config, ChanError, ChannelConfig, ReadHandle, RecvError, RecvTimeoutError,
    Registry, SendError, SendTimeoutError, SessionState, TryRecvError, WriteHandle, WriterConfig,
};
pub use netchan_codec::CodecConfig;
pub use netchan_transport::Address;
