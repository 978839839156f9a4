use std::fmt;

use netchan_codec::CodecError;
use netchan_transport::TransportError;

/// Errors returned by channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChanError {
    /// The address could not be listened on.
    #[error("cannot listen on {address}: {source}")]
    Bind {
        address: String,
        source: TransportError,
    },

    /// The address could not be dialed.
    #[error("cannot dial {address}: {source}")]
    Dial {
        address: String,
        source: TransportError,
    },

    /// The address is already bound to a channel of another value type.
    #[error("channel {address} carries {bound}, not {requested}")]
    TypeMismatch {
        address: String,
        bound: &'static str,
        requested: &'static str,
    },

    /// The channel configuration cannot be used.
    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// A background thread could not be started.
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        source: std::io::Error,
    },

    /// A writer session failed to encode or transmit a value.
    #[error("writer session failed: {0}")]
    Encode(#[from] CodecError),

    /// A writer session's encode thread panicked.
    #[error("writer session panicked")]
    SessionPanicked,
}

pub type Result<T> = std::result::Result<T, ChanError>;

/// The channel was closed; no further values will arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("receiving on a closed channel")]
pub struct RecvError;

/// Failure of [`ReadHandle::recv_timeout`](crate::ReadHandle::recv_timeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvTimeoutError {
    /// No value arrived within the timeout.
    #[error("timed out waiting on channel")]
    Timeout,
    /// The channel was closed.
    #[error("receiving on a closed channel")]
    Closed,
}

/// Failure of [`ReadHandle::try_recv`](crate::ReadHandle::try_recv).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryRecvError {
    /// No value is ready right now.
    #[error("receiving on an empty channel")]
    Empty,
    /// The channel was closed.
    #[error("receiving on a closed channel")]
    Closed,
}

/// The writer session is closed; the value is handed back.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct SendError<T>(pub T);

impl<T> SendError<T> {
    /// Recover the value that could not be sent.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SendError(..)")
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sending on a closed writer session")
    }
}

impl<T> std::error::Error for SendError<T> {}

/// Failure of [`WriteHandle::send_timeout`](crate::WriteHandle::send_timeout).
#[derive(PartialEq, Eq, Clone, Copy)]
pub enum SendTimeoutError<T> {
    /// The encode task did not take the value within the timeout.
    Timeout(T),
    /// The writer session is closed.
    Closed(T),
}

impl<T> SendTimeoutError<T> {
    /// Recover the value that could not be sent.
    pub fn into_inner(self) -> T {
        match self {
            Self::Timeout(value) | Self::Closed(value) => value,
        }
    }

    /// Whether the send failed because the session is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

impl<T> fmt::Debug for SendTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(_) => f.write_str("Timeout(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for SendTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(_) => f.write_str("timed out sending on writer session"),
            Self::Closed(_) => f.write_str("sending on a closed writer session"),
        }
    }
}

impl<T> std::error::Error for SendTimeoutError<T> {}
