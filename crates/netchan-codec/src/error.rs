/// Errors that can occur while encoding or decoding values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value could not be serialized.
    #[error("failed to serialize value: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The stream contained bytes that do not decode to the expected type.
    #[error("malformed value in stream: {0}")]
    Malformed(#[source] serde_json::Error),

    /// An encoded value exceeds the configured maximum size.
    #[error("value too large ({size} bytes, max {max})")]
    ValueTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing values.
    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete value was received.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, CodecError>;
