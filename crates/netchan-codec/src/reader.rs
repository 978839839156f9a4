use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use netchan_transport::NetStream;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::codec::{decode_value, CodecConfig, DELIMITER};
use crate::error::{CodecError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete values from any `Read` stream.
///
/// Handles partial reads internally; callers always get whole values.
///
/// A value is parsed once its delimiter has arrived (or at EOF). Bytes are
/// scanned for the delimiter only once, so a value spread over many reads
/// costs time linear in its size.
pub struct ValueReader<R> {
    inner: R,
    buf: BytesMut,
    /// Prefix of `buf` already searched for a delimiter.
    scanned: usize,
    config: CodecConfig,
}

impl<R: Read> ValueReader<R> {
    /// Create a new value reader with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, CodecConfig::default())
    }

    /// Create a new value reader with explicit configuration.
    pub fn with_config(inner: R, config: CodecConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scanned: 0,
            config,
        }
    }

    /// Read the next complete value (blocking).
    ///
    /// Returns `Err(CodecError::ConnectionClosed)` when EOF is reached,
    /// whether the stream ended cleanly or in the middle of a value.
    pub fn read_value<T: DeserializeOwned>(&mut self) -> Result<T> {
        loop {
            if let Some(value) = self.decode_buffered()? {
                return Ok(value);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            };

            if read == 0 {
                return match self.decode(true)? {
                    Some(value) => Ok(value),
                    None => Err(CodecError::ConnectionClosed),
                };
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Decode a value if a delimiter arrived since the last attempt.
    fn decode_buffered<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        while let Some(offset) = self.buf[self.scanned..]
            .iter()
            .position(|&b| b == DELIMITER)
        {
            self.scanned += offset + 1;
            if let Some(value) = self.decode(false)? {
                return Ok(Some(value));
            }
        }
        self.scanned = self.buf.len();

        // No delimiter yet, but the pending bytes may already exceed the limit.
        if self.buf.len() > self.config.max_value_size {
            return self.decode(false);
        }
        Ok(None)
    }

    fn decode<T: DeserializeOwned>(&mut self, at_eof: bool) -> Result<Option<T>> {
        let decoded = decode_value(&mut self.buf, self.config.max_value_size, at_eof)
            .inspect_err(|err| {
                debug!(error = %err, buffered = self.buf.len(), "undecodable input");
            })?;
        if decoded.is_some() {
            self.scanned = 0;
        } else {
            self.scanned = self.scanned.min(self.buf.len());
        }
        Ok(decoded)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}

impl ValueReader<NetStream> {
    /// Create a value reader for `NetStream` and apply read timeout from config.
    pub fn with_config_net(inner: NetStream, config: CodecConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_codec_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_codec_error(err: netchan_transport::TransportError) -> CodecError {
    match err {
        netchan_transport::TransportError::Io(io)
        | netchan_transport::TransportError::Accept(io) => CodecError::Io(io),
        netchan_transport::TransportError::Bind { source, .. }
        | netchan_transport::TransportError::Connect { source, .. } => CodecError::Io(source),
        other => CodecError::Io(std::io::Error::other(other.to_string())),
    }
}
