use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use netchan_transport::NetStream;
use serde::Serialize;

use crate::codec::{encode_value, CodecConfig};
use crate::error::{CodecError, Result};
use crate::reader::transport_to_codec_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete values to any `Write` stream.
pub struct ValueWriter<W> {
    inner: W,
    buf: BytesMut,
    config: CodecConfig,
}

impl<W: Write> ValueWriter<W> {
    /// Create a new value writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, CodecConfig::default())
    }

    /// Create a new value writer with explicit configuration.
    pub fn with_config(inner: W, config: CodecConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write one value, then flush (blocking).
    ///
    /// A write timeout surfaces as `CodecError::Io`; it is not retried.
    pub fn write_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.buf.clear();
        encode_value(value, &mut self.buf)?;

        if self.buf.len() > self.config.max_value_size {
            return Err(CodecError::ValueTooLarge {
                size: self.buf.len(),
                max: self.config.max_value_size,
            });
        }

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(CodecError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}

impl ValueWriter<NetStream> {
    /// Create a value writer for `NetStream` and apply write timeout from config.
    pub fn with_config_net(inner: NetStream, config: CodecConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_codec_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use serde::Deserialize;

    use super::*;
    use crate::reader::ValueReader;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        greeting: String,
    }

    fn payload(greeting: &str) -> Payload {
        Payload {
            greeting: greeting.to_string(),
        }
    }

    #[test]
    fn write_values_back_to_back() {
        let mut writer = ValueWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.write_value(&payload("hello")).unwrap();
        writer.write_value(&payload("world!")).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(
            wire,
            b"{\"greeting\":\"hello\"}\n{\"greeting\":\"world!\"}\n".to_vec()
        );

        let mut reader = ValueReader::new(Cursor::new(wire));
        assert_eq!(reader.read_value::<Payload>().unwrap(), payload("hello"));
        assert_eq!(reader.read_value::<Payload>().unwrap(), payload("world!"));
    }

    #[test]
    fn value_too_large_rejected() {
        let cfg = CodecConfig {
            max_value_size: 4,
            ..CodecConfig::default()
        };
        let mut writer = ValueWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.write_value(&payload("oversized")).unwrap_err();
        assert!(matches!(err, CodecError::ValueTooLarge { .. }));
        assert!(writer.get_ref().get_ref().is_empty(), "nothing should be written");
    }

    #[test]
    fn unserializable_value_rejected() {
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], "keys must be strings");
        let mut writer = ValueWriter::new(Cursor::new(Vec::<u8>::new()));

        let err = writer.write_value(&map).unwrap_err();
        assert!(matches!(err, CodecError::Serialize(_)));
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = ValueWriter::new(sink);

        writer.write_value(&payload("x")).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = ValueWriter::new(writer_impl);
        writer.write_value(&payload("retry")).unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data, b"{\"greeting\":\"retry\"}\n".to_vec());
    }

    #[test]
    fn would_block_surfaces_as_io_error() {
        let mut writer = ValueWriter::new(WouldBlockWriter);
        let err = writer.write_value(&payload("stuck")).unwrap_err();
        assert!(matches!(err, CodecError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = ValueWriter::new(ZeroWriter);
        let err = writer.write_value(&payload("x")).unwrap_err();
        assert!(matches!(err, CodecError::ConnectionClosed));
    }

    #[test]
    #[cfg(unix)]
    fn broken_pipe_surfaces_as_io_error() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        drop(right);
        let mut writer = ValueWriter::new(left);

        let err = writer.write_value(&payload("nobody home")).unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct WouldBlockWriter;

    impl Write for WouldBlockWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
