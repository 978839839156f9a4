use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, Result};

/// Byte written after every encoded value.
pub const DELIMITER: u8 = b'\n';

/// Default maximum encoded value size: 16 MiB.
pub const DEFAULT_MAX_VALUE_SIZE: usize = 16 * 1024 * 1024;

/// Encode one value into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────────────────┬──────┐
/// │ JSON document (serde_json)   │ '\n' │
/// └──────────────────────────────┴──────┘
/// ```
///
/// The JSON grammar delimits objects, arrays, strings and literals on its
/// own; the trailing newline settles where a top-level number ends.
pub fn encode_value<T: Serialize + ?Sized>(value: &T, dst: &mut BytesMut) -> Result<()> {
    serde_json::to_writer((&mut *dst).writer(), value).map_err(CodecError::Serialize)?;
    dst.put_u8(DELIMITER);
    Ok(())
}

/// Decode one value from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete value yet.
/// On success, consumes the value bytes (and leading whitespace) from the
/// buffer. `at_eof` tells the decoder no further bytes will arrive, which
/// lets a trailing top-level number complete without its delimiter.
pub fn decode_value<T: DeserializeOwned>(
    src: &mut BytesMut,
    max_value_size: usize,
    at_eof: bool,
) -> Result<Option<T>> {
    let Some(start) = src.iter().position(|b| !b.is_ascii_whitespace()) else {
        src.clear();
        return Ok(None); // Need more data
    };

    let decoded = {
        let mut values = serde_json::Deserializer::from_slice(&src[start..]).into_iter::<T>();
        match values.next() {
            Some(Ok(value)) => Some((value, values.byte_offset())),
            Some(Err(err)) if err.is_eof() => None,
            Some(Err(err)) => return Err(CodecError::Malformed(err)),
            None => None,
        }
    };

    let Some((value, len)) = decoded else {
        let pending = src.len() - start;
        if pending > max_value_size {
            return Err(CodecError::ValueTooLarge {
                size: pending,
                max: max_value_size,
            });
        }
        return Ok(None); // Need more data
    };

    if len > max_value_size {
        return Err(CodecError::ValueTooLarge {
            size: len,
            max: max_value_size,
        });
    }

    let end = start + len;
    // A number running up to the end of the buffer may continue in the next read.
    if end == src.len() && !at_eof && src[end - 1].is_ascii_digit() {
        return Ok(None);
    }

    src.advance(end);
    Ok(Some(value))
}

/// Configuration for value streams.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Maximum encoded value size in bytes. Default: 16 MiB.
    pub max_value_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl CodecConfig {
    /// Set the maximum encoded value size.
    pub fn with_max_value_size(mut self, size: usize) -> Self {
        self.max_value_size = size;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Option<std::time::Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    pub fn with_write_timeout(mut self, timeout: Option<std::time::Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

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
    fn encode_appends_delimiter() {
        let mut buf = BytesMut::new();
        encode_value(&payload("hello"), &mut buf).unwrap();

        assert_eq!(buf.as_ref(), b"{\"greeting\":\"hello\"}\n");
    }

    #[test]
    fn decode_consumes_one_value() {
        let mut buf = BytesMut::new();
        encode_value(&payload("hello"), &mut buf).unwrap();
        encode_value(&payload("world!"), &mut buf).unwrap();

        let first: Payload = decode_value(&mut buf, DEFAULT_MAX_VALUE_SIZE, false)
            .unwrap()
            .unwrap();
        let second: Payload = decode_value(&mut buf, DEFAULT_MAX_VALUE_SIZE, false)
            .unwrap()
            .unwrap();

        assert_eq!(first, payload("hello"));
        assert_eq!(second, payload("world!"));
        let rest: Option<Payload> = decode_value(&mut buf, DEFAULT_MAX_VALUE_SIZE, false).unwrap();
        assert!(rest.is_none());
        assert!(buf.is_empty(), "trailing whitespace should be dropped");
    }

    #[test]
    fn decode_incomplete_value() {
        let mut buf = BytesMut::from(&b"{\"greeting\":\"hel"[..]);
        let result: Option<Payload> = decode_value(&mut buf, DEFAULT_MAX_VALUE_SIZE, false).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 16, "incomplete bytes must stay buffered");
    }

    #[test]
    fn decode_trailing_number_waits_for_delimiter() {
        let mut buf = BytesMut::from(&b"12"[..]);
        let pending: Option<u32> = decode_value(&mut buf, DEFAULT_MAX_VALUE_SIZE, false).unwrap();
        assert!(pending.is_none());

        buf.extend_from_slice(b"3\n");
        let value: u32 = decode_value(&mut buf, DEFAULT_MAX_VALUE_SIZE, false)
            .unwrap()
            .unwrap();
        assert_eq!(value, 123);
    }

    #[test]
    fn decode_trailing_number_at_eof() {
        let mut buf = BytesMut::from(&b"  7"[..]);
        let value: u32 = decode_value(&mut buf, DEFAULT_MAX_VALUE_SIZE, true)
            .unwrap()
            .unwrap();
        assert_eq!(value, 7);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_malformed() {
        let mut buf = BytesMut::from(&b"]]]\n"[..]);
        let result = decode_value::<Payload>(&mut buf, DEFAULT_MAX_VALUE_SIZE, false);
        assert!(matches!(result, Err(CodecError::Malformed(_))));
    }

    #[test]
    fn decode_wrong_shape_is_malformed() {
        let mut buf = BytesMut::from(&b"{\"other\":1}\n"[..]);
        let result = decode_value::<Payload>(&mut buf, DEFAULT_MAX_VALUE_SIZE, false);
        assert!(matches!(result, Err(CodecError::Malformed(_))));
    }

    #[test]
    fn decode_value_too_large() {
        let mut buf = BytesMut::new();
        encode_value(&payload(&"x".repeat(64)), &mut buf).unwrap();

        let result = decode_value::<Payload>(&mut buf, 16, false);
        assert!(matches!(result, Err(CodecError::ValueTooLarge { max: 16, .. })));
    }

    #[test]
    fn decode_incomplete_value_too_large() {
        let mut buf = BytesMut::from(format!("\"{}", "x".repeat(64)).as_bytes());
        let result = decode_value::<String>(&mut buf, 16, false);
        assert!(matches!(result, Err(CodecError::ValueTooLarge { .. })));
    }

    #[test]
    fn config_builders() {
        let cfg = CodecConfig::default()
            .with_max_value_size(1024)
            .with_read_timeout(Some(std::time::Duration::from_secs(1)));
        assert_eq!(cfg.max_value_size, 1024);
        assert_eq!(cfg.read_timeout, Some(std::time::Duration::from_secs(1)));
        assert!(cfg.write_timeout.is_none());
    }
}
