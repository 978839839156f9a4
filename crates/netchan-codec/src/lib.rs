//! Self-delimiting value streams for netchan.
//!
//! Every value travels as one serde_json document followed by a newline.
//! There is no length prefix or header: the JSON grammar marks where a value
//! ends, so a reader can pull typed values straight off a byte stream.
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_value, encode_value, CodecConfig, DEFAULT_MAX_VALUE_SIZE, DELIMITER};
pub use error::{CodecError, Result};
pub use reader::ValueReader;
pub use writer::ValueWriter;
