//! Word frame wire format.
//!
//! Each frame is a 2-byte big-endian length followed by exactly that many
//! bytes of UTF-8 text:
//!
//! ```text
//! +--------+--------+------------------+
//! | len hi | len lo | payload (len)    |
//! +--------+--------+------------------+
//!
//! Example: 00 02 68 69  => "hi"
//! ```
//!
//! There is no magic number, version byte, checksum or terminator. A length
//! of zero is a valid, empty word.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::EncodeError;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest payload the length prefix can describe.
pub const MAX_WORD_LEN: usize = u16::MAX as usize;

/// One complete frame: the length prefix plus its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Wrap bytes already known to form exactly one frame.
    pub(crate) fn from_wire(bytes: Bytes) -> Self {
        debug_assert!(bytes.len() >= LENGTH_PREFIX_SIZE);
        debug_assert_eq!(
            bytes.len(),
            LENGTH_PREFIX_SIZE + read_length(&bytes).unwrap_or(0)
        );
        Self { bytes }
    }

    /// Encode a word into a frame.
    pub fn encode(word: &str) -> Result<Self, EncodeError> {
        let len = u16::try_from(word.len()).map_err(|_| EncodeError::TooLong(word.len()))?;
        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + word.len());
        buf.put_u16(len);
        buf.put_slice(word.as_bytes());
        Ok(Self { bytes: buf.freeze() })
    }

    /// Value of the length prefix.
    pub fn len_prefix(&self) -> u16 {
        u16::from_be_bytes([self.bytes[0], self.bytes[1]])
    }

    /// Payload bytes (everything after the prefix).
    pub fn payload(&self) -> &[u8] {
        &self.bytes[LENGTH_PREFIX_SIZE..]
    }

    /// The whole frame as it appeared on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total size on the wire (prefix + payload).
    pub fn wire_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Read the length prefix at the start of `buf`.
///
/// Returns `None` if fewer than [`LENGTH_PREFIX_SIZE`] bytes are present.
pub fn read_length(buf: &[u8]) -> Option<usize> {
    match buf {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo]) as usize),
        _ => None,
    }
}
