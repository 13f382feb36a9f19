//! Turns frames into words.

use crate::error::DecodeError;
use crate::frame::Frame;

/// Decoded text of one frame.
pub type Word = String;

/// Decode the payload of `frame` as UTF-8.
pub fn decode(frame: &Frame) -> Result<Word, DecodeError> {
    let payload = frame.payload();
    match std::str::from_utf8(payload) {
        Ok(s) => Ok(s.to_owned()),
        Err(e) => Err(DecodeError::InvalidUtf8 {
            valid_up_to: e.valid_up_to(),
            len: payload.len(),
        }),
    }
}
