//! Error types for wordclient.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while pulling frames off the byte source.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Transport failure (reset, timeout, unreachable...).
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    /// Peer closed the connection in the middle of a frame.
    #[error("connection closed mid-frame: expected {expected} bytes, had {buffered}")]
    Truncated {
        /// Bytes the pending frame needed in total (prefix included).
        expected: usize,
        /// Bytes that had been received when the peer hung up.
        buffered: usize,
    },
}

/// Failure turning a frame payload into a word.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload is not valid UTF-8.
    #[error("word payload is not valid UTF-8 (valid up to byte {valid_up_to} of {len})")]
    InvalidUtf8 { valid_up_to: usize, len: usize },
}

/// Failure while encoding a word into a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Word does not fit the 16-bit length prefix.
    #[error("word is {0} bytes, the length prefix allows at most 65535")]
    TooLong(usize),
}

/// Top-level error for a client session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Host/port could not be resolved.
    #[error("failed to resolve '{target}': {source}")]
    Resolve {
        target: String,
        #[source]
        source: io::Error,
    },

    /// No resolved address accepted the connection.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Reading frames failed.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// A word could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Writing words to the output failed.
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    FileRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
