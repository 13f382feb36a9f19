//! # wordclient
//!
//! Reads a stream of length-prefixed words from a TCP server.
//!
//! Wire format: each word is a 2-byte big-endian length followed by that
//! many bytes of UTF-8. [`FrameReader`] turns the fragmented byte stream back
//! into whole frames and [`decode`] turns a frame into its word.
//!
//! ## Example
//!
//! ```ignore
//! use std::net::TcpStream;
//! use wordclient::{decode, FrameReader, ReadResult};
//!
//! let stream = TcpStream::connect("127.0.0.1:3490")?;
//! let mut reader = FrameReader::new(stream);
//!
//! while let ReadResult::Frame(frame) = reader.next_frame()? {
//!     println!("    {}", decode(&frame)?);
//! }
//! ```

pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod reader;

pub use decoder::{decode, Word};
pub use error::{ClientError, DecodeError, ReadError};
pub use frame::Frame;
pub use reader::{FrameReader, ReadResult, ReaderState};
