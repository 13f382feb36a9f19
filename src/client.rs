//! TCP client that prints words received from a server.
//!
//! Connects once, reads frames until the server hangs up, decodes each one
//! and writes it to the output. There is no reconnect: any transport failure
//! ends the session.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use tracing::{debug, info, warn};

use crate::config::{Config, InvalidUtf8Policy};
use crate::decoder::decode;
use crate::error::ClientError;
use crate::reader::{FrameReader, ReadResult, ReaderStats};

/// What a finished session did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Words written to the output.
    pub words: u64,
    /// Frames dropped because they were not valid UTF-8.
    pub skipped: u64,
    /// Reader counters at the end of the session.
    pub stats: ReaderStats,
}

/// Connect to the configured server and print every word it sends.
pub fn run<W: Write>(config: &Config, out: &mut W) -> Result<SessionSummary, ClientError> {
    let stream = connect(config)?;

    let reader = FrameReader::new(stream)
        .with_read_chunk(config.read_chunk)
        .with_truncation_policy(config.on_truncated);

    // The stream is owned by the reader and closed when it drops.
    print_words(reader, config.on_invalid_utf8, out)
}

/// Resolve the target and open a connection to the first address that accepts.
pub fn connect(config: &Config) -> Result<TcpStream, ClientError> {
    let target = config.target();
    let addrs: Vec<SocketAddr> = target
        .to_socket_addrs()
        .map_err(|source| ClientError::Resolve {
            target: target.clone(),
            source,
        })?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        match connect_addr(addr, config) {
            Ok(stream) => {
                info!(peer = %addr, read_timeout = ?config.read_timeout, "Connected");
                return Ok(stream);
            }
            Err(source) => {
                debug!(peer = %addr, error = %source, "Connect attempt failed");
                last_error = Some(ClientError::Connect { addr, source });
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ClientError::Resolve {
        target,
        source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
    }))
}

fn connect_addr(addr: SocketAddr, config: &Config) -> io::Result<TcpStream> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    match config.connect_timeout {
        Some(timeout) => socket.connect_timeout(&addr.into(), timeout)?,
        None => socket.connect(&addr.into())?,
    }
    socket.set_read_timeout(config.read_timeout)?;
    socket.set_nodelay(config.nodelay)?;

    Ok(socket.into())
}

/// Drain `reader`, writing each word on its own indented line.
pub fn print_words<R: Read, W: Write>(
    mut reader: FrameReader<R>,
    on_invalid_utf8: InvalidUtf8Policy,
    out: &mut W,
) -> Result<SessionSummary, ClientError> {
    let mut summary = SessionSummary::default();

    writeln!(out, "Getting words:").map_err(ClientError::Output)?;

    loop {
        let frame = match reader.next_frame()? {
            ReadResult::Frame(frame) => frame,
            ReadResult::EndOfStream => break,
        };

        match decode(&frame) {
            Ok(word) => {
                writeln!(out, "    {word}").map_err(ClientError::Output)?;
                summary.words += 1;
            }
            Err(e) if on_invalid_utf8 == InvalidUtf8Policy::Skip => {
                warn!(error = %e, len = frame.len_prefix(), "Skipping undecodable word");
                summary.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    out.flush().map_err(ClientError::Output)?;
    summary.stats = reader.stats();

    info!(
        words = summary.words,
        skipped = summary.skipped,
        frames = summary.stats.frames,
        bytes = summary.stats.bytes_read,
        reads = summary.stats.reads,
        "Server closed the stream"
    );

    Ok(summary)
}
