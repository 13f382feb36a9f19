//! Frame reader for accumulating partial reads.
//!
//! Pulls bytes from a blocking source into an owned accumulator and hands
//! out one complete [`Frame`] per call, hiding how the transport fragmented
//! the stream. State machine per connection:
//!
//! ```text
//! AwaitingLength --(2 bytes buffered)--> AwaitingPayload { len }
//! AwaitingPayload --(2 + len buffered)--> frame emitted, AwaitingLength
//! any --(zero-byte read)--> Closed
//! ```
//!
//! `Closed` is terminal: once the peer hangs up every later call reports
//! [`ReadResult::EndOfStream`] without touching the source again.

use std::io::{self, ErrorKind, Read};

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::config::TruncationPolicy;
use crate::error::ReadError;
use crate::frame::{read_length, Frame, LENGTH_PREFIX_SIZE};

/// Default number of bytes requested from the source per read.
pub const DEFAULT_READ_CHUNK: usize = 4096;

/// Outcome of [`FrameReader::next_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    /// A complete frame.
    Frame(Frame),
    /// The peer closed the connection; no more frames will arrive.
    EndOfStream,
}

/// Where the reader is in the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Fewer than 2 bytes of the next frame are known.
    AwaitingLength,
    /// Length prefix buffered, waiting for `len` payload bytes.
    AwaitingPayload { len: usize },
    /// End of stream observed.
    Closed,
}

/// Counters for one reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Non-empty reads performed on the source.
    pub reads: u64,
    /// Bytes received from the source.
    pub bytes_read: u64,
    /// Frames handed out.
    pub frames: u64,
}

/// Result of topping up the accumulator.
enum Fill {
    Ready,
    Closed,
}

/// Splits a blocking byte stream into length-prefixed frames.
pub struct FrameReader<R> {
    source: R,
    /// Bytes received but not yet handed out as a frame.
    buffer: BytesMut,
    state: ReaderState,
    read_chunk: usize,
    on_truncated: TruncationPolicy,
    stats: ReaderStats,
}

impl<R: Read> FrameReader<R> {
    /// Create a reader with default settings.
    pub fn new(source: R) -> Self {
        Self {
            source,
            buffer: BytesMut::with_capacity(DEFAULT_READ_CHUNK),
            state: ReaderState::AwaitingLength,
            read_chunk: DEFAULT_READ_CHUNK,
            on_truncated: TruncationPolicy::default(),
            stats: ReaderStats::default(),
        }
    }

    /// Number of bytes requested per read. Clamped to at least 1.
    pub fn with_read_chunk(mut self, read_chunk: usize) -> Self {
        self.read_chunk = read_chunk.max(1);
        self
    }

    /// What to do when the peer hangs up in the middle of a frame.
    pub fn with_truncation_policy(mut self, policy: TruncationPolicy) -> Self {
        self.on_truncated = policy;
        self
    }

    /// Block until the next frame is complete or the stream ends.
    ///
    /// I/O errors are returned as they happen and leave buffered bytes and
    /// state untouched, so a caller may try again (e.g. after a read
    /// timeout). A zero-byte read closes the reader for good.
    pub fn next_frame(&mut self) -> Result<ReadResult, ReadError> {
        loop {
            match self.state {
                ReaderState::Closed => return Ok(ReadResult::EndOfStream),
                ReaderState::AwaitingLength => {
                    if let Fill::Closed = self.fill_to(LENGTH_PREFIX_SIZE)? {
                        return self.hang_up(LENGTH_PREFIX_SIZE);
                    }
                    if let Some(len) = read_length(&self.buffer) {
                        self.state = ReaderState::AwaitingPayload { len };
                    }
                }
                ReaderState::AwaitingPayload { len } => {
                    let needed = LENGTH_PREFIX_SIZE + len;
                    if let Fill::Closed = self.fill_to(needed)? {
                        return self.hang_up(needed);
                    }
                    let frame = Frame::from_wire(self.buffer.split_to(needed).freeze());
                    self.state = ReaderState::AwaitingLength;
                    self.stats.frames += 1;
                    trace!(len, pending = self.buffer.len(), "frame complete");
                    return Ok(ReadResult::Frame(frame));
                }
            }
        }
    }

    /// Iterate over frames until the stream ends.
    ///
    /// The iterator stops after the first error.
    pub fn frames(&mut self) -> Frames<'_, R> {
        Frames {
            reader: self,
            done: false,
        }
    }

    /// Read from the source until the accumulator holds `needed` bytes.
    fn fill_to(&mut self, needed: usize) -> io::Result<Fill> {
        while self.buffer.len() < needed {
            let start = self.buffer.len();
            self.buffer.resize(start + self.read_chunk, 0);

            let n = match self.source.read(&mut self.buffer[start..]) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {
                    self.buffer.truncate(start);
                    continue;
                }
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(e);
                }
            };

            self.buffer.truncate(start + n);
            if n == 0 {
                return Ok(Fill::Closed);
            }

            self.stats.reads += 1;
            self.stats.bytes_read += n as u64;
            debug!(bytes = n, buffered = self.buffer.len(), needed, "read from source");
        }
        Ok(Fill::Ready)
    }

    /// Handle a zero-byte read while waiting for `expected` bytes.
    fn hang_up(&mut self, expected: usize) -> Result<ReadResult, ReadError> {
        self.state = ReaderState::Closed;
        let buffered = self.buffer.len();

        if buffered == 0 {
            debug!(frames = self.stats.frames, "peer closed at frame boundary");
            return Ok(ReadResult::EndOfStream);
        }

        self.buffer.clear();
        match self.on_truncated {
            TruncationPolicy::Error => Err(ReadError::Truncated { expected, buffered }),
            TruncationPolicy::Discard => {
                warn!(expected, buffered, "peer closed mid-frame, discarding partial frame");
                Ok(ReadResult::EndOfStream)
            }
        }
    }
}

impl<R> FrameReader<R> {
    /// Current position in the frame state machine.
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Bytes received but not yet returned as part of a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Counters accumulated since the reader was created.
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Reference to the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.source
    }

    /// Give back the source. Buffered bytes are dropped.
    pub fn into_inner(self) -> R {
        self.source
    }
}

/// Iterator returned by [`FrameReader::frames`].
pub struct Frames<'a, R> {
    reader: &'a mut FrameReader<R>,
    done: bool,
}

impl<R: Read> Iterator for Frames<'_, R> {
    type Item = Result<Frame, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_frame() {
            Ok(ReadResult::Frame(frame)) => Some(Ok(frame)),
            Ok(ReadResult::EndOfStream) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::frame::MAX_WORD_LEN;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    /// One scripted response from the fake source.
    enum Step {
        Data(Vec<u8>),
        Interrupted,
        Fail(ErrorKind),
    }

    /// A source that replays scripted reads, then reports EOF.
    struct ScriptedSource {
        steps: VecDeque<Step>,
        /// Bytes of the front `Data` step already handed out.
        pos: usize,
        /// Calls to `read`, including the ones that returned EOF.
        calls: usize,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
                pos: 0,
                calls: 0,
            }
        }

        /// Deliver `bytes` in reads of the given sizes (remainder in one final read).
        fn chunked(bytes: &[u8], sizes: &[usize]) -> Self {
            let mut steps = Vec::new();
            let mut offset = 0;
            for &size in sizes {
                // an empty step would read as EOF
                if offset == bytes.len() || size == 0 {
                    continue;
                }
                let end = (offset + size).min(bytes.len());
                steps.push(Step::Data(bytes[offset..end].to_vec()));
                offset = end;
            }
            if offset < bytes.len() {
                steps.push(Step::Data(bytes[offset..].to_vec()));
            }
            Self::new(steps)
        }
    }

    impl Read for ScriptedSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.calls += 1;
            match self.steps.pop_front() {
                None => Ok(0),
                Some(Step::Interrupted) => Err(io::Error::from(ErrorKind::Interrupted)),
                Some(Step::Fail(kind)) => Err(io::Error::from(kind)),
                Some(Step::Data(data)) => {
                    let rest = &data[self.pos..];
                    let n = rest.len().min(buf.len());
                    buf[..n].copy_from_slice(&rest[..n]);
                    if self.pos + n < data.len() {
                        self.pos += n;
                        self.steps.push_front(Step::Data(data));
                    } else {
                        self.pos = 0;
                    }
                    Ok(n)
                }
            }
        }
    }

    fn encode_all(words: &[&str]) -> Vec<u8> {
        words
            .iter()
            .flat_map(|w| Frame::encode(w).unwrap().as_bytes().to_vec())
            .collect()
    }

    fn collect_words<R: Read>(reader: &mut FrameReader<R>) -> Vec<String> {
        let mut words = Vec::new();
        loop {
            match reader.next_frame().unwrap() {
                ReadResult::Frame(frame) => words.push(decode(&frame).unwrap()),
                ReadResult::EndOfStream => return words,
            }
        }
    }

    #[test]
    fn test_hi_cat_scenario() {
        let stream = [0x00, 0x02, b'h', b'i', 0x00, 0x03, b'c', b'a', b't'];
        // the leftover byte arrives in a fourth read
        let source = ScriptedSource::chunked(&stream, &[1, 4, 3]);
        let mut reader = FrameReader::new(source);

        assert_eq!(collect_words(&mut reader), vec!["hi", "cat"]);
        assert_eq!(reader.next_frame().unwrap(), ReadResult::EndOfStream);
        assert_eq!(reader.state(), ReaderState::Closed);
        assert_eq!(reader.stats().reads, 4);
    }

    #[test]
    fn test_fragmentation_invariance() {
        let words = ["alpha", "", "b", "gamma ray", "δέλτα", "終わり"];
        let stream = encode_all(&words);

        // all at once
        let mut reader = FrameReader::new(ScriptedSource::chunked(&stream, &[]));
        assert_eq!(collect_words(&mut reader), words);

        // byte at a time
        let ones = vec![1; stream.len()];
        let mut reader = FrameReader::new(ScriptedSource::chunked(&stream, &ones));
        assert_eq!(collect_words(&mut reader), words);

        // irregular splits
        let mut reader = FrameReader::new(ScriptedSource::chunked(&stream, &[3, 1, 7, 2, 11, 5]));
        assert_eq!(collect_words(&mut reader), words);
    }

    fn word() -> impl Strategy<Value = String> {
        prop_oneof![
            8 => ".{0,24}",
            1 => Just(String::new()),
            1 => Just("w".repeat(MAX_WORD_LEN)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_any_chunking_yields_same_words(
            words in prop::collection::vec(word(), 0..6),
            sizes in prop::collection::vec(1usize..64, 0..32),
            read_chunk in 1usize..4096,
        ) {
            let refs: Vec<&str> = words.iter().map(String::as_str).collect();
            let stream = encode_all(&refs);
            let source = ScriptedSource::chunked(&stream, &sizes);
            let mut reader = FrameReader::new(source).with_read_chunk(read_chunk);

            prop_assert_eq!(collect_words(&mut reader), words);
            prop_assert_eq!(reader.stats().bytes_read, stream.len() as u64);
        }
    }

    #[test]
    fn test_small_read_chunk() {
        let words = ["one", "two", "three"];
        let stream = encode_all(&words);
        let mut reader = FrameReader::new(ScriptedSource::chunked(&stream, &[])).with_read_chunk(5);
        assert_eq!(collect_words(&mut reader), words);
        assert!(reader.stats().reads >= (stream.len() / 5) as u64);
    }

    #[test]
    fn test_surplus_stays_buffered() {
        let stream = encode_all(&["ab", "cd"]);
        let mut reader = FrameReader::new(ScriptedSource::chunked(&stream, &[]));

        match reader.next_frame().unwrap() {
            ReadResult::Frame(frame) => assert_eq!(frame.as_bytes(), &[0, 2, b'a', b'b']),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(reader.buffered(), 4);
        assert_eq!(reader.state(), ReaderState::AwaitingLength);
    }

    #[test]
    fn test_empty_word() {
        let mut reader = FrameReader::new(ScriptedSource::chunked(&[0x00, 0x00], &[]));
        match reader.next_frame().unwrap() {
            ReadResult::Frame(frame) => {
                assert_eq!(frame.len_prefix(), 0);
                assert_eq!(decode(&frame).unwrap(), "");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(reader.next_frame().unwrap(), ReadResult::EndOfStream);
    }

    #[test]
    fn test_max_length_word() {
        let word = "z".repeat(MAX_WORD_LEN);
        let stream = encode_all(&[word.as_str(), "tail"]);
        let mut reader = FrameReader::new(ScriptedSource::chunked(&stream, &[1, 1000, 30000]));
        let words = collect_words(&mut reader);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0], word);
        assert_eq!(words[1], "tail");
    }

    #[test]
    fn test_end_of_stream_is_sticky() {
        let mut reader = FrameReader::new(ScriptedSource::new(Vec::new()));
        assert_eq!(reader.next_frame().unwrap(), ReadResult::EndOfStream);
        assert_eq!(reader.next_frame().unwrap(), ReadResult::EndOfStream);
        assert_eq!(reader.next_frame().unwrap(), ReadResult::EndOfStream);
        // only the first call touched the source
        assert_eq!(reader.get_ref().calls, 1);
    }

    #[test]
    fn test_truncated_after_prefix() {
        let source = ScriptedSource::chunked(&[0x00, 0x05], &[]);
        let mut reader = FrameReader::new(source);
        match reader.next_frame() {
            Err(ReadError::Truncated { expected, buffered }) => {
                assert_eq!(expected, 7);
                assert_eq!(buffered, 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(reader.state(), ReaderState::Closed);
        assert_eq!(reader.buffered(), 0);
        assert_eq!(reader.next_frame().unwrap(), ReadResult::EndOfStream);
    }

    #[test]
    fn test_truncated_inside_prefix() {
        let mut reader = FrameReader::new(ScriptedSource::chunked(&[0x00], &[]));
        match reader.next_frame() {
            Err(ReadError::Truncated { expected, buffered }) => {
                assert_eq!(expected, 2);
                assert_eq!(buffered, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_discard_matches_legacy() {
        let mut stream = encode_all(&["ok"]);
        stream.extend_from_slice(&[0x00, 0x04, b'l', b'o']);
        let mut reader = FrameReader::new(ScriptedSource::chunked(&stream, &[3, 2]))
            .with_truncation_policy(TruncationPolicy::Discard);

        assert_eq!(collect_words(&mut reader), vec!["ok"]);
        assert_eq!(reader.buffered(), 0);
        assert_eq!(reader.next_frame().unwrap(), ReadResult::EndOfStream);
    }

    #[test]
    fn test_interrupted_is_retried() {
        let source = ScriptedSource::new(vec![
            Step::Interrupted,
            Step::Data(vec![0x00]),
            Step::Interrupted,
            Step::Data(vec![0x01, b'x']),
        ]);
        let mut reader = FrameReader::new(source);
        assert_eq!(collect_words(&mut reader), vec!["x"]);
    }

    #[test]
    fn test_io_error_keeps_buffer() {
        let source = ScriptedSource::new(vec![
            Step::Data(vec![0x00, 0x03, b'a']),
            Step::Fail(ErrorKind::WouldBlock),
            Step::Data(vec![b'b', b'c']),
        ]);
        let mut reader = FrameReader::new(source);

        match reader.next_frame() {
            Err(ReadError::Io(e)) => assert_eq!(e.kind(), ErrorKind::WouldBlock),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(reader.state(), ReaderState::AwaitingPayload { len: 3 });
        assert_eq!(reader.buffered(), 3);

        // caller retries after the timeout
        assert_eq!(collect_words(&mut reader), vec!["abc"]);
    }

    #[test]
    fn test_connection_reset_surfaces() {
        let source = ScriptedSource::new(vec![Step::Fail(ErrorKind::ConnectionReset)]);
        let mut reader = FrameReader::new(source);
        match reader.next_frame() {
            Err(ReadError::Io(e)) => assert_eq!(e.kind(), ErrorKind::ConnectionReset),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_frames_iterator() {
        let stream = encode_all(&["x", "yy"]);
        let mut reader = FrameReader::new(ScriptedSource::chunked(&stream, &[1, 1, 1]));
        let words: Vec<String> = reader
            .frames()
            .map(|f| decode(&f.unwrap()).unwrap())
            .collect();
        assert_eq!(words, vec!["x", "yy"]);
    }

    #[test]
    fn test_frames_iterator_stops_after_error() {
        let mut reader = FrameReader::new(ScriptedSource::chunked(&[0x00, 0x09, b'a'], &[]));
        let mut frames = reader.frames();
        assert!(matches!(frames.next(), Some(Err(ReadError::Truncated { .. }))));
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_stats() {
        let stream = encode_all(&["hi", "cat"]);
        let mut reader = FrameReader::new(ScriptedSource::chunked(&stream, &[1, 4, 4]));
        collect_words(&mut reader);
        let stats = reader.stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.bytes_read, 9);
        assert_eq!(stats.reads, 3);
    }
}
