//! # Chunked JSON Materializer
//!
//! Converts a binary recording back into a `{"data":[...]}` JSON document
//! incrementally, bounded by a caller-supplied byte budget per call.
//!
//! The generator is pull-based: the transport calls [`JsonChunker::next_chunk`]
//! with whatever buffer it can afford right now, and a return of `0` means
//! the document is complete. Peak memory is one decoded record plus its
//! serialized JSON text, independent of the recording's size, so a
//! multi-megabyte recording can be served from a few hundred bytes of RAM.
//!
//! A serialized fragment that does not fit in the remaining budget stays in
//! an internal pending buffer and is drained across as many subsequent calls
//! as needed. The generator therefore never writes past the budget and makes
//! progress for any budget of at least one byte; a record only straddles
//! calls when it is larger than the entire buffer offered.

use std::io::Read;

use crate::error::Result;
use crate::sample::codec::read_sample;

/// Document opening fragment, emitted before the first record
const OPENING: &[u8] = b"{\"data\":[";

/// Document closing fragment, emitted after the last record
const CLOSING: &[u8] = b"]}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing emitted yet
    Start,
    /// Emitting records
    Records,
    /// Closing fragment queued; once drained, every call returns 0
    Done,
}

/// Incremental recording-to-JSON generator.
///
/// # Examples
///
/// ```
/// use imu_bridge::materialize::JsonChunker;
/// use std::io::Cursor;
///
/// let mut chunker = JsonChunker::new(Cursor::new(Vec::new()));
/// let mut buf = [0u8; 16];
///
/// let n = chunker.next_chunk(&mut buf)?;
/// assert_eq!(&buf[..n], b"{\"data\":[]}");
/// assert_eq!(chunker.next_chunk(&mut buf)?, 0);
/// # Ok::<(), imu_bridge::error::ImuBridgeError>(())
/// ```
pub struct JsonChunker<R> {
    reader: R,
    state: State,
    pending: Vec<u8>,
    pending_pos: usize,
    records_emitted: u64,
}

impl<R: Read> JsonChunker<R> {
    /// Create a generator over a recording's bytes
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: State::Start,
            pending: Vec::new(),
            pending_pos: 0,
            records_emitted: 0,
        }
    }

    /// Fill `buf` with the next part of the JSON document.
    ///
    /// `buf.len()` is this call's byte budget. Returns the number of bytes
    /// written; `0` means the document is complete and the underlying
    /// reader may be dropped. Callers must pass a non-empty buffer.
    ///
    /// # Errors
    ///
    /// Returns `Storage` or `CorruptRecording` on read faults and
    /// `Encoding` if a record cannot be serialized. After an error the
    /// generator should be discarded.
    pub fn next_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut written = 0;

        while written < buf.len() {
            // Drain pending bytes before producing anything new
            if self.pending_pos < self.pending.len() {
                let remaining = &self.pending[self.pending_pos..];
                let n = remaining.len().min(buf.len() - written);
                buf[written..written + n].copy_from_slice(&remaining[..n]);
                written += n;
                self.pending_pos += n;
                continue;
            }

            match self.state {
                State::Start => {
                    self.set_pending(OPENING.to_vec());
                    self.state = State::Records;
                }
                State::Records => match read_sample(&mut self.reader)? {
                    Some(sample) => {
                        let mut fragment = Vec::new();
                        if self.records_emitted > 0 {
                            fragment.push(b',');
                        }
                        serde_json::to_writer(&mut fragment, &sample.to_json())?;
                        self.records_emitted += 1;
                        self.set_pending(fragment);
                    }
                    None => {
                        self.set_pending(CLOSING.to_vec());
                        self.state = State::Done;
                    }
                },
                State::Done => break,
            }
        }

        Ok(written)
    }

    /// Number of records serialized so far
    pub fn records_emitted(&self) -> u64 {
        self.records_emitted
    }

    /// Whether the document has been fully emitted
    pub fn is_done(&self) -> bool {
        self.state == State::Done && self.pending_pos >= self.pending.len()
    }

    fn set_pending(&mut self, bytes: Vec<u8>) {
        self.pending = bytes;
        self.pending_pos = 0;
    }
}
