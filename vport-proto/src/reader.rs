//! Incremental frame reassembly from a chunked byte stream.
//!
//! The reader owns one buffer sized exactly to what it currently
//! expects: a header while awaiting one, then the declared payload.
//! Chunk boundaries carry no meaning; a chunk may end mid-header,
//! span several frames, or land exactly on a frame boundary. Malformed
//! headers are recovered in-band by sliding the header window one byte
//! at a time until something valid appears, so at most one byte is
//! discarded per failed attempt.

use tracing::{debug, warn};

use crate::codec::{HEADER_SIZE, MessageHeader};
use crate::message::{Message, MessageType};

/// Parser position within the current frame.
#[derive(Debug, Clone, Copy)]
enum ReadState {
    /// Collecting the next 8-byte header.
    AwaitingHeader,
    /// Collecting the payload declared by a validated header.
    AwaitingBody {
        /// Type parsed from the header; the buffer length is its size.
        mtype: MessageType,
    },
}

/// Two-state frame reassembly machine.
///
/// Feed it byte chunks as they arrive; it returns every message that
/// completed within the chunk. Invalid input is logged and absorbed —
/// the reader never fails and never loses stream synchronization for
/// more than one byte per damaged header.
#[derive(Debug)]
pub struct FrameReader {
    state: ReadState,
    /// Receive buffer; its length is the expected size for `state`.
    buf: Vec<u8>,
    /// Write cursor into `buf`.
    filled: usize,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    /// Creates a reader awaiting the first header.
    pub fn new() -> Self {
        Self {
            state: ReadState::AwaitingHeader,
            buf: vec![0; HEADER_SIZE],
            filled: 0,
        }
    }

    /// Discards any partial frame and awaits a header again.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Consumes one chunk and returns the messages completed by it.
    ///
    /// Frames that fail payload validation are dropped with a warning;
    /// invalid headers trigger one-byte resynchronization. Control
    /// returns as soon as the input is exhausted, so a pathological
    /// stream costs at most one header attempt per fed byte.
    pub fn feed(&mut self, mut input: &[u8]) -> Vec<Message> {
        let mut out = Vec::new();
        // The full-buffer test also runs on an empty chunk, so a
        // zero-size payload that completed on a previous iteration is
        // still processed.
        while !input.is_empty() || self.filled == self.buf.len() {
            let take = (self.buf.len() - self.filled).min(input.len());
            self.buf[self.filled..self.filled + take].copy_from_slice(&input[..take]);
            self.filled += take;
            input = &input[take..];
            if self.filled < self.buf.len() {
                break; // input consumed, frame incomplete
            }
            match self.state {
                ReadState::AwaitingHeader => {
                    let mut raw = [0u8; HEADER_SIZE];
                    raw.copy_from_slice(&self.buf);
                    let header = MessageHeader::decode(raw);
                    match header.validate() {
                        Ok(mtype) => self.begin_body(mtype, header.size),
                        Err(err) => {
                            warn!("{err}");
                            self.slide_one_byte();
                        }
                    }
                }
                ReadState::AwaitingBody { mtype } => {
                    debug!(
                        "received message type {}, size {}",
                        mtype as u32,
                        self.buf.len()
                    );
                    match Message::decode(mtype, &self.buf) {
                        Ok(msg) => out.push(msg),
                        Err(err) => warn!("{err}"),
                    }
                    self.begin_header();
                }
            }
        }
        out
    }

    /// Transitions to collecting `size` payload bytes for `mtype`.
    ///
    /// A zero-size payload leaves the buffer immediately full; the feed
    /// loop picks it up without waiting for more input.
    fn begin_body(&mut self, mtype: MessageType, size: u32) {
        self.state = ReadState::AwaitingBody { mtype };
        self.buf = vec![0; size as usize];
        self.filled = 0;
    }

    /// Transitions back to collecting the next header.
    fn begin_header(&mut self) {
        self.state = ReadState::AwaitingHeader;
        self.buf = vec![0; HEADER_SIZE];
        self.filled = 0;
    }

    /// Drops the oldest buffered header byte and retries from the next
    /// offset: the sliding-window search for a valid header.
    fn slide_one_byte(&mut self) {
        self.buf.copy_within(1.., 0);
        self.filled = HEADER_SIZE - 1;
    }

    #[cfg(test)]
    fn awaiting_header(&self) -> bool {
        matches!(self.state, ReadState::AwaitingHeader)
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.filled
    }
}
