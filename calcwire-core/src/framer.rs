//! Newline-delimited message framing.
//!
//! A [`LineFramer`] owns the accumulation buffer for one connection. Raw
//! reads are appended with [`LineFramer::extend`]; every complete
//! `\n`-terminated segment is then available from [`LineFramer::next_frame`]
//! in arrival order. Bytes after the last newline stay buffered for the next
//! read, so one read may yield zero, one, or many frames.
//!
//! The framer does not decode JSON: a frame is just the bytes between two
//! delimiters, and a bad frame never affects its neighbours. A frame longer
//! than the configured limit is reported once as `Malformed`; its bytes are
//! dropped up to the next delimiter, where framing resumes.

use tracing::debug;

use crate::error::ServiceError;

/// The frame delimiter.
pub const DELIMITER: u8 = b'\n';

/// Default bound on one frame, delimiter excluded.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1 << 20;

/// Per-connection accumulation buffer.
#[derive(Debug)]
pub struct LineFramer {
    buf: Vec<u8>,
    /// Start of the unconsumed region of `buf`.
    start: usize,
    /// Bytes after `start` already searched for a delimiter.
    scanned: usize,
    max_frame_len: usize,
    /// Dropping the rest of an oversized frame until the next delimiter.
    skipping: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }
}

impl LineFramer {
    /// Create an empty framer with [`DEFAULT_MAX_FRAME_LEN`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty framer that rejects frames longer than `max_frame_len`.
    #[must_use]
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { buf: Vec::new(), start: 0, scanned: 0, max_frame_len, skipping: false }
    }

    /// Append bytes read from the connection.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.compact();
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete frame, without its delimiter.
    ///
    /// Returns `Some(Err(Malformed))` once per frame that exceeds the limit,
    /// as soon as the limit is crossed. Only bytes not seen by an earlier call
    /// are searched.
    pub fn next_frame(&mut self) -> Option<Result<Vec<u8>, ServiceError>> {
        loop {
            let from = self.start + self.scanned;
            let Some(offset) = self.buf[from..].iter().position(|&b| b == DELIMITER) else {
                return self.hold_partial();
            };

            let frame_start = self.start;
            let len = self.scanned + offset;
            self.start = from + offset + 1;
            self.scanned = 0;

            if self.skipping {
                self.skipping = false;
                debug!(bytes = len, "resynchronised after oversized frame");
                continue;
            }
            if len > self.max_frame_len {
                return Some(Err(self.too_long(len)));
            }
            return Some(Ok(self.buf[frame_start..frame_start + len].to_vec()));
        }
    }

    /// No delimiter in the buffer: keep the partial frame, or drop it once it
    /// has outgrown the limit.
    fn hold_partial(&mut self) -> Option<Result<Vec<u8>, ServiceError>> {
        let pending = self.buf.len() - self.start;
        if self.skipping {
            self.buf.truncate(self.start);
            self.scanned = 0;
            return None;
        }
        if pending > self.max_frame_len {
            self.buf.truncate(self.start);
            self.scanned = 0;
            self.skipping = true;
            return Some(Err(self.too_long(pending)));
        }
        self.scanned = pending;
        None
    }

    fn too_long(&self, len: usize) -> ServiceError {
        debug!(bytes = len, limit = self.max_frame_len, "frame exceeds limit");
        ServiceError::Malformed(format!("frame exceeds {} bytes", self.max_frame_len))
    }

    /// Drain every complete frame currently buffered.
    pub fn drain_frames(&mut self) -> Vec<Result<Vec<u8>, ServiceError>> {
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Bytes buffered after the last delimiter.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buf[self.start..]
    }

    /// Called at end of stream: an unterminated remainder is never turned
    /// into a frame. Returns how many bytes were dropped.
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending().len();
        if dropped > 0 {
            debug!(bytes = dropped, "discarding unterminated frame at end of stream");
        }
        self.buf.clear();
        self.start = 0;
        self.scanned = 0;
        self.skipping = false;
        dropped
    }

    fn compact(&mut self) {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }
    }
}

/// Append the delimiter to an encoded message.
#[must_use]
pub fn encode_frame(mut payload: Vec<u8>) -> Vec<u8> {
    payload.push(DELIMITER);
    payload
}
