//! NDJSON framing for backend streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so a
//! backend that never emits a newline cannot make the host buffer without
//! bound.
//!
//! # Usage
//!
//! Use [`BridgeCodec`] as the codec parameter for
//! [`tokio_util::codec::FramedRead`] (inbound) and
//! [`tokio_util::codec::FramedWrite`] (outbound). Where the caller receives
//! raw chunks instead of an `AsyncRead`, [`LineFramer`] applies the same rules
//! to pushed byte slices.
//!
//! Oversized lines and lines that are not valid UTF-8 are logged and skipped;
//! framing then resumes at the next newline.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};
use tracing::warn;

use crate::{AppError, Result};

/// Maximum line length accepted from the backend: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// NDJSON codec for the bidirectional backend stream.
///
/// # Decoder
///
/// Each `\n`-terminated UTF-8 line (a trailing `\r` is stripped) is one
/// record. At end of stream a non-empty unterminated remainder is flushed as
/// a final record. Lines over [`MAX_LINE_BYTES`] are dropped and counted in
/// [`BridgeCodec::skipped_lines`].
///
/// # Encoder
///
/// Outbound strings are written as `item\n`. An item that itself contains a
/// newline would split into two records on the other side and is rejected
/// with [`AppError::Framing`].
#[derive(Debug)]
pub struct BridgeCodec {
    inner: LinesCodec,
    skipped: usize,
}

impl BridgeCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line length limit.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
            skipped: 0,
        }
    }

    /// Number of inbound lines dropped for being oversized or not UTF-8.
    #[must_use]
    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }

    /// Record a skipped line, or hand back an error that is not a per-line
    /// problem.
    fn absorb(&mut self, err: LinesCodecError) -> Result<()> {
        match err {
            LinesCodecError::MaxLineLengthExceeded => {
                self.skipped += 1;
                warn!(
                    limit = self.inner.max_length(),
                    "backend line exceeds length limit, discarding"
                );
                Ok(())
            }
            LinesCodecError::Io(io_err) if io_err.kind() == std::io::ErrorKind::InvalidData => {
                self.skipped += 1;
                warn!(error = %io_err, "backend line is not valid utf-8, discarding");
                Ok(())
            }
            LinesCodecError::Io(io_err) => Err(io_err.into()),
        }
    }
}

impl Default for BridgeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BridgeCodec {
    type Item = String;
    type Error = AppError;

    /// Decode the next complete line from `src`, or `Ok(None)` while buffering.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.inner.decode(src) {
                Ok(line) => return Ok(line),
                Err(err) => self.absorb(err)?,
            }
        }
    }

    /// Decode at end of stream, flushing any unterminated remainder.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.inner.decode_eof(src) {
                Ok(line) => return Ok(line),
                Err(err) => self.absorb(err)?,
            }
        }
    }
}

impl Encoder<String> for BridgeCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        if item.contains('\n') {
            return Err(AppError::Framing(
                "outbound record contains an embedded newline".into(),
            ));
        }

        self.inner
            .encode(item, dst)
            .map_err(|err| AppError::Framing(err.to_string()))
    }
}

/// Push-style line framer for callers that receive raw chunks.
///
/// Chunks may split records at any byte; the framer carries the partial
/// remainder across calls, so the emitted lines are independent of where the
/// chunk boundaries fall.
#[derive(Debug, Default)]
pub struct LineFramer {
    codec: BridgeCodec,
    pending: BytesMut,
}

impl LineFramer {
    /// Create an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        loop {
            match self.codec.decode(&mut self.pending) {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => break,
                Err(err) => {
                    warn!(%err, "line framer decode failed");
                    break;
                }
            }
        }
        lines
    }

    /// Flush the unterminated remainder at end of stream.
    ///
    /// Returns `None` when nothing (or only a bare `\r`) is pending.
    pub fn finish(&mut self) -> Option<String> {
        match self.codec.decode_eof(&mut self.pending) {
            Ok(line) => line,
            Err(err) => {
                warn!(%err, "line framer flush failed");
                None
            }
        }
    }

    /// Bytes currently held as an incomplete line.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of lines dropped for being oversized or not UTF-8.
    #[must_use]
    pub fn skipped_lines(&self) -> usize {
        self.codec.skipped_lines()
    }
}
