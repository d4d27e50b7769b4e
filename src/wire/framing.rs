//! # Line Framing
//!
//! Reassembles newline-delimited records from a TCP byte stream.
//!
//! TCP delivers bytes with no respect for record boundaries: one `recv` may
//! carry half a line, three lines, or a line split in the middle of a numeric
//! field. `LineFramer` absorbs chunks as they arrive and yields complete
//! lines, so the extracted sequence is identical for every possible
//! segmentation of the same byte stream.

use bytes::{Buf, BytesMut};

use crate::error::{Result, VbattLinkError};

/// Cap on the number of buffered bytes awaiting a terminator. A well-behaved
/// device sends ~15-byte lines; hitting this means the peer is not speaking
/// the protocol.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

const LINE_TERMINATOR: u8 = b'\n';

/// Incremental line extractor over an arbitrarily-chunked byte stream.
///
/// Bytes left over after the last terminator persist in the buffer across
/// calls until the rest of their line arrives.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: BytesMut,
}

impl LineFramer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    /// Append one received chunk to the buffer.
    ///
    /// # Errors
    ///
    /// Returns a `Frame` error if the buffer would exceed [`MAX_LINE_BYTES`]
    /// without a terminator in sight. The connection should be dropped; the
    /// framer is not usable afterwards.
    pub fn extend(&mut self, chunk: &[u8]) -> Result<()> {
        if self.buffer.len() + chunk.len() > MAX_LINE_BYTES
            && !chunk.contains(&LINE_TERMINATOR)
            && !self.buffer.contains(&LINE_TERMINATOR)
        {
            return Err(VbattLinkError::Frame(format!(
                "unterminated line exceeds {} bytes",
                MAX_LINE_BYTES
            )));
        }
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    /// Pop the next complete line, without its terminator.
    ///
    /// Returns `None` when no full line is buffered yet. Call repeatedly
    /// after each `extend`: a single chunk may complete several lines.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|&b| b == LINE_TERMINATOR)?;
        let line = self.buffer.split_to(pos);
        self.buffer.advance(1); // drop the terminator
        Some(line.to_vec())
    }

    /// Bytes currently held without a terminator.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial line, e.g. after a disconnect mid-record.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
