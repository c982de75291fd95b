use std::io::{BufRead, BufReader, Read};

use crate::error::{ProcessorError, Result};

/// Minimum bytes per chunk before the reader starts looking for a line feed
/// to stop at.
#[cfg(debug_assertions)]
pub(crate) const MIN_CHUNK: usize = 200;
#[cfg(not(debug_assertions))]
pub(crate) const MIN_CHUNK: usize = 100 * 1024; // 100k

/// Reads newline-aligned chunks: at least the minimum block size, then keeps
/// going until the most recent byte is a line feed or the stream ends. A
/// directive line is therefore never split across two chunks.
///
/// The first chunk is checked for UTF-16/UTF-32 byte order marks, which are
/// rejected; a UTF-8 BOM is ordinary data and passes through.
pub struct ChunkedReader<R> {
    inner: BufReader<R>,
    min_chunk: usize,
    first_chunk: bool,
}

impl<R: Read> ChunkedReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_min_chunk(inner, MIN_CHUNK)
    }

    fn with_min_chunk(inner: R, min_chunk: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            min_chunk,
            first_chunk: true,
        }
    }

    /// Fills `buf` with the next chunk. Returns `false` once the stream is
    /// exhausted and nothing was read.
    pub fn next_chunk(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        buf.clear();

        while buf.len() < self.min_chunk {
            let taken = {
                let avail = self.inner.fill_buf()?;
                if avail.is_empty() {
                    break;
                }
                let take = (self.min_chunk - buf.len()).min(avail.len());
                buf.extend_from_slice(&avail[..take]);
                take
            };
            self.inner.consume(taken);
        }

        // extend to the next line feed so the chunk ends on a line boundary
        if buf.len() >= self.min_chunk && buf.last() != Some(&b'\n') {
            self.inner.read_until(b'\n', buf)?;
        }

        if self.first_chunk {
            self.first_chunk = false;
            reject_wide_bom(buf)?;
        }

        Ok(!buf.is_empty())
    }
}

/// Errors out on UTF-16/UTF-32 BOMs. The UTF-32 checks run first: an LE
/// UTF-32 BOM starts with the LE UTF-16 one.
fn reject_wide_bom(data: &[u8]) -> Result<()> {
    if data.len() >= 4 {
        if data[..4] == [0x00, 0x00, 0xFE, 0xFF] {
            return Err(ProcessorError::EncodingError("UTF-32 BE"));
        }
        if data[..4] == [0xFF, 0xFE, 0x00, 0x00] {
            return Err(ProcessorError::EncodingError("UTF-32 LE"));
        }
    }
    if data.len() >= 2 {
        if data[..2] == [0xFE, 0xFF] {
            return Err(ProcessorError::EncodingError("UTF-16 BE"));
        }
        if data[..2] == [0xFF, 0xFE] {
            return Err(ProcessorError::EncodingError("UTF-16 LE"));
        }
    }
    Ok(())
}

/// Bounds-checked byte walker over one line of input.
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn bump(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.buf.len());
    }

    /// Advances past bytes matching `pred`, returning how many were skipped.
    pub fn skip_while(&mut self, pred: impl Fn(u8) -> bool) -> usize {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !pred(b) {
                break;
            }
            self.pos += 1;
        }
        self.pos - start
    }

    /// Consumes and returns the maximal run of bytes matching `pred`.
    pub fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        self.skip_while(pred);
        &self.buf[start..self.pos]
    }
}
