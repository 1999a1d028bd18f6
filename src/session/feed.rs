//! Buffered input feeds for the decode loop.
//!
//! `ByteFeed` reads binary inputs in fixed chunks and carries unconsumed
//! remainder bytes across reads, because unit boundaries do not align with
//! read-chunk boundaries. A unit is never consumed until its full width is
//! buffered.

use std::io::{BufRead, BufReader, Read};

/// Chunk size for binary reads.
const READ_CHUNK: usize = 1024;

pub struct ByteFeed<'a> {
    reader: &'a mut dyn Read,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<'a> ByteFeed<'a> {
    pub fn new(reader: &'a mut dyn Read) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(READ_CHUNK * 2),
            pos: 0,
            eof: false,
        }
    }

    /// Bytes buffered but not yet consumed.
    pub fn available(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Buffer at least `want` bytes; returns false once the stream cannot
    /// provide them (end of input).
    pub fn ensure(&mut self, want: usize) -> std::io::Result<bool> {
        while self.available() < want && !self.eof {
            // Compact the consumed prefix, then append one chunk.
            if self.pos > 0 {
                self.buf.drain(..self.pos);
                self.pos = 0;
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.reader.read(&mut chunk)?;
            if n == 0 {
                self.eof = true;
            } else {
                self.buf.extend_from_slice(&chunk[..n]);
            }
        }
        Ok(self.available() >= want)
    }

    /// The byte pair starting `offset` bytes past the cursor. The caller must
    /// have `ensure`d availability.
    pub fn peek_pair(&self, offset: usize) -> [u8; 2] {
        [self.buf[self.pos + offset], self.buf[self.pos + offset + 1]]
    }

    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        self.pos += n;
    }
}

/// Line reader for text inputs, with leading-line skipping.
pub struct TextFeed<'a> {
    reader: BufReader<&'a mut dyn Read>,
}

impl<'a> TextFeed<'a> {
    pub fn new(reader: &'a mut dyn Read) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Discard `n` leading lines.
    pub fn skip_lines(&mut self, n: usize) -> std::io::Result<()> {
        for _ in 0..n {
            if self.next_line()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// The next line, without its terminator; `None` at end of input.
    pub fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}
