//! Exact-size reads over any byte stream

use crate::types::{Result, WaveformError};
use std::io::{ErrorKind, Read};

/// Upper bound on buffer growth per read in [`ByteReader::read_vec`]
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Byte reader with one byte of lookahead
///
/// Every read is all-or-nothing: a read that ends at EOF before the first
/// byte is reported as [`WaveformError::UnexpectedEof`], one that ends part
/// way as [`WaveformError::ShortRead`].
pub struct ByteReader<R> {
    inner: R,
    peeked: Option<u8>,
    position: u64,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            peeked: None,
            position: 0,
        }
    }

    /// Bytes consumed so far
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Look at the next byte without consuming it. `None` at EOF.
    pub fn peek_byte(&mut self) -> Result<Option<u8>> {
        if self.peeked.is_none() {
            let mut byte = [0u8; 1];
            if self.fill(&mut byte)? == 1 {
                self.peeked = Some(byte[0]);
            }
        }
        Ok(self.peeked)
    }

    /// Read until `buf` is full or the source is exhausted
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// Fill `buf` completely
    pub fn read_exact(&mut self, buf: &mut [u8], context: &'static str) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let mut filled = 0;
        if let Some(byte) = self.peeked.take() {
            buf[0] = byte;
            filled = 1;
        }
        filled += self.fill(&mut buf[filled..])?;
        self.position += filled as u64;

        match filled {
            n if n == buf.len() => Ok(()),
            0 => Err(WaveformError::UnexpectedEof { context }),
            got => Err(WaveformError::ShortRead {
                context,
                expected: buf.len(),
                got,
            }),
        }
    }

    /// Read exactly `len` bytes into a new buffer
    ///
    /// `len` usually comes from the file itself, so the buffer grows in
    /// bounded chunks as bytes arrive instead of being sized up front.
    pub fn read_vec(&mut self, len: usize, context: &'static str) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if len == 0 {
            return Ok(buf);
        }

        if let Some(byte) = self.peeked.take() {
            buf.try_reserve(1)?;
            buf.push(byte);
        }
        while buf.len() < len {
            let want = (len - buf.len()).min(READ_CHUNK_SIZE);
            buf.try_reserve(want)?;
            let start = buf.len();
            buf.resize(start + want, 0);
            let got = self.fill(&mut buf[start..])?;
            buf.truncate(start + got);
            if got < want {
                break;
            }
        }
        self.position += buf.len() as u64;

        match buf.len() {
            n if n == len => Ok(buf),
            0 => Err(WaveformError::UnexpectedEof { context }),
            got => Err(WaveformError::ShortRead {
                context,
                expected: len,
                got,
            }),
        }
    }
}
