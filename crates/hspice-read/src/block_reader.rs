//! HSPICE block framing
//!
//! Header text and sample data share one framing: four 32-bit integers
//! (items 0 and 2 are the byte-order marker, item 3 the payload size in
//! bytes), the payload, and one trailing integer repeating the payload size.

use crate::reader::ByteReader;
use crate::types::{
    Endian, Result, WaveformError, BLOCK_HEADER_SIZE, BLOCK_MARKER, END_MARKER_THRESHOLD,
};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::Read;
use tracing::{debug, trace, warn};

/// Size of one sample in a data block
pub const SAMPLE_SIZE: usize = 4;

// ============================================================================
// Core Structures
// ============================================================================

/// One framed block
#[derive(Debug)]
pub struct Block {
    /// Byte order of this block
    pub endian: Endian,
    /// Payload size in bytes as stored in the header
    pub byte_count: i32,
    /// Payload with every item in little-endian order
    pub payload: Vec<u8>,
}

/// Block codec over a byte stream
///
/// Knows nothing about what the payload means; callers pick the item size
/// (1 for header text, [`SAMPLE_SIZE`] for data).
pub struct BlockReader<R> {
    reader: ByteReader<R>,
    endian: Option<Endian>,
    /// Number of blocks read so far
    block_count: usize,
}

impl<R: Read> BlockReader<R> {
    pub fn new(reader: ByteReader<R>) -> Self {
        Self {
            reader,
            endian: None,
            block_count: 0,
        }
    }

    /// Next raw byte of the stream, not consumed
    #[inline]
    pub fn peek_byte(&mut self) -> Result<Option<u8>> {
        self.reader.peek_byte()
    }

    /// Byte order of the last block read
    #[inline]
    pub fn endian(&self) -> Option<Endian> {
        self.endian
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    #[inline]
    pub fn bytes_consumed(&self) -> u64 {
        self.reader.position()
    }

    fn framing_error(&self, reason: impl Into<String>) -> WaveformError {
        let reason = reason.into();
        warn!(
            block = self.block_count,
            offset = self.reader.position(),
            "{}",
            reason
        );
        WaveformError::Framing {
            block: self.block_count,
            reason,
        }
    }

    fn read_header(&mut self) -> Result<(Endian, [i32; BLOCK_HEADER_SIZE])> {
        let mut raw = [0u8; BLOCK_HEADER_SIZE * 4];
        self.reader.read_exact(&mut raw, "block header")?;

        let endian =
            detect_endian(&raw).ok_or_else(|| self.framing_error("corrupted block header"))?;

        let mut header = [0i32; BLOCK_HEADER_SIZE];
        match endian {
            Endian::Little => LittleEndian::read_i32_into(&raw, &mut header),
            Endian::Big => BigEndian::read_i32_into(&raw, &mut header),
        }
        Ok((endian, header))
    }

    fn read_trailer(&mut self, endian: Endian) -> Result<i32> {
        let mut raw = [0u8; 4];
        self.reader.read_exact(&mut raw, "block trailer")?;
        Ok(match endian {
            Endian::Little => LittleEndian::read_i32(&raw),
            Endian::Big => BigEndian::read_i32(&raw),
        })
    }

    /// Read one block of `item_size`-byte items
    pub fn read_block(&mut self, item_size: usize) -> Result<Block> {
        debug_assert!(item_size > 0);

        let (endian, header) = self.read_header()?;
        let byte_count = header[BLOCK_HEADER_SIZE - 1];
        if byte_count < 0 {
            return Err(self.framing_error(format!("negative block size {}", byte_count)));
        }

        let item_count = byte_count as usize / item_size;
        let mut payload = self
            .reader
            .read_vec(item_count * item_size, "block payload")?;
        if endian == Endian::Big && item_size > 1 {
            for item in payload.chunks_exact_mut(item_size) {
                item.reverse();
            }
        }

        let trailer = self.read_trailer(endian)?;
        if trailer != byte_count {
            return Err(self.framing_error(format!(
                "block header and trailer mismatch ({} != {})",
                byte_count, trailer
            )));
        }

        if self.endian.is_some_and(|prev| prev != endian) {
            debug!(block = self.block_count, ?endian, "Byte order changed");
        }
        self.endian = Some(endian);
        self.block_count += 1;

        trace!(
            block = self.block_count,
            items = item_count,
            ?endian,
            "Block read"
        );

        Ok(Block {
            endian,
            byte_count,
            payload,
        })
    }

    /// Append data blocks to `samples` until the end-of-table sentinel
    ///
    /// The sentinel stays in the buffer. Returns the number of blocks read.
    pub fn read_samples(&mut self, samples: &mut Vec<f32>) -> Result<usize> {
        let mut num_blocks = 0usize;

        loop {
            let block = self.read_block(SAMPLE_SIZE)?;
            num_blocks += 1;

            let count = block.payload.len() / SAMPLE_SIZE;
            samples.try_reserve(count)?;
            let start = samples.len();
            samples.resize(start + count, 0.0);
            LittleEndian::read_f32_into(&block.payload, &mut samples[start..]);

            if samples
                .last()
                .is_some_and(|&v| f64::from(v) > END_MARKER_THRESHOLD)
            {
                break;
            }
        }

        debug!(
            blocks = num_blocks,
            values = samples.len(),
            "Data blocks read"
        );
        Ok(num_blocks)
    }
}

/// Items 0 and 2 of the header must both read as 4 in one byte order
fn detect_endian(raw: &[u8]) -> Option<Endian> {
    let (first, third) = (&raw[0..4], &raw[8..12]);
    if LittleEndian::read_i32(first) == BLOCK_MARKER && LittleEndian::read_i32(third) == BLOCK_MARKER
    {
        Some(Endian::Little)
    } else if BigEndian::read_i32(first) == BLOCK_MARKER
        && BigEndian::read_i32(third) == BLOCK_MARKER
    {
        Some(Endian::Big)
    } else {
        None
    }
}

// ============================================================================
// Tests
// ============================================================================
