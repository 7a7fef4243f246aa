//! Table-at-a-time decoding
//!
//! Only the header is parsed when the reader is opened. The data blocks of
//! each sweep point are read when that point's table is requested, so peak
//! memory is one table rather than the whole file.

use crate::assembler::assemble_table;
use crate::block_reader::BlockReader;
use crate::parser::{check_binary, parse_header_metadata, read_header_blocks};
use crate::reader::ByteReader;
use crate::sink::{DocumentSink, OutputSink};
use crate::types::{Document, FileMetadata, Result, SweepDescriptor, Table};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, instrument, trace, warn};

/// Streaming decoder yielding one table per sweep point
pub struct TableReader<R> {
    blocks: BlockReader<R>,
    metadata: FileMetadata,
    sweep: Option<SweepDescriptor>,
    /// Tables the header promises (1 without a sweep)
    point_count: usize,
    tables_read: usize,
    /// Sample buffer, refilled for every table
    samples: Vec<f32>,
    /// Set after the first error; no further tables are read
    failed: bool,
}

impl<R: Read> TableReader<R> {
    /// Check the stream is binary and parse the header blocks
    #[instrument(skip_all)]
    pub fn open(reader: R) -> Result<Self> {
        let mut blocks = BlockReader::new(ByteReader::new(reader));
        check_binary(&mut blocks)?;

        let header = read_header_blocks(&mut blocks)?;
        let (metadata, sweep) = parse_header_metadata(&header)?;
        let point_count = sweep.as_ref().map_or(1, |s| s.point_count);

        info!(
            endian = ?blocks.endian(),
            title = %metadata.title,
            tables = point_count,
            "Header decoded"
        );

        Ok(Self {
            blocks,
            metadata,
            sweep,
            point_count,
            tables_read: 0,
            samples: Vec::new(),
            failed: false,
        })
    }

    #[inline]
    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Sweep descriptor; its values fill in as tables are read
    #[inline]
    pub fn sweep(&self) -> Option<&SweepDescriptor> {
        self.sweep.as_ref()
    }

    #[inline]
    pub fn tables_read(&self) -> usize {
        self.tables_read
    }

    /// Tables not yet read
    #[inline]
    pub fn remaining(&self) -> usize {
        if self.failed {
            0
        } else {
            self.point_count - self.tables_read
        }
    }

    /// Decode the next table into `sink`.
    ///
    /// Returns `Ok(false)` once every table has been read.
    pub fn read_table_into<S: OutputSink>(&mut self, sink: &mut S) -> Result<bool> {
        if self.remaining() == 0 {
            return Ok(false);
        }

        match self.read_next(sink) {
            Ok(()) => Ok(true),
            Err(e) => {
                self.failed = true;
                warn!(table = self.tables_read, error = %e, "Failed to read table");
                Err(e)
            }
        }
    }

    fn read_next<S: OutputSink>(&mut self, sink: &mut S) -> Result<()> {
        trace!(
            table = self.tables_read + 1,
            of = self.point_count,
            "Reading table"
        );

        self.samples.clear();
        self.blocks.read_samples(&mut self.samples)?;
        assemble_table(&self.samples, &self.metadata, self.sweep.as_mut(), sink)?;
        self.tables_read += 1;
        Ok(())
    }

    /// Decode all remaining tables into `sink`
    pub fn decode_into<S: OutputSink>(
        mut self,
        sink: &mut S,
    ) -> Result<(FileMetadata, Option<SweepDescriptor>)> {
        while self.read_table_into(sink)? {}

        info!(
            tables = self.tables_read,
            bytes = self.blocks.bytes_consumed(),
            "Decode complete"
        );
        Ok((self.metadata, self.sweep))
    }

    /// Decode all remaining tables into a [`Document`]
    pub fn into_document(self) -> Result<Document> {
        let mut sink = DocumentSink::new();
        let (metadata, sweep) = self.decode_into(&mut sink)?;
        Ok(Document {
            metadata,
            sweep,
            tables: sink.into_tables(),
        })
    }
}

impl<R: Read> Iterator for TableReader<R> {
    type Item = Result<Table>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut sink = DocumentSink::new();
        match self.read_table_into(&mut sink) {
            Ok(true) => sink.into_tables().pop().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Open a file for table-at-a-time reading
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_stream<P: AsRef<Path>>(path: P) -> Result<TableReader<BufReader<File>>> {
    let file = File::open(path.as_ref())?;
    TableReader::open(BufReader::new(file))
}
