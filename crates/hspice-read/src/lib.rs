//! # HSPICE Binary Waveform Decoder
//!
//! Decodes HSPICE binary result files (.tr0, .ac0, .sw0) into tables of
//! named vectors, one table per sweep point.
//!
//! ## Features
//!
//! - Both byte orders, detected from the block framing
//! - All three post format layouts (9007, 9601, 2001)
//! - Real and complex (AC) vectors
//! - Table-at-a-time streaming and a pluggable [`OutputSink`]
//! - Conversion to SPICE3 binary raw format
//! - Structured logging via `tracing` for diagnostics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hspice_read::{read, VectorData};
//!
//! let doc = read("simulation.tr0").unwrap();
//! println!("Title: {}", doc.metadata.title);
//! println!("Scale: {}", doc.scale_name());
//!
//! if let Some(VectorData::Real(time)) = doc.get(doc.scale_name()) {
//!     println!("Time points: {}", time.len());
//! }
//!
//! // One table per sweep point
//! for (i, table) in doc.tables.iter().enumerate() {
//!     println!("table {}: sweep={:?} rows={}", i, table.sweep_value, table.len());
//! }
//! ```
//!
//! ## Streaming
//!
//! ```rust,no_run
//! use hspice_read::read_stream;
//!
//! let reader = read_stream("sweep.sw0").unwrap();
//! for table in reader {
//!     let table = table.unwrap();
//!     println!("{:?}: {} rows", table.sweep_value, table.len());
//! }
//! ```
//!
//! ## Enabling Logging
//!
//! This library uses `tracing` for structured logging. To see log output,
//! initialize a tracing subscriber in your application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//!
//! let doc = hspice_read::read("simulation.tr0").unwrap();
//! ```

mod assembler;
mod block_reader;
mod parser;
mod reader;
mod sink;
mod stream;
mod types;
mod writer;

use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, instrument, warn};

// Re-export public types
pub use types::{
    AnalysisType, ColumnKind, Document, Endian, ErrorKind, FileMetadata, PostVariant, Result,
    SweepDescriptor, Table, VectorData, WaveformError,
};

// Format constants
pub use types::{
    END_MARKER_THRESHOLD, FREQUENCY_TYPE, HEADER_END_MARKER, POST_STRING11, POST_STRING12,
    POST_STRING21,
};

pub use num_complex::Complex64;
pub use parser::normalize_vector_name;
pub use sink::{DocumentSink, OutputSink};
pub use stream::{read_stream, TableReader};
pub use writer::write_spice3_raw;

// ============================================================================
// Public API Functions
// ============================================================================

/// Read a waveform file.
///
/// # Arguments
/// * `path` - Path to the waveform file (.tr0, .ac0, .sw0)
///
/// # Returns
/// * `Ok(Document)` - Metadata, sweep and one table per sweep point
/// * `Err(WaveformError)` - If the file cannot be read or decoded
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read<P: AsRef<Path>>(path: P) -> Result<Document> {
    let file = File::open(path.as_ref()).map_err(|e| {
        warn!(error = %e, "Cannot open file");
        e
    })?;
    if file.metadata()?.len() == 0 {
        warn!("File is empty");
        return Err(WaveformError::UnexpectedEof {
            context: "first block",
        });
    }

    // SAFETY: the map is read-only and dropped before this function returns
    let mmap = unsafe { Mmap::map(&file)? };
    info!(
        bytes = mmap.len(),
        mb = format_args!("{:.2}", mmap.len() as f64 / 1_048_576.0),
        "File opened"
    );

    read_from(&mmap[..])
}

/// Decode a waveform from any byte stream.
pub fn read_from<R: Read>(reader: R) -> Result<Document> {
    TableReader::open(reader)?.into_document()
}

/// Decode a waveform from `reader`, handing every table to `sink`.
///
/// Tables already appended stay in the sink when a later one fails; the
/// error is still returned.
pub fn decode_into<R: Read, S: OutputSink>(
    reader: R,
    sink: &mut S,
) -> Result<(FileMetadata, Option<SweepDescriptor>)> {
    TableReader::open(reader)?.decode_into(sink)
}

/// Parse only the header of a waveform file.
///
/// The returned sweep descriptor has no values yet.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<(FileMetadata, Option<SweepDescriptor>)> {
    let reader = read_stream(path)?;
    Ok((reader.metadata().clone(), reader.sweep().cloned()))
}

/// Convert an HSPICE binary file to SPICE3 raw format.
///
/// # Arguments
/// * `input_path` - Path to the input HSPICE file
/// * `output_path` - Path for the output SPICE3 .raw file
pub fn read_and_convert<P: AsRef<Path>, Q: AsRef<Path>>(input_path: P, output_path: Q) -> Result<()> {
    writer::hspice_to_raw_impl(input_path, output_path)
}
