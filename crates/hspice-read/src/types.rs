//! Common types, errors, and constants for HSPICE waveform decoding

use num_complex::Complex64;
use std::collections::TryReserveError;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Number of 32-bit integers in a block header
pub const BLOCK_HEADER_SIZE: usize = 4;
/// Block header marker (items 0 and 2) in the writer's byte order
pub const BLOCK_MARKER: i32 = 0x0000_0004;

/// Header character positions (offsets into the accumulated header text)
pub const NUM_OF_VARIABLES_POSITION: usize = 0;
pub const NUM_OF_PROBES_POSITION: usize = 4;
pub const NUM_OF_SWEEPS_POSITION: usize = 8;
pub const NUM_OF_SWEEPS_END_POSITION: usize = 12;
pub const POST_START_POSITION1: usize = 16;
pub const POST_START_POSITION2: usize = 20;
pub const NUM_OF_POST_CHARACTERS: usize = 4;
pub const TITLE_START_POSITION: usize = 24;
pub const DATE_START_POSITION: usize = 88;
pub const DATE_END_POSITION: usize = 112;
pub const SWEEP_SIZE_POSITION1: usize = 176;
pub const SWEEP_SIZE_POSITION2: usize = 187;
pub const VECTOR_DESCRIPTION_START_POSITION: usize = 256;

pub const POST_STRING11: &[u8] = b"9007";
pub const POST_STRING12: &[u8] = b"9601";
pub const POST_STRING21: &[u8] = b"2001";

/// Marks the last header block
pub const HEADER_END_MARKER: &[u8] = b"$&%#";

/// Any sample above this value is the end-of-table sentinel
pub const END_MARKER_THRESHOLD: f64 = 9.0e29;

/// Scale type code of a frequency (AC) analysis
pub const FREQUENCY_TYPE: i32 = 2;

// ============================================================================
// Enums
// ============================================================================

/// Byte order detected from a block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Post format variant, distinguished by marker strings at offsets 16 and 20
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostVariant {
    /// "9007" at offset 16
    V9007,
    /// "9601" at offset 16
    V9601,
    /// "2001" at offset 20 (sweep size stored at a different column)
    V2001,
}

/// Column representation of the variable group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Real,
    Complex,
}

/// Analysis type inferred from the file contents or name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisType {
    Transient,
    AC,
    DC,
    Unknown,
}

impl AnalysisType {
    /// Infer from the scale vector name
    pub fn from_scale_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "time" => AnalysisType::Transient,
            "hertz" | "freq" | "frequency" => AnalysisType::AC,
            _ => AnalysisType::Unknown,
        }
    }

    /// Infer from a file extension (`tr0`, `ac0`, `sw0`, ...)
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_lowercase();
        if ext.starts_with("tr") {
            AnalysisType::Transient
        } else if ext.starts_with("ac") {
            AnalysisType::AC
        } else if ext.starts_with("sw") {
            AnalysisType::DC
        } else {
            AnalysisType::Unknown
        }
    }
}

/// Vector data - either real or complex
#[derive(Debug, Clone, PartialEq)]
pub enum VectorData {
    Real(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl VectorData {
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            VectorData::Real(v) => v.len(),
            VectorData::Complex(v) => v.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_complex(&self) -> bool {
        matches!(self, VectorData::Complex(_))
    }

    pub fn as_real(&self) -> Option<&[f64]> {
        match self {
            VectorData::Real(v) => Some(v),
            VectorData::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&[Complex64]> {
        match self {
            VectorData::Complex(v) => Some(v),
            VectorData::Real(_) => None,
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for waveform decoding
#[derive(Debug, Error)]
pub enum WaveformError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of file while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("short read of {context}: expected {expected} bytes, got {got}")]
    ShortRead {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("block {block}: {reason}")]
    Framing { block: usize, reason: String },

    #[error("format error: {0}")]
    Format(String),

    #[error("cannot allocate: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("output sink error: {0}")]
    Sink(String),
}

/// Coarse classification of [`WaveformError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Short read, EOF, stream cannot be opened
    Stream,
    /// Block marker or header/trailer size mismatch
    Framing,
    /// File variant this decoder does not support
    Format,
    /// Buffer growth failure
    Allocation,
    /// The output sink rejected a column or table
    Sink,
}

impl WaveformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WaveformError::Io(_)
            | WaveformError::UnexpectedEof { .. }
            | WaveformError::ShortRead { .. } => ErrorKind::Stream,
            WaveformError::Framing { .. } => ErrorKind::Framing,
            WaveformError::Format(_) => ErrorKind::Format,
            WaveformError::Allocation(_) => ErrorKind::Allocation,
            WaveformError::Sink(_) => ErrorKind::Sink,
        }
    }
}

pub type Result<T> = std::result::Result<T, WaveformError>;

// ============================================================================
// Data Structures
// ============================================================================

/// Metadata extracted from the header blocks
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub title: String,
    pub creation_date: String,
    pub post_variant: PostVariant,
    /// Scale plus "variable" vectors
    pub num_variables: usize,
    pub num_probes: usize,
    pub column_kind: ColumnKind,
    /// Scale name as written in the file
    pub scale_name: String,
    /// Normalized names of the dependent vectors, in column order
    pub vector_names: Vec<String>,
}

impl FileMetadata {
    #[inline]
    pub fn num_vectors(&self) -> usize {
        self.num_variables + self.num_probes
    }

    /// Floats per row; complex variables take two
    pub fn num_columns(&self) -> usize {
        match self.column_kind {
            ColumnKind::Complex => self.num_vectors() + self.num_variables - 1,
            ColumnKind::Real => self.num_vectors(),
        }
    }

    /// Whether the vector at `index` (scale = 0) holds complex values
    #[inline]
    pub fn is_complex_vector(&self, index: usize) -> bool {
        self.column_kind == ColumnKind::Complex && index > 0 && index < self.num_variables
    }

    pub fn analysis(&self) -> AnalysisType {
        if self.column_kind == ColumnKind::Complex {
            AnalysisType::AC
        } else {
            AnalysisType::from_scale_name(&self.scale_name)
        }
    }
}

/// The swept parameter and its values, one per table
#[derive(Debug, Clone, PartialEq)]
pub struct SweepDescriptor {
    pub name: String,
    pub point_count: usize,
    pub values: Vec<f64>,
}

impl SweepDescriptor {
    pub fn new(name: impl Into<String>, point_count: usize) -> Self {
        Self {
            name: name.into(),
            point_count,
            values: Vec::new(),
        }
    }

    /// Store the sweep value of the next table.
    ///
    /// Fails once `point_count` values have been recorded.
    pub fn record(&mut self, value: f64) -> Result<()> {
        if self.values.len() >= self.point_count {
            return Err(WaveformError::Format(format!(
                "sweep value overflow: {} declares {} points",
                self.name, self.point_count
            )));
        }
        self.values.try_reserve(1)?;
        self.values.push(value);
        Ok(())
    }
}

/// One sweep point: scale and dependent vectors by name, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub sweep_value: Option<f64>,
    columns: Vec<(String, VectorData)>,
}

impl Table {
    pub fn new(sweep_value: Option<f64>) -> Self {
        Self {
            sweep_value,
            columns: Vec::new(),
        }
    }

    /// Insert a column; an existing key keeps its position and gets the new data.
    pub fn insert(&mut self, name: impl Into<String>, data: VectorData) -> Option<VectorData> {
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, data)),
            None => {
                self.columns.push((name, data));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&VectorData> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VectorData)> {
        self.columns.iter().map(|(n, d)| (n.as_str(), d))
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.first().map(|(_, d)| d.len()).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fully decoded waveform file
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub metadata: FileMetadata,
    pub sweep: Option<SweepDescriptor>,
    pub tables: Vec<Table>,
}

impl Document {
    #[inline]
    pub fn scale_name(&self) -> &str {
        &self.metadata.scale_name
    }

    /// Get a vector from the first table
    pub fn get(&self, name: &str) -> Option<&VectorData> {
        self.tables.first()?.get(name)
    }

    /// Rows in the first table
    pub fn len(&self) -> usize {
        self.tables.first().map(Table::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn analysis(&self) -> AnalysisType {
        self.metadata.analysis()
    }
}
