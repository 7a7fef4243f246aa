//! Python bindings for the HSPICE waveform decoder
//!
//! Decoded tables are built directly as Python objects: every column becomes
//! a numpy array, every table a dict, and the tables are collected in a list.

use hspice_read::{OutputSink, SweepDescriptor, VectorData, WaveformError};
use numpy::ndarray::Array1;
use numpy::IntoPyArray;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList, PyString, PyTuple};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Output Sink
// ============================================================================

/// Sink building a list of `{name: ndarray}` dicts
struct PySink<'py> {
    py: Python<'py>,
    tables: Bound<'py, PyList>,
}

impl<'py> PySink<'py> {
    fn new(py: Python<'py>) -> Self {
        Self {
            py,
            tables: PyList::empty(py),
        }
    }
}

fn sink_error(e: PyErr) -> WaveformError {
    WaveformError::Sink(e.to_string())
}

impl<'py> OutputSink for PySink<'py> {
    type Table = Bound<'py, PyDict>;

    fn new_mapping(&mut self, _sweep_value: Option<f64>) -> hspice_read::Result<Self::Table> {
        Ok(PyDict::new(self.py))
    }

    fn insert(
        &mut self,
        table: &mut Self::Table,
        key: &str,
        column: VectorData,
    ) -> hspice_read::Result<()> {
        let array = match column {
            VectorData::Real(v) => Array1::from_vec(v).into_pyarray(self.py).into_any(),
            VectorData::Complex(v) => Array1::from_vec(v).into_pyarray(self.py).into_any(),
        };
        table.set_item(key, array).map_err(sink_error)
    }

    fn append_table(&mut self, table: Self::Table) -> hspice_read::Result<()> {
        self.tables.append(table).map_err(sink_error)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Install a stderr subscriber once; `RUST_LOG` overrides the level
fn init_logging(debug: i32) {
    if debug <= 0 {
        return;
    }
    let level = if debug > 1 {
        "hspice_read=trace"
    } else {
        "hspice_read=debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber installed by an earlier call stays in place
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// `(sweep_name, sweep_values, tables)`, or `(None, None, tables)` when unswept
fn sweeps_tuple<'py>(
    py: Python<'py>,
    sweep: Option<SweepDescriptor>,
    tables: Bound<'py, PyList>,
) -> PyResult<Bound<'py, PyTuple>> {
    let (name, values) = match sweep {
        Some(sweep) => (
            PyString::new(py, &sweep.name).into_any(),
            Array1::from_vec(sweep.values).into_pyarray(py).into_any(),
        ),
        None => (py.None().into_bound(py), py.None().into_bound(py)),
    };
    PyTuple::new(py, [name, values, tables.into_any()])
}

fn decode(py: Python<'_>, filename: &str) -> PyResult<Option<PyObject>> {
    let mut sink = PySink::new(py);
    let decoded = hspice_read::read_stream(filename).and_then(|r| r.decode_into(&mut sink));
    let (metadata, sweep) = match decoded {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(file = filename, error = %e, "Decode failed");
            return Ok(None);
        }
    };

    let sweeps = sweeps_tuple(py, sweep, sink.tables)?;
    let entry = PyTuple::new(
        py,
        [
            sweeps.into_any(),
            PyString::new(py, &metadata.scale_name).into_any(),
            py.None().into_bound(py),
            PyString::new(py, &metadata.title).into_any(),
            PyString::new(py, &metadata.creation_date).into_any(),
            py.None().into_bound(py),
        ],
    )?;

    let result = PyList::empty(py);
    result.append(entry)?;
    Ok(Some(result.into_any().unbind()))
}

// ============================================================================
// Python Functions
// ============================================================================

/// Read an HSPICE binary waveform file
///
/// Args:
///     filename: Path to the waveform file (.tr0, .ac0, .sw0)
///     debug: Debug level (0=quiet, 1=debug, 2=trace)
///
/// Returns:
///     [(sweeps, scale_name, None, title, date, None)] or None on failure,
///     where sweeps is (sweep_name, sweep_values, tables) and each table
///     is a dict mapping vector names to numpy arrays
#[pyfunction]
#[pyo3(name = "hspice_read", signature = (filename, debug=0))]
pub fn read_waveform(py: Python<'_>, filename: &str, debug: i32) -> PyResult<Option<PyObject>> {
    init_logging(debug);
    decode(py, filename)
}

/// Convert an HSPICE file to SPICE3 binary raw format
///
/// Returns True on success.
#[pyfunction]
#[pyo3(signature = (input_path, output_path, debug=0))]
pub fn convert_to_raw(input_path: &str, output_path: &str, debug: i32) -> bool {
    init_logging(debug);
    match hspice_read::read_and_convert(input_path, output_path) {
        Ok(()) => true,
        Err(e) => {
            warn!(input = input_path, error = %e, "Conversion failed");
            false
        }
    }
}

// ============================================================================
// Module Definition
// ============================================================================

#[pymodule]
pub fn _hspice_read(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(read_waveform, m)?)?;
    m.add_function(wrap_pyfunction!(convert_to_raw, m)?)?;
    Ok(())
}
