//! Turn one table's raw samples into named columns

use crate::sink::OutputSink;
use crate::types::{FileMetadata, Result, SweepDescriptor, VectorData};
use num_complex::Complex64;
use tracing::{debug, warn};

/// Assemble one table from `samples` and hand it to `sink`.
///
/// `samples` holds everything the data blocks of one sweep point carried:
/// the sweep value first (when swept), the rows, and the sentinel last.
/// Trailing floats that do not fill a whole row are ignored.
///
/// Returns the number of rows.
pub fn assemble_table<S: OutputSink>(
    samples: &[f32],
    metadata: &FileMetadata,
    sweep: Option<&mut SweepDescriptor>,
    sink: &mut S,
) -> Result<usize> {
    let num_vectors = metadata.num_vectors();
    let num_columns = metadata.num_columns().max(1);

    let (sweep_value, data_start, overhead) = match (sweep, samples.first()) {
        (Some(sweep), Some(&first)) => {
            let value = f64::from(first);
            sweep.record(value)?;
            (Some(value), 1, 2)
        }
        _ => (None, 0, 1),
    };
    let num_rows = samples.len().saturating_sub(overhead) / num_columns;

    // Pre-allocate all vectors
    let mut vectors: Vec<VectorData> = Vec::with_capacity(num_vectors);
    for i in 0..num_vectors {
        let vector = if metadata.is_complex_vector(i) {
            VectorData::Complex(sink.new_complex_array(num_rows)?)
        } else {
            VectorData::Real(sink.new_real_array(num_rows)?)
        };
        vectors.push(vector);
    }

    // Single pass, row-major
    let mut pos = data_start;
    for _ in 0..num_rows {
        for vector in vectors.iter_mut() {
            match vector {
                VectorData::Real(vec) => {
                    vec.push(f64::from(samples[pos]));
                    pos += 1;
                }
                VectorData::Complex(vec) => {
                    let re = f64::from(samples[pos]);
                    let im = f64::from(samples[pos + 1]);
                    vec.push(Complex64::new(re, im));
                    pos += 2;
                }
            }
        }
    }

    let mut table = sink.new_mapping(sweep_value)?;
    let names = std::iter::once(metadata.scale_name.as_str())
        .chain(metadata.vector_names.iter().map(String::as_str));
    for (name, vector) in names.zip(vectors) {
        if let Err(e) = sink.insert(&mut table, name, vector) {
            warn!(vector = name, error = %e, "Failed to insert vector");
            return Err(e);
        }
    }
    if let Err(e) = sink.append_table(table) {
        warn!(error = %e, "Failed to append table");
        return Err(e);
    }

    debug!(rows = num_rows, sweep_value, "Table assembled");
    Ok(num_rows)
}
