//! SPICE3 Binary Raw File Writer

use crate::types::{AnalysisType, Document, Result, Table, VectorData, WaveformError};
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, instrument};

fn plot_name(analysis: AnalysisType) -> &'static str {
    match analysis {
        AnalysisType::Transient => "Transient Analysis",
        AnalysisType::AC => "AC Analysis",
        AnalysisType::DC => "DC transfer characteristic",
        AnalysisType::Unknown => "Analysis",
    }
}

/// SPICE3 variable type column
fn vector_type(index: usize, name: &str, analysis: AnalysisType) -> &'static str {
    if index == 0 {
        return match analysis {
            AnalysisType::Transient => "time",
            AnalysisType::AC => "frequency",
            _ => "voltage",
        };
    }
    if name.starts_with("i(") {
        "current"
    } else {
        "voltage"
    }
}

/// Write SPICE3 binary raw file header
fn write_raw_header<W: Write>(
    writer: &mut W,
    document: &Document,
    table: &Table,
    analysis: AnalysisType,
    is_complex: bool,
) -> Result<()> {
    writeln!(writer, "Title: {}", document.metadata.title)?;
    writeln!(writer, "Date: {}", document.metadata.creation_date.trim())?;
    writeln!(writer, "Plotname: {}", plot_name(analysis))?;
    writeln!(
        writer,
        "Flags: {}",
        if is_complex { "complex" } else { "real" }
    )?;
    writeln!(writer, "No. Variables: {}", table.num_columns())?;
    writeln!(writer, "No. Points: {}", table.len())?;
    writeln!(writer, "Variables:")?;

    for (i, name) in table.names().enumerate() {
        writeln!(writer, "\t{}\t{}\t{}", i, name, vector_type(i, name, analysis))?;
    }

    writeln!(writer, "Binary:")?;
    Ok(())
}

/// Write SPICE3 binary data section, point-major
///
/// In a complex file every value is a re/im pair, real vectors included.
fn write_raw_data<W: Write>(writer: &mut W, table: &Table, is_complex: bool) -> Result<()> {
    for i in 0..table.len() {
        for (_, vector) in table.iter() {
            let (re, im) = match vector {
                VectorData::Real(data) => (data.get(i).copied().unwrap_or(0.0), 0.0),
                VectorData::Complex(data) => {
                    let c = data.get(i).copied().unwrap_or_default();
                    (c.re, c.im)
                }
            };
            writer.write_f64::<LittleEndian>(re)?;
            if is_complex {
                writer.write_f64::<LittleEndian>(im)?;
            }
        }
    }
    Ok(())
}

/// Write the first table of a decoded document as a SPICE3 binary raw file
#[instrument(skip_all, fields(output = %output_path.as_ref().display()))]
pub fn write_spice3_raw<P: AsRef<Path>>(document: &Document, output_path: P) -> Result<()> {
    write_spice3_raw_as(document, document.analysis(), output_path.as_ref())
}

fn write_spice3_raw_as(
    document: &Document,
    analysis: AnalysisType,
    output_path: &Path,
) -> Result<()> {
    info!("Writing SPICE3 raw file");

    let table = document
        .tables
        .first()
        .ok_or_else(|| WaveformError::Format("no data tables to write".into()))?;
    let is_complex = table.iter().any(|(_, v)| v.is_complex());

    debug!(
        points = table.len(),
        variables = table.num_columns(),
        complex = is_complex,
        "Data info"
    );

    let file = File::create(output_path)?;
    let mut writer = BufWriter::new(file);

    write_raw_header(&mut writer, document, table, analysis, is_complex)?;
    write_raw_data(&mut writer, table, is_complex)?;
    writer.flush()?;

    let bytes_written = std::fs::metadata(output_path)?.len();
    info!(bytes = bytes_written, "Write complete");
    Ok(())
}

/// Convert an HSPICE binary file to SPICE3 binary raw format
#[instrument(skip_all, fields(input = %input_path.as_ref().display()))]
pub fn hspice_to_raw_impl<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
) -> Result<()> {
    let input_path = input_path.as_ref();
    let document = crate::read(input_path)?;

    let analysis = match document.analysis() {
        AnalysisType::Unknown => input_path
            .extension()
            .and_then(|e| e.to_str())
            .map(AnalysisType::from_extension)
            .unwrap_or(AnalysisType::Unknown),
        known => known,
    };

    write_spice3_raw_as(&document, analysis, output_path.as_ref())?;
    info!("Conversion complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnKind, FileMetadata, PostVariant};
    use num_complex::Complex64;

    fn document(table: Table, kind: ColumnKind) -> Document {
        Document {
            metadata: FileMetadata {
                title: "rc".into(),
                creation_date: "10/19/2026      ".into(),
                post_variant: PostVariant::V9601,
                num_variables: 2,
                num_probes: 0,
                column_kind: kind,
                scale_name: "TIME".into(),
                vector_names: vec!["out)".into()],
            },
            sweep: None,
            tables: vec![table],
        }
    }

    #[test]
    fn test_write_real() {
        let mut table = Table::new(None);
        table.insert("TIME", VectorData::Real(vec![0.0, 1.0e-9]));
        table.insert("out)", VectorData::Real(vec![0.5, 0.75]));
        let output = std::env::temp_dir().join("hspice_read_writer_real.raw");

        write_spice3_raw(&document(table, ColumnKind::Real), &output).unwrap();

        let content = std::fs::read(&output).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.starts_with("Title: rc\nDate: 10/19/2026\n"));
        assert!(text.contains("Plotname: Transient Analysis"));
        assert!(text.contains("Flags: real"));
        assert!(text.contains("\t0\tTIME\ttime\n\t1\tout)\tvoltage\n"));

        let marker = b"Binary:\n";
        let start = content
            .windows(marker.len())
            .position(|w| w == marker)
            .unwrap()
            + marker.len();
        assert_eq!(content.len() - start, 2 * 2 * 8);
        assert_eq!(&content[start + 8..start + 16], &0.5f64.to_le_bytes());

        let _ = std::fs::remove_file(&output);
    }

    #[test]
    fn test_write_complex_pads_real_vectors() {
        let mut table = Table::new(None);
        table.insert("HERTZ", VectorData::Real(vec![1.0e3]));
        table.insert("out)", VectorData::Complex(vec![Complex64::new(0.5, -0.5)]));
        let output = std::env::temp_dir().join("hspice_read_writer_complex.raw");

        write_spice3_raw(&document(table, ColumnKind::Complex), &output).unwrap();

        let content = std::fs::read(&output).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("Flags: complex"));
        assert!(text.contains("\t0\tHERTZ\tfrequency\n"));
        let start = content.len() - 32;
        assert_eq!(&content[start..start + 8], &1.0e3f64.to_le_bytes());
        assert_eq!(&content[start + 8..start + 16], &0.0f64.to_le_bytes());
        assert_eq!(&content[start + 24..], &(-0.5f64).to_le_bytes());

        let _ = std::fs::remove_file(&output);
    }

    #[test]
    fn test_write_without_tables() {
        let mut doc = document(Table::new(None), ColumnKind::Real);
        doc.tables.clear();
        let output = std::env::temp_dir().join("hspice_read_writer_empty.raw");
        assert!(write_spice3_raw(&doc, &output).is_err());
    }
}
