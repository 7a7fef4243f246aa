//! HSPICE header parsing
//!
//! The header is a run of text blocks ending with the block that contains
//! `$&%#`. Everything except the vector descriptor section sits at fixed
//! byte offsets, so fields are pulled out by index rather than tokenized.

use crate::block_reader::BlockReader;
use crate::types::*;
use std::borrow::Cow;
use std::io::Read;
use tracing::{debug, info, trace, warn};

/// Find subsequence in a byte slice
#[inline]
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn format_error(msg: impl Into<String>) -> WaveformError {
    let msg = msg.into();
    warn!("{}", msg);
    WaveformError::Format(msg)
}

// ============================================================================
// Header blocks
// ============================================================================

/// Reject empty and ASCII files before any block is parsed
pub(crate) fn check_binary<R: Read>(reader: &mut BlockReader<R>) -> Result<()> {
    match reader.peek_byte()? {
        None => {
            warn!("File is empty");
            Err(WaveformError::UnexpectedEof {
                context: "first block",
            })
        }
        Some(byte) if byte >= b' ' => Err(format_error(
            "file is in ASCII format, only binary supported",
        )),
        Some(_) => Ok(()),
    }
}

/// Read header blocks until the end marker shows up
///
/// The whole accumulated text is searched after every block, and the
/// block holding the marker is kept.
pub(crate) fn read_header_blocks<R: Read>(reader: &mut BlockReader<R>) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut num_blocks = 0usize;

    loop {
        let block = reader.read_block(1)?;
        num_blocks += 1;
        trace!(endian = ?block.endian, size = block.byte_count, "Header block");

        buffer.try_reserve(block.payload.len())?;
        buffer.extend_from_slice(&block.payload);

        if find_subsequence(&buffer, HEADER_END_MARKER).is_some() {
            break;
        }
    }

    debug!(
        blocks = num_blocks,
        bytes = buffer.len(),
        "Header blocks read"
    );
    Ok(buffer)
}

// ============================================================================
// Field extraction utilities
// ============================================================================

/// Bytes up to the first NUL
#[inline]
fn c_str(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

#[inline]
fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Leading-prefix integer parse: whitespace, optional sign, digits.
/// Anything unparsable yields 0.
pub(crate) fn atoi(bytes: &[u8]) -> i64 {
    let mut iter = c_str(bytes)
        .iter()
        .copied()
        .skip_while(|c| matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c))
        .peekable();

    let negative = match iter.peek() {
        Some(b'-') => {
            iter.next();
            true
        }
        Some(b'+') => {
            iter.next();
            false
        }
        _ => false,
    };

    let value = iter
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, c| {
            acc.saturating_mul(10).saturating_add(i64::from(c - b'0'))
        });

    if negative {
        -value
    } else {
        value
    }
}

/// Lowercase a vector name and drop a leading `v(`.
///
/// Only the two leading characters go; a trailing `)` is kept, so
/// `V(OUT)` becomes `out)`.
pub fn normalize_vector_name(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    match lower.strip_prefix("v(") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

fn is_token_delimiter(c: &u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n')
}

// ============================================================================
// Header parsing
// ============================================================================

fn detect_post_variant(buf: &[u8]) -> Result<PostVariant> {
    let post1 = &buf[POST_START_POSITION1..POST_START_POSITION1 + NUM_OF_POST_CHARACTERS];
    let post2 = &buf[POST_START_POSITION2..POST_START_POSITION2 + NUM_OF_POST_CHARACTERS];

    if post2 == POST_STRING21 {
        Ok(PostVariant::V2001)
    } else if post1 == POST_STRING11 {
        Ok(PostVariant::V9007)
    } else if post1 == POST_STRING12 {
        Ok(PostVariant::V9601)
    } else {
        Err(format_error(format!(
            "unknown post format {:?}/{:?}",
            String::from_utf8_lossy(post1),
            String::from_utf8_lossy(post2)
        )))
    }
}

fn extract_title(buf: &[u8]) -> String {
    let mut end = DATE_START_POSITION;
    while end > TITLE_START_POSITION && buf[end - 1] == b' ' {
        end -= 1;
    }
    lossy(c_str(&buf[TITLE_START_POSITION..end]))
}

fn extract_count(buf: &[u8], start: usize, end: usize, what: &str) -> Result<i64> {
    let value = atoi(&buf[start..end]);
    if value < 0 {
        return Err(format_error(format!("negative number of {}: {}", what, value)));
    }
    Ok(value)
}

/// Parse all header metadata from the accumulated header text
pub(crate) fn parse_header_metadata(
    header_buf: &[u8],
) -> Result<(FileMetadata, Option<SweepDescriptor>)> {
    if header_buf.len() < VECTOR_DESCRIPTION_START_POSITION {
        return Err(format_error(format!(
            "header too short: {} bytes",
            header_buf.len()
        )));
    }

    let post_variant = detect_post_variant(header_buf)?;

    let creation_date = lossy(c_str(&header_buf[DATE_START_POSITION..DATE_END_POSITION]));
    let title = extract_title(header_buf);

    let num_sweeps = atoi(&header_buf[NUM_OF_SWEEPS_POSITION..NUM_OF_SWEEPS_END_POSITION]);
    if !(0..=1).contains(&num_sweeps) {
        return Err(format_error(format!(
            "only one-dimensional sweep supported, file declares {}",
            num_sweeps
        )));
    }

    let num_variables = extract_count(
        header_buf,
        NUM_OF_VARIABLES_POSITION,
        NUM_OF_PROBES_POSITION,
        "variables",
    )?;
    let num_probes = extract_count(
        header_buf,
        NUM_OF_PROBES_POSITION,
        NUM_OF_SWEEPS_POSITION,
        "probes",
    )?;
    if num_variables < 1 {
        return Err(format_error("file declares no scale vector"));
    }
    let num_variables = num_variables as usize;
    let num_probes = num_probes as usize;
    let num_vectors = num_variables + num_probes;

    // Descriptor section runs from its fixed offset to the end marker.
    // A name glued to the marker (`temp$&%#`) comes out as `temp`.
    let section = c_str(&header_buf[VECTOR_DESCRIPTION_START_POSITION..]);
    let section = match find_subsequence(section, HEADER_END_MARKER) {
        Some(pos) => &section[..pos],
        None => section,
    };
    let mut tokens = section
        .split(is_token_delimiter)
        .filter(|t| !t.is_empty())
        .map(String::from_utf8_lossy);

    // One type code per vector; the scale's comes first and decides the kind
    let type_code = tokens
        .next()
        .map(|t| atoi(t.as_bytes()))
        .ok_or_else(|| format_error("failed to extract vector type"))?;
    let column_kind = if type_code == i64::from(FREQUENCY_TYPE) {
        ColumnKind::Complex
    } else {
        ColumnKind::Real
    };

    let scale_name = tokens
        .nth(num_vectors - 1)
        .map(Cow::into_owned)
        .ok_or_else(|| format_error("failed to extract independent variable name"))?;

    let vector_names = (1..num_vectors)
        .map(|_| tokens.next().map(|t| normalize_vector_name(&t)))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| format_error("failed to extract vector names"))?;

    let sweep = if num_sweeps == 1 {
        let name = tokens
            .next()
            .map(Cow::into_owned)
            .ok_or_else(|| format_error("failed to extract sweep name"))?;
        let position = if post_variant == PostVariant::V2001 {
            SWEEP_SIZE_POSITION2
        } else {
            SWEEP_SIZE_POSITION1
        };
        let point_count = atoi(&header_buf[position..]);
        if point_count < 0 {
            return Err(format_error(format!(
                "negative number of sweep points: {}",
                point_count
            )));
        }
        Some(SweepDescriptor::new(name, point_count as usize))
    } else {
        None
    };

    let metadata = FileMetadata {
        title,
        creation_date,
        post_variant,
        num_variables,
        num_probes,
        column_kind,
        scale_name,
        vector_names,
    };

    info!(
        post = ?metadata.post_variant,
        vectors = num_vectors,
        kind = ?metadata.column_kind,
        scale = %metadata.scale_name,
        sweep = sweep.as_ref().map(|s| s.name.as_str()),
        points = sweep.as_ref().map(|s| s.point_count),
        "Header parsed"
    );

    Ok((metadata, sweep))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ByteReader;

    struct HeaderBuilder {
        buf: Vec<u8>,
    }

    impl HeaderBuilder {
        fn new(vars: &str, probes: &str, sweeps: &str, post: &str) -> Self {
            let mut h = Self {
                buf: vec![b' '; VECTOR_DESCRIPTION_START_POSITION],
            };
            h.put(0, vars).put(4, probes).put(8, sweeps).put(16, post);
            h
        }

        fn put(&mut self, offset: usize, text: &str) -> &mut Self {
            self.buf[offset..offset + text.len()].copy_from_slice(text.as_bytes());
            self
        }

        fn finish(&mut self, descriptors: &str) -> Vec<u8> {
            let mut buf = self.buf.clone();
            buf.extend_from_slice(descriptors.as_bytes());
            buf.extend_from_slice(b"\n$&%#    ");
            buf
        }
    }

    #[test]
    fn test_parse_transient_header() {
        let buf = HeaderBuilder::new("0002", "0001", "0000", "9601")
            .put(24, "inverter test")
            .put(88, "10/19/2026 12:00:00     ")
            .finish("1 1 8 TIME V(OUT) I(R1)");

        let (meta, sweep) = parse_header_metadata(&buf).unwrap();
        assert!(sweep.is_none());
        assert_eq!(meta.post_variant, PostVariant::V9601);
        assert_eq!(meta.title, "inverter test");
        assert_eq!(meta.creation_date, "10/19/2026 12:00:00     ");
        assert_eq!(meta.num_variables, 2);
        assert_eq!(meta.num_probes, 1);
        assert_eq!(meta.column_kind, ColumnKind::Real);
        assert_eq!(meta.scale_name, "TIME");
        assert_eq!(meta.vector_names, vec!["out)", "i(r1)"]);
    }

    #[test]
    fn test_frequency_type_is_complex() {
        let buf = HeaderBuilder::new("0002", "0000", "0000", "9007")
            .finish("2 1 HERTZ v(out)");
        let (meta, _) = parse_header_metadata(&buf).unwrap();
        assert_eq!(meta.post_variant, PostVariant::V9007);
        assert_eq!(meta.column_kind, ColumnKind::Complex);
    }

    #[test]
    fn test_sweep_size_position_by_variant() {
        let buf = HeaderBuilder::new("0001", "0000", "0001", "9601")
            .put(176, "3")
            .put(187, "7")
            .finish("1 time temp");
        let (_, sweep) = parse_header_metadata(&buf).unwrap();
        let sweep = sweep.unwrap();
        assert_eq!(sweep.name, "temp");
        assert_eq!(sweep.point_count, 3);

        let buf = HeaderBuilder::new("0001", "0000", "0001", "    2001")
            .put(176, "3")
            .put(187, "7")
            .finish("1 time temp");
        let (meta, sweep) = parse_header_metadata(&buf).unwrap();
        assert_eq!(meta.post_variant, PostVariant::V2001);
        assert_eq!(sweep.unwrap().point_count, 7);
    }

    #[test]
    fn test_multidimensional_sweep_rejected() {
        let buf = HeaderBuilder::new("0001", "0000", "0002", "9601").finish("1 time a b");
        let err = parse_header_metadata(&buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_unknown_post_format() {
        let buf = HeaderBuilder::new("0001", "0000", "0000", "1234").finish("1 time");
        assert!(matches!(
            parse_header_metadata(&buf),
            Err(WaveformError::Format(_))
        ));
    }

    #[test]
    fn test_missing_tokens() {
        let buf = HeaderBuilder::new("0003", "0000", "0000", "9601").finish("1 1 1");
        match parse_header_metadata(&buf) {
            Err(WaveformError::Format(msg)) => assert!(msg.contains("independent variable")),
            other => panic!("unexpected result: {other:?}"),
        }

        let buf = HeaderBuilder::new("0003", "0000", "0000", "9601").finish("1 1 1 time v1");
        match parse_header_metadata(&buf) {
            Err(WaveformError::Format(msg)) => assert!(msg.contains("vector names")),
            other => panic!("unexpected result: {other:?}"),
        }

        let buf = HeaderBuilder::new("0001", "0000", "0001", "9601").finish("1 time");
        match parse_header_metadata(&buf) {
            Err(WaveformError::Format(msg)) => assert!(msg.contains("sweep name")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_sweep_name_glued_to_marker() {
        let mut buf = HeaderBuilder::new("0001", "0000", "0001", "9601")
            .put(176, "2")
            .buf
            .clone();
        buf.extend_from_slice(b"1 time temp$&%#");
        let (_, sweep) = parse_header_metadata(&buf).unwrap();
        assert_eq!(sweep.unwrap().name, "temp");
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(
            parse_header_metadata(b"0001"),
            Err(WaveformError::Format(_))
        ));
    }

    #[test]
    fn test_blank_title() {
        let buf = HeaderBuilder::new("0001", "0000", "0000", "9601").finish("1 time");
        let (meta, _) = parse_header_metadata(&buf).unwrap();
        assert_eq!(meta.title, "");
    }

    #[test]
    fn test_normalize_vector_name() {
        assert_eq!(normalize_vector_name("V(OUT)"), "out)");
        assert_eq!(normalize_vector_name("IN"), "in");
        assert_eq!(normalize_vector_name("i(r1)"), "i(r1)");
        assert_eq!(normalize_vector_name("xv(a)"), "xv(a)");
    }

    #[test]
    fn test_atoi() {
        assert_eq!(atoi(b"0004"), 4);
        assert_eq!(atoi(b"  12abc"), 12);
        assert_eq!(atoi(b"-3"), -3);
        assert_eq!(atoi(b"+8"), 8);
        assert_eq!(atoi(b"x1"), 0);
        assert_eq!(atoi(b"5\09"), 5);
        assert_eq!(atoi(b""), 0);
    }

    #[test]
    fn test_header_blocks_until_marker() {
        fn frame(payload: &[u8]) -> Vec<u8> {
            let mut out = Vec::new();
            for v in [4i32, 0, 4, payload.len() as i32] {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out.extend_from_slice(payload);
            out.extend_from_slice(&(payload.len() as i32).to_le_bytes());
            out
        }

        let mut data = frame(b"first part ");
        data.extend(frame(b"second $&"));
        data.extend(frame(b"%# tail"));
        data.extend(frame(b"not header"));

        let mut reader = BlockReader::new(ByteReader::new(&data[..]));
        check_binary(&mut reader).unwrap();
        let text = read_header_blocks(&mut reader).unwrap();
        assert_eq!(text, b"first part second $&%# tail");
        assert_eq!(reader.block_count(), 3);
    }

    #[test]
    fn test_check_binary() {
        let mut reader = BlockReader::new(ByteReader::new(&b"Title: x"[..]));
        assert_eq!(check_binary(&mut reader).unwrap_err().kind(), ErrorKind::Format);

        let mut reader = BlockReader::new(ByteReader::new(&b""[..]));
        assert_eq!(check_binary(&mut reader).unwrap_err().kind(), ErrorKind::Stream);
    }
}
