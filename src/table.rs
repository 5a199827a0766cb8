//! Headerless CSV tables for landmark tracks.
//!
//! Values are written in fixed scientific notation with 18 fractional
//! digits and a signed two-digit exponent (`2.500000000000000000e-01`), one
//! line per frame, so downstream tools can index columns positionally.

use crate::{track::DenseMatrix, Error, Result};
use log::info;
use ndarray::{Array2, ArrayView2};
use std::{fs::File, io, path::Path};

/// Format one value the way the track files are written
#[must_use]
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let formatted = format!("{value:.18e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        None => formatted,
    }
}

/// Write a table, one CSV line per row, no header
///
/// # Errors
///
/// Returns an error if writing fails
pub fn write_table<W: io::Write>(values: ArrayView2<'_, f64>, writer: W) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    for row in values.rows() {
        csv_writer.write_record(row.iter().map(|&v| format_value(v)))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Save a track matrix to `path`
///
/// # Errors
///
/// Returns an error if the file cannot be created or written
pub fn save_track<P: AsRef<Path>>(path: P, matrix: &DenseMatrix) -> Result<()> {
    let path = path.as_ref();
    write_table(matrix.values(), File::create(path)?)?;
    info!("Saved {} track rows to {}", matrix.rows(), path.display());
    Ok(())
}

/// Read a headerless numeric table
///
/// # Errors
///
/// Returns an error if a value is not numeric or rows differ in width
pub fn read_table<R: io::Read>(reader: R) -> Result<Array2<f64>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut width = None;
    let mut data = Vec::new();
    let mut rows = 0;
    for (line, record) in csv_reader.records().enumerate() {
        let record = record?;
        match width {
            None => width = Some(record.len()),
            Some(w) if w != record.len() => {
                return Err(Error::InvalidInput(format!(
                    "line {} has {} values, expected {w}",
                    line + 1,
                    record.len()
                )));
            }
            Some(_) => {}
        }
        for field in &record {
            let value: f64 = field
                .parse()
                .map_err(|_| Error::InvalidInput(format!("line {}: not a number: {field:?}", line + 1)))?;
            data.push(value);
        }
        rows += 1;
    }

    Array2::from_shape_vec((rows, width.unwrap_or(0)), data)
        .map_err(|e| Error::InvalidInput(format!("Failed to build table: {e}")))
}

/// Read a track file written by [`save_track`]
///
/// # Errors
///
/// Returns an error if the file cannot be opened or parsed
pub fn load_track<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    read_table(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_format_value_matches_fixed_scientific() {
        assert_eq!(format_value(0.0), "0.000000000000000000e+00");
        assert_eq!(format_value(1.0), "1.000000000000000000e+00");
        assert_eq!(format_value(0.25), "2.500000000000000000e-01");
        assert_eq!(format_value(0.15), "1.499999999999999944e-01");
        assert_eq!(format_value(-1234.5), "-1.234500000000000000e+03");
        assert_eq!(format_value(1e-100), "1.000000000000000000e-100");
        assert_eq!(format_value(f64::NAN), "nan");
        assert_eq!(format_value(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_write_table_no_header_one_line_per_row() {
        let values = array![[0.0, 0.5], [1.0, -2.0], [0.0, 0.0]];
        let mut out = Vec::new();
        write_table(values.view(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "0.000000000000000000e+00,5.000000000000000000e-01");
        assert!(lines.iter().all(|l| l.split(',').count() == 2));
    }

    #[test]
    fn test_written_values_parse_back_exactly() {
        let values = array![[0.123_456_789_012_345_6, 0.999_999_9, -0.5]];
        let mut out = Vec::new();
        write_table(values.view(), &mut out).unwrap();
        let parsed = read_table(out.as_slice()).unwrap();
        assert_eq!(parsed, values);
    }

    #[test]
    fn test_read_table_rejects_ragged_rows() {
        let text = "1,2,3\n4,5\n";
        assert!(read_table(text.as_bytes()).is_err());
    }

    #[test]
    fn test_read_table_rejects_text() {
        let text = "1,abc\n";
        assert!(matches!(read_table(text.as_bytes()), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_read_empty_table() {
        let parsed = read_table("".as_bytes()).unwrap();
        assert_eq!(parsed.nrows(), 0);
    }
}
