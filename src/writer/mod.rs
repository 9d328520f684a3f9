//! Row-record encoder
//!
//! The first record defines the schema: its keys, in order, become the header
//! row and every later record is projected onto them. Missing keys write as
//! empty cells, extra keys are ignored. Every header and value goes through
//! the same sanitizer the decoder uses.

pub mod shared_strings;
pub mod workbook;
pub mod xml_writer;

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use crate::address;
use crate::config::CodecOptions;
use crate::error::{CodecError, Result};
use crate::sanitize::sanitize;
use crate::types::{CellStyle, CellValue, RowRecord};

pub use workbook::WorkbookWriter;

/// Records sampled when sizing columns
pub const WIDTH_SAMPLE_ROWS: usize = 100;
/// Narrowest column width written
pub const MIN_COLUMN_WIDTH: f64 = 10.0;
/// Widest column width written
pub const MAX_COLUMN_WIDTH: f64 = 50.0;

const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Encode records into an in-memory XLSX file
///
/// # Examples
///
/// ```
/// use sheetguard::{encode, CodecOptions, RowRecord};
///
/// let mut record = RowRecord::new();
/// record.insert("name".to_string(), "Cable".to_string());
/// let bytes = encode(&[record], "Data", &CodecOptions::default())?;
/// assert!(bytes.starts_with(b"PK"));
/// # Ok::<(), sheetguard::CodecError>(())
/// ```
pub fn encode(records: &[RowRecord], worksheet_name: &str, options: &CodecOptions) -> Result<Vec<u8>> {
    let sink = encode_into(records, worksheet_name, options, Cursor::new(Vec::new()))?;
    Ok(sink.into_inner())
}

/// Encode records straight into a file on disk
pub fn encode_to_file<P: AsRef<Path>>(
    records: &[RowRecord],
    worksheet_name: &str,
    path: P,
    options: &CodecOptions,
) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::with_capacity(64 * 1024, file);
    let mut writer = encode_into(records, worksheet_name, options, writer)?;
    writer.flush()?;
    Ok(())
}

/// Encode records into any seekable sink and hand the sink back
pub fn encode_into<W: Write + Seek>(
    records: &[RowRecord],
    worksheet_name: &str,
    options: &CodecOptions,
    sink: W,
) -> Result<W> {
    let first = records.first().ok_or(CodecError::EmptyInput)?;
    validate_sheet_name(worksheet_name)?;

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let widths = column_widths(&headers, records);

    let mut workbook = WorkbookWriter::new(sink)?;
    workbook.add_worksheet(worksheet_name)?;
    workbook.set_column_widths(&widths)?;

    let header_cells = headers
        .iter()
        .enumerate()
        .map(|(col, h)| sanitize_for_write(h, 1, col, options))
        .collect::<Result<Vec<_>>>()?;
    workbook.write_row_styled(&header_cells, CellStyle::Header)?;

    let chunk_size = if options.use_streaming {
        options.effective_chunk_size()
    } else {
        records.len()
    };

    for (chunk_idx, chunk) in records.chunks(chunk_size).enumerate() {
        let base = chunk_idx * chunk_size;
        for (offset, record) in chunk.iter().enumerate() {
            // sheet row: header is row 1, first record is row 2
            let sheet_row = (base + offset + 2) as u32;
            let cells = headers
                .iter()
                .enumerate()
                .map(|(col, h)| {
                    let raw = record.get(*h).map(String::as_str).unwrap_or("");
                    sanitize_for_write(raw, sheet_row, col, options)
                })
                .collect::<Result<Vec<_>>>()?;
            workbook.write_row(&cells)?;
        }
        workbook.flush_rows()?;
        log::debug!(
            "Encoded chunk {} ({} rows, {} total)",
            chunk_idx + 1,
            chunk.len(),
            base + chunk.len()
        );
    }

    log::debug!(
        "Encoded worksheet '{}': {} rows x {} columns",
        worksheet_name,
        records.len(),
        headers.len()
    );
    workbook.close()
}

fn sanitize_for_write(raw: &str, row: u32, col: usize, options: &CodecOptions) -> Result<CellValue> {
    let value = sanitize(raw, options.max_cell_length, options.allow_html).map_err(|source| {
        CodecError::UnsafeCell {
            row,
            column: address::encode_column(col as u32),
            source,
        }
    })?;
    Ok(if value.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(value)
    })
}

/// Width per column: longest of the header and the first
/// [`WIDTH_SAMPLE_ROWS`] values, plus two, clamped to 10..=50
pub fn column_widths(headers: &[&str], records: &[RowRecord]) -> Vec<f64> {
    headers
        .iter()
        .map(|h| {
            let longest = records
                .iter()
                .take(WIDTH_SAMPLE_ROWS)
                .filter_map(|r| r.get(*h))
                .map(|v| v.chars().count())
                .fold(h.chars().count(), usize::max);
            ((longest + 2) as f64).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

fn validate_sheet_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0 || len > 31 || name.contains(&FORBIDDEN_SHEET_CHARS[..]) {
        return Err(CodecError::InvalidSheetName(name.to_string()));
    }
    Ok(())
}
