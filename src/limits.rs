//! Resource ceilings checked before and right after a workbook is opened

use crate::config::CodecOptions;
use crate::error::{CodecError, Result};

/// Reject input larger than `max_file_size`. Runs before any parsing.
pub fn check_file_size(byte_len: usize, options: &CodecOptions) -> Result<()> {
    if byte_len > options.max_file_size {
        return Err(CodecError::FileTooLarge {
            size: byte_len,
            limit: options.max_file_size,
        });
    }
    Ok(())
}

/// Reject worksheets whose reported shape exceeds the row/column ceilings.
/// Runs once dimensions are known and before any row is read.
pub fn check_dimensions(rows: u32, columns: u32, options: &CodecOptions) -> Result<()> {
    match dimension_violations(rows, columns, options).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Every shape ceiling the worksheet breaks, rows first
pub fn dimension_violations(rows: u32, columns: u32, options: &CodecOptions) -> Vec<CodecError> {
    let mut violations = Vec::new();
    if rows > options.max_rows {
        violations.push(CodecError::TooManyRows {
            rows,
            limit: options.max_rows,
        });
    }
    if columns > options.max_columns {
        violations.push(CodecError::TooManyColumns {
            columns,
            limit: options.max_columns,
        });
    }
    violations
}

/// Full check: size first, then shape when known
pub fn validate(
    byte_len: usize,
    rows: Option<u32>,
    columns: Option<u32>,
    options: &CodecOptions,
) -> Result<()> {
    check_file_size(byte_len, options)?;
    check_dimensions(rows.unwrap_or(0), columns.unwrap_or(0), options)
}
