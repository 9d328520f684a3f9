//! Error types for the sheetguard codec

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Fatal errors. Any of these aborts the whole decode/encode call and no
/// partial result is produced.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Raw input is larger than `max_file_size`
    #[error("File size {size} bytes exceeds maximum allowed size of {limit} bytes")]
    FileTooLarge { size: usize, limit: usize },

    /// Worksheet reports more rows than `max_rows`
    #[error("Worksheet has {rows} rows, exceeding the maximum of {limit} rows")]
    TooManyRows { rows: u32, limit: u32 },

    /// Worksheet reports more columns than `max_columns`
    #[error("Worksheet has {columns} columns, exceeding the maximum of {limit} columns")]
    TooManyColumns { columns: u32, limit: u32 },

    /// Workbook contains no worksheets at all
    #[error("Workbook contains no worksheets")]
    NoWorksheets,

    /// First worksheet has no cells
    #[error("Worksheet '{sheet}' is empty")]
    EmptyWorksheet { sheet: String },

    /// Encode was called with zero records
    #[error("No data to write: record list is empty")]
    EmptyInput,

    /// Worksheet name violates spreadsheet naming rules
    #[error("Invalid worksheet name '{0}': must be 1-31 characters without []:*?/\\")]
    InvalidSheetName(String),

    /// Named sheet is missing from a legacy workbook
    #[error("Sheet '{sheet}' not found. Available sheets: {available}")]
    SheetNotFound { sheet: String, available: String },

    /// A value rejected by the sanitizer while encoding
    #[error("Refusing to write cell {column}{row}: {source}")]
    UnsafeCell {
        row: u32,
        column: String,
        #[source]
        source: SanitizeError,
    },

    /// Malformed A1-style cell reference
    #[error("Invalid cell reference: {0}")]
    InvalidCell(String),

    /// Error occurred while opening or reading a workbook
    #[error("Failed to read workbook: {0}")]
    ReadError(String),

    /// Error occurred while producing a workbook
    #[error("Failed to write workbook: {0}")]
    WriteError(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<calamine::Error> for CodecError {
    fn from(err: calamine::Error) -> Self {
        CodecError::ReadError(err.to_string())
    }
}

impl From<zip::result::ZipError> for CodecError {
    fn from(err: zip::result::ZipError) -> Self {
        CodecError::WriteError(err.to_string())
    }
}

/// Rejection of a single value by the content sanitizer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    /// Value contains a blocked signature such as `javascript:` or `<script`
    #[error("Potentially dangerous content detected: {pattern}")]
    DangerousPattern { pattern: &'static str },
}

/// Per-cell failure while decoding. The field is left empty and decoding
/// continues with the next cell.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("Formulas are not allowed")]
    FormulaNotAllowed,

    #[error(transparent)]
    Unsafe(#[from] SanitizeError),
}

/// Per-row failure while decoding. The whole row is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// A headed cell holds a spreadsheet error value such as `#REF!`
    #[error("Cell {address} contains error value {value}")]
    ErrorValue { address: String, value: String },
}
