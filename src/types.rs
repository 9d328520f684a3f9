//! Type definitions for decoded and encoded spreadsheet data

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

use crate::address;

/// One data row keyed by header name, in header order
pub type RowRecord = IndexMap<String, String>;

/// Cell style presets emitted by the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellStyle {
    /// Default style - no formatting
    Default = 0,
    /// Bold text on a grey fill, used for header rows
    Header = 1,
}

impl CellStyle {
    /// Get the style index for XML
    pub fn index(&self) -> u32 {
        *self as u32
    }
}

/// Represents a single cell value in a worksheet
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Empty cell
    Empty,
    /// Text value
    Text(String),
    /// Numeric value (integers, floats and date serials alike)
    Number(f64),
    /// Boolean value
    Bool(bool),
    /// Formula expression without the leading `=`
    Formula(String),
    /// Spreadsheet error value such as `#REF!`
    Error(String),
}

impl CellValue {
    /// Convert cell value to its display string
    ///
    /// Formulas render as `=expr`; they are never evaluated.
    pub fn as_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Formula(f) => format!("={}", f),
            CellValue::Error(e) => e.clone(),
        }
    }

    /// Check if cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if cell holds a formula
    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula(_))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Number(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// A cell positioned within its row
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Column index (0-based)
    pub col: u32,
    /// Cell value
    pub value: CellValue,
}

impl Cell {
    pub fn new(col: u32, value: CellValue) -> Self {
        Cell { col, value }
    }

    /// A1-style reference of this cell within the given 1-based row
    pub fn reference(&self, row_number: u32) -> String {
        address::encode_cell(row_number.saturating_sub(1), self.col)
    }
}

/// Represents a row of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Row number (1-based; row 1 is the header row)
    pub index: u32,
    /// Non-empty cells in column order
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(index: u32, cells: Vec<Cell>) -> Self {
        Row { index, cells }
    }

    /// Check if row is empty
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|c| c.value.is_empty())
    }
}

/// A recoverable failure attached to one cell or one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeError {
    /// Row number (1-based)
    pub row: u32,
    /// Column letter, absent for whole-row failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub message: String,
}

/// Metadata describing a decode run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeMetadata {
    /// Worksheet rows, header included, regardless of how many rows were kept
    pub total_rows: u32,
    /// Worksheet columns
    pub total_columns: u32,
    pub worksheet_name: String,
    pub processing_time_ms: u64,
    /// Estimated bytes retained by the result payload
    pub memory_bytes_used: usize,
}

/// Output of a decode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeResult {
    pub data: Vec<RowRecord>,
    pub errors: Vec<DecodeError>,
    /// Effective (non-empty) header names in column order
    pub headers: Vec<String>,
    pub metadata: DecodeMetadata,
}

/// Metadata gathered by a validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMetadata {
    pub worksheet_count: usize,
    pub row_count: u32,
    pub column_count: u32,
    pub worksheet_name: Option<String>,
}

/// Output of a validation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub metadata: ValidationMetadata,
}
