//! Compatibility layer for callers written against the sparse-cell workbook shape
//!
//! A sheet is a flat map from A1 addresses to `{v, t}` cells plus a reserved
//! `"!ref"` key holding the occupied range:
//!
//! ```json
//! {
//!   "SheetNames": ["Data"],
//!   "Sheets": {
//!     "Data": { "!ref": "A1:A2", "A1": { "v": "x", "t": "s" }, "A2": { "v": "1", "t": "s" } }
//!   }
//! }
//! ```
//!
//! Reads go through [`Decoder`] and writes through [`crate::writer::encode`];
//! this module only reshapes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::{self, CellAddress};
use crate::config::CodecOptions;
use crate::error::{CodecError, Result};
use crate::limits;
use crate::reader::Decoder;
use crate::types::{DecodeResult, RowRecord};
use crate::writer;

/// Rows above which [`legacy_write`] switches the encoder to chunked mode
pub const LEGACY_STREAMING_THRESHOLD: usize = 1_000;

/// Raw input accepted by [`legacy_read`]
#[derive(Debug, Clone, Copy)]
pub enum LegacyInput<'a> {
    Bytes(&'a [u8]),
    /// One byte per character; only the low 8 bits of each code point are kept
    BinaryString(&'a str),
}

impl LegacyInput<'_> {
    fn to_bytes(self) -> Vec<u8> {
        match self {
            LegacyInput::Bytes(bytes) => bytes.to_vec(),
            LegacyInput::BinaryString(s) => s.chars().map(|c| (c as u32 & 0xFF) as u8).collect(),
        }
    }
}

impl<'a> From<&'a [u8]> for LegacyInput<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        LegacyInput::Bytes(bytes)
    }
}

impl<'a> From<&'a str> for LegacyInput<'a> {
    fn from(s: &'a str) -> Self {
        LegacyInput::BinaryString(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LegacyReadOptions {
    /// Keep formula cells as `=expr`
    #[serde(rename = "cellFormula")]
    pub cell_formula: bool,
    /// Keep markup in text cells
    #[serde(rename = "cellHTML")]
    pub cell_html: bool,
}

impl LegacyReadOptions {
    fn codec_options(&self) -> CodecOptions {
        CodecOptions::default()
            .with_allow_formulas(self.cell_formula)
            .with_allow_html(self.cell_html)
            .with_streaming(false)
    }
}

/// Cell payload; the legacy shape allows strings, numbers and booleans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl fmt::Display for LegacyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegacyValue::Text(s) => f.write_str(s),
            LegacyValue::Number(n) => write!(f, "{}", n),
            LegacyValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyCell {
    pub v: LegacyValue,
    pub t: String,
}

impl LegacyCell {
    /// String-typed cell, the only type [`legacy_read`] produces
    pub fn text(value: impl Into<String>) -> Self {
        LegacyCell {
            v: LegacyValue::Text(value.into()),
            t: "s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacySheet {
    /// Occupied range, e.g. `A1:C10`
    #[serde(rename = "!ref", default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    /// Cells keyed by A1 address
    #[serde(flatten)]
    pub cells: IndexMap<String, LegacyCell>,
    /// Records this sheet was built from, when it came out of [`legacy_read`]
    #[serde(skip)]
    pub data: Option<Vec<RowRecord>>,
}

impl LegacySheet {
    pub fn cell(&self, row: u32, col: u32) -> Option<&LegacyCell> {
        self.cells.get(&address::encode_cell(row, col))
    }

    /// Bottom-right corner of the cells actually present
    fn last_occupied(&self) -> Option<CellAddress> {
        self.cells
            .keys()
            .filter_map(|key| CellAddress::parse(key).ok())
            .reduce(|a, b| CellAddress::new(a.row.max(b.row), a.col.max(b.col)))
    }

    fn from_decoded(result: &DecodeResult) -> Self {
        let mut cells = IndexMap::new();

        for (col, header) in result.headers.iter().enumerate() {
            cells.insert(address::encode_cell(0, col as u32), LegacyCell::text(header.as_str()));
        }
        for (idx, record) in result.data.iter().enumerate() {
            let row = idx as u32 + 1;
            for (col, header) in result.headers.iter().enumerate() {
                match record.get(header) {
                    Some(value) if !value.is_empty() => {
                        cells.insert(address::encode_cell(row, col as u32), LegacyCell::text(value.as_str()));
                    }
                    _ => {}
                }
            }
        }

        let last_col = result.headers.len().max(1) as u32 - 1;
        let range = address::encode_range(
            CellAddress::new(0, 0),
            CellAddress::new(result.data.len() as u32, last_col),
        );

        LegacySheet {
            range: Some(range),
            cells,
            data: Some(result.data.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyWorkbook {
    #[serde(rename = "SheetNames")]
    pub sheet_names: Vec<String>,
    #[serde(rename = "Sheets")]
    pub sheets: IndexMap<String, LegacySheet>,
}

/// Decode a workbook into the sparse-cell shape
///
/// Decoding is never chunked here. Recoverable cell and row failures are
/// logged and dropped because the legacy shape has nowhere to carry them.
pub fn legacy_read<'a>(input: impl Into<LegacyInput<'a>>, options: &LegacyReadOptions) -> Result<LegacyWorkbook> {
    let bytes = input.into().to_bytes();
    let result = Decoder::new(options.codec_options()).decode(&bytes)?;

    for error in &result.errors {
        log::warn!("Legacy read ignoring error at row {}: {}", error.row, error.message);
    }

    let name = result.metadata.worksheet_name.clone();
    let sheet = LegacySheet::from_decoded(&result);

    let mut sheets = IndexMap::new();
    sheets.insert(name.clone(), sheet);
    Ok(LegacyWorkbook {
        sheet_names: vec![name],
        sheets,
    })
}

/// Convert a sparse sheet into row records
///
/// Sheets produced by [`legacy_read`] return their records directly.
/// Otherwise the first row of `"!ref"` supplies the headers (`Column{N}`
/// when blank) and each later row becomes one record, missing cells as "".
/// The range is clipped to the last occupied cell and then held to the
/// row and column ceilings of `options`.
pub fn legacy_sheet_to_json(sheet: &LegacySheet, options: &CodecOptions) -> Result<Vec<RowRecord>> {
    if let Some(data) = &sheet.data {
        return Ok(data.clone());
    }
    let Some(reference) = sheet.range.as_deref() else {
        return Ok(Vec::new());
    };
    let Some(occupied) = sheet.last_occupied() else {
        return Ok(Vec::new());
    };

    let range = address::decode_range(reference);
    let start = range.start;
    let end = CellAddress::new(range.end.row.min(occupied.row), range.end.col.min(occupied.col));
    if end.row < start.row || end.col < start.col {
        return Ok(Vec::new());
    }
    limits::check_dimensions(end.row - start.row + 1, end.col - start.col + 1, options)?;

    let headers: Vec<String> = (start.col..=end.col)
        .map(|col| {
            sheet
                .cell(start.row, col)
                .map(|c| c.v.to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| format!("Column{}", col - start.col + 1))
        })
        .collect();

    Ok((start.row.saturating_add(1)..=end.row)
        .map(|row| {
            headers
                .iter()
                .zip(start.col..=end.col)
                .map(|(header, col)| {
                    let value = sheet.cell(row, col).map(|c| c.v.to_string()).unwrap_or_default();
                    (header.clone(), value)
                })
                .collect()
        })
        .collect())
}

/// Encode the first sheet of a legacy workbook
pub fn legacy_write(workbook: &LegacyWorkbook, options: &CodecOptions) -> Result<Vec<u8>> {
    let name = workbook.sheet_names.first().ok_or(CodecError::NoWorksheets)?;
    let sheet = workbook
        .sheets
        .get(name)
        .ok_or_else(|| CodecError::SheetNotFound {
            sheet: name.clone(),
            available: workbook.sheets.keys().cloned().collect::<Vec<_>>().join(", "),
        })?;

    let data = legacy_sheet_to_json(sheet, options)?;
    let options = options
        .clone()
        .with_streaming(data.len() > LEGACY_STREAMING_THRESHOLD);
    writer::encode(&data, name, &options)
}
