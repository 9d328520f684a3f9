//! A1-style cell and range addressing
//!
//! Rows and columns are 0-based in code and 1-based in the rendered address:
//! `(0, 0)` is `A1`, `(9, 2)` is `C10`. Column letters are bijective base-26
//! (no zero digit), so 25 is `Z` and 26 is `AA`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::error::{CodecError, Result};

static CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]+)(\d+)$").expect("static cell address pattern")
});

/// Zero-based cell position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub fn new(row: u32, col: u32) -> Self {
        CellAddress { row, col }
    }

    /// Strict parse that rejects malformed input instead of aliasing it to `A1`
    pub fn parse(address: &str) -> Result<Self> {
        parse_cell(address).ok_or_else(|| CodecError::InvalidCell(address.to_string()))
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_cell(self.row, self.col))
    }
}

/// Rectangle between two cells, both inclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        CellRange { start, end }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_range(self.start, self.end))
    }
}

/// Column letters for a 0-based column index (0 -> A, 25 -> Z, 26 -> AA)
pub fn encode_column(col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = i64::from(col);
    while n >= 0 {
        letters.push(b'A' + (n % 26) as u8);
        n = n / 26 - 1;
    }
    letters.reverse();
    // only ASCII capitals were pushed
    String::from_utf8(letters).unwrap_or_default()
}

/// A1 address for a 0-based (row, col) pair
pub fn encode_cell(row: u32, col: u32) -> String {
    let mut out = encode_column(col);
    let mut buf = itoa::Buffer::new();
    out.push_str(buf.format(u64::from(row) + 1));
    out
}

/// Parse an A1 address, falling back to `A1` (0, 0) when it is malformed
///
/// The fallback is permissive: `"not a cell"`, `"a1"` and `"A0"` all decode to
/// `(0, 0)`. Use [`CellAddress::parse`] when malformed input must be rejected.
pub fn decode_cell(address: &str) -> CellAddress {
    parse_cell(address).unwrap_or_default()
}

fn parse_cell(address: &str) -> Option<CellAddress> {
    let caps = CELL_RE.captures(address)?;
    let letters = caps.get(1)?.as_str();
    let digits = caps.get(2)?.as_str();

    let mut col: u32 = 0;
    for b in letters.bytes() {
        col = col.checked_mul(26)?.checked_add(u32::from(b - b'A') + 1)?;
    }
    let row: u32 = digits.parse().ok()?;

    Some(CellAddress {
        row: row.checked_sub(1)?,
        col: col - 1,
    })
}

/// `"{start}:{end}"`
pub fn encode_range(start: CellAddress, end: CellAddress) -> String {
    format!(
        "{}:{}",
        encode_cell(start.row, start.col),
        encode_cell(end.row, end.col)
    )
}

/// Parse `"A1:C10"`; a single address yields a one-cell range
pub fn decode_range(range: &str) -> CellRange {
    let mut parts = range.split(':');
    let start = decode_cell(parts.next().unwrap_or_default());
    let end = parts.next().map(decode_cell).unwrap_or(start);
    CellRange { start, end }
}
