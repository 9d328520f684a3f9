//! # sheetguard
//!
//! A resource-bounded spreadsheet codec for untrusted uploads.
//!
//! ## Features
//!
//! - **Bounded Decode**: File size, row and column ceilings are enforced before any row is read
//! - **Content Policy**: Every cell is trimmed, truncated, screened for script signatures and stripped of markup
//! - **Partial Results**: Bad cells and rows are reported individually while the rest of the sheet is kept
//! - **Chunked Processing**: Large sheets are processed in fixed windows with an optional reclaim hint
//! - **Streaming Write**: XLSX output is serialized row by row with shared strings and styled headers
//! - **Legacy Shape**: Sparse `{v, t}` cell maps with `!ref` ranges for older call sites
//!
//! ## Quick Start
//!
//! ### Decoding an upload
//!
//! ```rust,no_run
//! use sheetguard::{decode, CodecOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("upload.xlsx")?;
//! let result = decode(&bytes, &CodecOptions::from_env())?;
//!
//! for record in &result.data {
//!     println!("{:?}", record);
//! }
//! for error in &result.errors {
//!     eprintln!("row {}: {}", error.row, error.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Encoding records
//!
//! ```rust
//! use sheetguard::{encode, CodecOptions, RowRecord};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut record = RowRecord::new();
//! record.insert("name".to_string(), "Cable".to_string());
//! record.insert("qty".to_string(), "100".to_string());
//!
//! let bytes = encode(&[record], "Materials", &CodecOptions::default())?;
//! assert!(bytes.starts_with(b"PK"));
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod legacy;
pub mod limits;
pub mod reader;
pub mod sanitize;
pub mod types;
pub mod writer;

pub use address::{decode_cell, decode_range, encode_cell, encode_range, CellAddress, CellRange};
pub use config::CodecOptions;
pub use error::{CellError, CodecError, Result, RowError, SanitizeError};
pub use legacy::{
    legacy_read, legacy_sheet_to_json, legacy_write, LegacyCell, LegacyInput, LegacyReadOptions,
    LegacySheet, LegacyValue, LegacyWorkbook,
};
pub use reader::{decode, decode_file, validate, Decoder, ReclaimHint};
pub use types::{
    CellValue, DecodeError, DecodeMetadata, DecodeResult, RowRecord, ValidationMetadata,
    ValidationResult,
};
pub use writer::{encode, encode_to_file, WorkbookWriter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_imports() {
        // Test that all public types are accessible
        let _ = std::marker::PhantomData::<CodecError>;
        let _ = std::marker::PhantomData::<Decoder>;
        let _ = std::marker::PhantomData::<WorkbookWriter<std::io::Cursor<Vec<u8>>>>;
        let _ = std::marker::PhantomData::<LegacyWorkbook>;
    }

    #[test]
    fn test_encode_then_decode() {
        let records: Vec<RowRecord> = ["Cable", "Drum"]
            .iter()
            .map(|name| {
                let mut record = RowRecord::new();
                record.insert("name".to_string(), name.to_string());
                record
            })
            .collect();

        let options = CodecOptions::default();
        let bytes = encode(&records, "Data", &options).unwrap();
        let result = decode(&bytes, &options).unwrap();

        assert_eq!(result.data, records);
        assert!(result.errors.is_empty());
        assert!(validate(&bytes, &options).is_valid);
    }
}
