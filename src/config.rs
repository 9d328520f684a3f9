//! Codec configuration: resource ceilings and behaviour switches

use serde::Deserialize;

/// Default maximum input size (50 MB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 50 * 1024 * 1024;
/// Default maximum worksheet rows
pub const DEFAULT_MAX_ROWS: u32 = 100_000;
/// Default maximum worksheet columns
pub const DEFAULT_MAX_COLUMNS: u32 = 1_000;
/// Default maximum characters per cell
pub const DEFAULT_MAX_CELL_LENGTH: usize = 10_000;
/// Default rows per processing chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1_000;

/// Options shared by decode, validate and encode
///
/// # Examples
///
/// ```
/// use sheetguard::CodecOptions;
///
/// let options = CodecOptions::default()
///     .with_max_rows(5_000)
///     .with_allow_formulas(true);
/// assert_eq!(options.max_rows, 5_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodecOptions {
    /// Maximum raw input size in bytes
    pub max_file_size: usize,
    /// Maximum worksheet row count (header row included)
    pub max_rows: u32,
    /// Maximum worksheet column count
    pub max_columns: u32,
    /// Maximum characters kept per cell; longer values are truncated
    pub max_cell_length: usize,
    /// Keep formula cells instead of rejecting them
    pub allow_formulas: bool,
    /// Keep `<tag>` markup instead of stripping it
    #[serde(rename = "allowHTML")]
    pub allow_html: bool,
    /// Rows per processing window
    pub chunk_size: usize,
    /// Process large sheets in `chunk_size` windows
    pub use_streaming: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_rows: DEFAULT_MAX_ROWS,
            max_columns: DEFAULT_MAX_COLUMNS,
            max_cell_length: DEFAULT_MAX_CELL_LENGTH,
            allow_formulas: false,
            allow_html: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            use_streaming: true,
        }
    }
}

impl CodecOptions {
    /// Defaults overlaid with `SHEETGUARD_*` environment variables
    ///
    /// Recognised: `SHEETGUARD_MAX_FILE_SIZE`, `SHEETGUARD_MAX_ROWS`,
    /// `SHEETGUARD_MAX_COLUMNS`, `SHEETGUARD_MAX_CELL_LENGTH`, `SHEETGUARD_CHUNK_SIZE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = CodecOptions::default();
        if let Some(v) = parse_var(&lookup, "SHEETGUARD_MAX_FILE_SIZE") {
            options.max_file_size = v;
        }
        if let Some(v) = parse_var(&lookup, "SHEETGUARD_MAX_ROWS") {
            options.max_rows = v;
        }
        if let Some(v) = parse_var(&lookup, "SHEETGUARD_MAX_COLUMNS") {
            options.max_columns = v;
        }
        if let Some(v) = parse_var(&lookup, "SHEETGUARD_MAX_CELL_LENGTH") {
            options.max_cell_length = v;
        }
        if let Some(v) = parse_var(&lookup, "SHEETGUARD_CHUNK_SIZE") {
            options.chunk_size = v;
        }
        options
    }

    pub fn with_max_file_size(mut self, bytes: usize) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_max_rows(mut self, rows: u32) -> Self {
        self.max_rows = rows;
        self
    }

    pub fn with_max_columns(mut self, columns: u32) -> Self {
        self.max_columns = columns;
        self
    }

    pub fn with_max_cell_length(mut self, chars: usize) -> Self {
        self.max_cell_length = chars;
        self
    }

    pub fn with_allow_formulas(mut self, allow: bool) -> Self {
        self.allow_formulas = allow;
        self
    }

    pub fn with_allow_html(mut self, allow: bool) -> Self {
        self.allow_html = allow;
        self
    }

    pub fn with_chunk_size(mut self, rows: usize) -> Self {
        self.chunk_size = rows;
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.use_streaming = enabled;
        self
    }

    /// Chunk size clamped to at least one row
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring {}: '{}' is not a valid number", key, raw);
            None
        }
    }
}
