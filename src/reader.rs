//! Bounded workbook decoding
//!
//! Only the first worksheet is read. Row 1 supplies the header names; every
//! later row becomes a [`RowRecord`] keyed by those names. Cell and row
//! failures are collected as [`DecodeError`]s and never abort the decode;
//! resource ceilings, unreadable input and missing/empty worksheets do.
//!
//! XLSX and XLSB sheets are streamed cell by cell, so the row and column
//! ceilings are enforced against the declared `<dimension>` and again on
//! every cell before it is kept. Chunked decodes hold one window of rows at
//! a time. XLS and ODS have no cell streamer and are read as a whole range.

use calamine::{open_workbook_auto_from_rs, Data, DataRef, Reader, Sheets, XlsxError};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::address;
use crate::config::CodecOptions;
use crate::error::{CellError, CodecError, Result, RowError};
use crate::limits;
use crate::sanitize::sanitize_value;
use crate::types::{
    Cell, CellValue, DecodeError, DecodeMetadata, DecodeResult, Row, RowRecord,
    ValidationMetadata, ValidationResult,
};

/// Advisory callback invoked between chunks so the host can reclaim memory
pub type ReclaimHint = Arc<dyn Fn() + Send + Sync>;

#[cfg(test)]
type WindowObserver = Arc<dyn Fn(&[Row]) + Send + Sync>;

/// Decoder with its options and an optional reclaim hint
///
/// # Examples
///
/// ```no_run
/// use sheetguard::{CodecOptions, Decoder};
///
/// let bytes = std::fs::read("poles.xlsx")?;
/// let result = Decoder::new(CodecOptions::default())
///     .with_reclaim_hint(|| log::debug!("chunk boundary"))
///     .decode(&bytes)?;
/// for error in &result.errors {
///     println!("row {}: {}", error.row, error.message);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct Decoder {
    options: CodecOptions,
    reclaim_hint: Option<ReclaimHint>,
    #[cfg(test)]
    window_observer: Option<WindowObserver>,
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("options", &self.options)
            .field("reclaim_hint", &self.reclaim_hint.is_some())
            .finish()
    }
}

impl Decoder {
    pub fn new(options: CodecOptions) -> Self {
        Decoder {
            options,
            reclaim_hint: None,
            #[cfg(test)]
            window_observer: None,
        }
    }

    /// Call `hint` every `chunk_size * 5` rows while decoding in chunks
    pub fn with_reclaim_hint<F>(mut self, hint: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.reclaim_hint = Some(Arc::new(hint));
        self
    }

    /// Sees the data rows of every window as it is folded
    #[cfg(test)]
    fn with_window_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&[Row]) + Send + Sync + 'static,
    {
        self.window_observer = Some(Arc::new(observer));
        self
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Decode the first worksheet of `bytes` into row records
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodeResult> {
        let started = Instant::now();
        let options = &self.options;

        limits::check_file_size(bytes.len(), options)?;

        let mut sheet = FirstSheet::open(bytes)?;
        if let Some((rows, columns)) = sheet.declared_shape()? {
            limits::check_dimensions(rows, columns, options)?;
        }

        // Formulas override values at the same position and stay resident for
        // the whole decode; values are only measured on this pass.
        let mut shape = SheetShape::default();
        let mut formulas = BTreeMap::new();
        sheet.for_each_formula(&mut |pos, formula| {
            shape.include(pos);
            limits::check_dimensions(shape.rows, shape.columns, options)?;
            formulas.insert(pos, formula);
            Ok(())
        })?;

        let mut in_row_order = true;
        let mut last_row = 0;
        sheet.for_each_value(&mut |pos, _| {
            shape.include(pos);
            in_row_order &= pos.0 >= last_row;
            last_row = pos.0;
            limits::check_dimensions(shape.rows, shape.columns, options)
        })?;

        if shape.rows == 0 {
            return Err(CodecError::EmptyWorksheet { sheet: sheet.name });
        }
        limits::check_dimensions(shape.rows, shape.columns, options)?;

        let chunk_size = options.effective_chunk_size();
        let chunked = options.use_streaming && shape.rows as usize > chunk_size;
        let window = if chunked && in_row_order {
            u32::try_from(chunk_size).unwrap_or(u32::MAX)
        } else {
            if chunked {
                log::warn!(
                    "Worksheet '{}' stores rows out of order; decoding it in a single window",
                    sheet.name
                );
            }
            shape.rows
        };

        let mut fold = WindowFold {
            windows: RowWindows::new(formulas, window),
            shape,
            options,
            chunked,
            reclaim_every: u64::from(window).saturating_mul(5),
            reclaim_hint: self.reclaim_hint.as_ref(),
            #[cfg(test)]
            observer: self.window_observer.as_ref(),
            processed: 0,
            headers: None,
            data: Vec::new(),
            errors: Vec::new(),
        };
        sheet.for_each_value(&mut |pos, value| {
            fold.push(pos, value);
            Ok(())
        })?;
        let (headers, data, errors) = fold.finish();

        let effective_headers: Vec<String> = headers.template.keys().cloned().collect();
        let memory_bytes_used = estimate_result_size(&data, &errors, &effective_headers);
        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        log::debug!(
            "Decoded worksheet '{}': {} rows kept of {}, {} errors, {} ms",
            sheet.name,
            data.len(),
            shape.rows.saturating_sub(1),
            errors.len(),
            processing_time_ms
        );

        Ok(DecodeResult {
            data,
            errors,
            headers: effective_headers,
            metadata: DecodeMetadata {
                total_rows: shape.rows,
                total_columns: shape.columns,
                worksheet_name: sheet.name,
                processing_time_ms,
                memory_bytes_used,
            },
        })
    }
}

/// Decode with default settings for everything but `options`
pub fn decode(bytes: &[u8], options: &CodecOptions) -> Result<DecodeResult> {
    Decoder::new(options.clone()).decode(bytes)
}

/// Decode a file, checking its size on disk before reading it
pub fn decode_file<P: AsRef<Path>>(path: P, options: &CodecOptions) -> Result<DecodeResult> {
    let path = path.as_ref();
    let len = std::fs::metadata(path)?.len();
    limits::check_file_size(usize::try_from(len).unwrap_or(usize::MAX), options)?;
    let bytes = std::fs::read(path)?;
    decode(&bytes, options)
}

/// Check limits and worksheet shape without building any records
pub fn validate(bytes: &[u8], options: &CodecOptions) -> ValidationResult {
    let mut errors = Vec::new();
    let mut metadata = ValidationMetadata::default();

    if let Err(err) = inspect(bytes, options, &mut errors, &mut metadata) {
        errors.push(err.to_string());
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
        metadata,
    }
}

/// Fills `metadata` and pushes every shape violation; fatal read failures
/// come back as the error
fn inspect(
    bytes: &[u8],
    options: &CodecOptions,
    violations: &mut Vec<String>,
    metadata: &mut ValidationMetadata,
) -> Result<()> {
    limits::check_file_size(bytes.len(), options)?;

    let mut sheet = FirstSheet::open(bytes)?;
    metadata.worksheet_count = sheet.sheet_count;
    metadata.worksheet_name = Some(sheet.name.clone());

    if let Some((rows, columns)) = sheet.declared_shape()? {
        let declared = limits::dimension_violations(rows, columns, options);
        if !declared.is_empty() {
            metadata.row_count = rows;
            metadata.column_count = columns;
            violations.extend(declared.iter().map(ToString::to_string));
            return Ok(());
        }
    }

    let mut shape = SheetShape::default();
    sheet.for_each_formula(&mut |pos, _| {
        shape.include(pos);
        Ok(())
    })?;
    sheet.for_each_value(&mut |pos, _| {
        shape.include(pos);
        Ok(())
    })?;

    metadata.row_count = shape.rows;
    metadata.column_count = shape.columns;
    if shape.rows == 0 {
        violations.push(CodecError::EmptyWorksheet { sheet: sheet.name }.to_string());
    }
    violations.extend(
        limits::dimension_violations(shape.rows, shape.columns, options)
            .iter()
            .map(ToString::to_string),
    );
    Ok(())
}

/// Extent from A1 through the last occupied value or formula cell
#[derive(Debug, Clone, Copy, Default)]
struct SheetShape {
    rows: u32,
    columns: u32,
}

impl SheetShape {
    fn include(&mut self, (row, col): (u32, u32)) {
        self.rows = self.rows.max(row.saturating_add(1));
        self.columns = self.columns.max(col.saturating_add(1));
    }
}

type Visit<'v, T> = dyn FnMut((u32, u32), T) -> Result<()> + 'v;

/// First worksheet of an opened workbook
struct FirstSheet<'b> {
    workbook: Sheets<Cursor<&'b [u8]>>,
    name: String,
    sheet_count: usize,
}

impl<'b> FirstSheet<'b> {
    fn open(bytes: &'b [u8]) -> Result<Self> {
        let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        let sheet_names = workbook.sheet_names();
        let name = sheet_names.first().cloned().ok_or(CodecError::NoWorksheets)?;
        Ok(FirstSheet {
            sheet_count: sheet_names.len(),
            workbook,
            name,
        })
    }

    /// Rows and columns the sheet header claims, read before any cell
    fn declared_shape(&mut self) -> Result<Option<(u32, u32)>> {
        let dimensions = match &mut self.workbook {
            Sheets::Xlsx(xlsx) => match xlsx.worksheet_cells_reader(&self.name) {
                Ok(cells) => cells.dimensions(),
                Err(XlsxError::NotAWorksheet(_)) => return Ok(None),
                Err(e) => return Err(calamine::Error::Xlsx(e).into()),
            },
            Sheets::Xlsb(xlsb) => xlsb
                .worksheet_cells_reader(&self.name)
                .map_err(calamine::Error::Xlsb)?
                .dimensions(),
            _ => return Ok(None),
        };
        let (last_row, last_col) = dimensions.end;
        Ok(Some((last_row.saturating_add(1), last_col.saturating_add(1))))
    }

    /// Visit every non-empty value in storage order
    fn for_each_value(&mut self, visit: &mut Visit<'_, CellValue>) -> Result<()> {
        match &mut self.workbook {
            Sheets::Xlsx(xlsx) => {
                let mut cells = match xlsx.worksheet_cells_reader(&self.name) {
                    Ok(cells) => cells,
                    Err(XlsxError::NotAWorksheet(_)) => return Ok(()),
                    Err(e) => return Err(calamine::Error::Xlsx(e).into()),
                };
                while let Some(cell) = cells.next_cell().map_err(calamine::Error::Xlsx)? {
                    let value = dataref_to_cellvalue(cell.get_value());
                    if !value.is_empty() {
                        visit(cell.get_position(), value)?;
                    }
                }
            }
            Sheets::Xlsb(xlsb) => {
                let mut cells = xlsb
                    .worksheet_cells_reader(&self.name)
                    .map_err(calamine::Error::Xlsb)?;
                while let Some(cell) = cells.next_cell().map_err(calamine::Error::Xlsb)? {
                    let value = dataref_to_cellvalue(cell.get_value());
                    if !value.is_empty() {
                        visit(cell.get_position(), value)?;
                    }
                }
            }
            workbook => {
                let range = workbook.worksheet_range(&self.name)?;
                let (first_row, first_col) = range.start().unwrap_or_default();
                for (row, col, data) in range.used_cells() {
                    let pos = (first_row + row as u32, first_col + col as u32);
                    visit(pos, datatype_to_cellvalue(data))?;
                }
            }
        }
        Ok(())
    }

    /// Visit every formula cell in storage order
    fn for_each_formula(&mut self, visit: &mut Visit<'_, String>) -> Result<()> {
        match &mut self.workbook {
            Sheets::Xlsx(xlsx) => {
                let mut cells = match xlsx.worksheet_cells_reader(&self.name) {
                    Ok(cells) => cells,
                    Err(XlsxError::NotAWorksheet(_)) => return Ok(()),
                    Err(e) => return Err(calamine::Error::Xlsx(e).into()),
                };
                while let Some(cell) = cells.next_formula().map_err(calamine::Error::Xlsx)? {
                    if !cell.get_value().is_empty() {
                        visit(cell.get_position(), cell.get_value().clone())?;
                    }
                }
            }
            Sheets::Xlsb(xlsb) => {
                let mut cells = xlsb
                    .worksheet_cells_reader(&self.name)
                    .map_err(calamine::Error::Xlsb)?;
                while let Some(cell) = cells.next_formula().map_err(calamine::Error::Xlsb)? {
                    if !cell.get_value().is_empty() {
                        visit(cell.get_position(), cell.get_value().clone())?;
                    }
                }
            }
            workbook => {
                let range = workbook.worksheet_formula(&self.name)?;
                let (first_row, first_col) = range.start().unwrap_or_default();
                for (row, col, formula) in range.used_cells() {
                    let pos = (first_row + row as u32, first_col + col as u32);
                    visit(pos, formula.clone())?;
                }
            }
        }
        Ok(())
    }
}

/// Buffers streamed cells and hands them out one row window at a time
///
/// The first window also carries the header row, so data windows start at
/// sheet rows `1`, `1 + size`, `1 + 2 * size` and so on.
struct RowWindows {
    start: u32,
    size: u32,
    cells: BTreeMap<(u32, u32), CellValue>,
    formulas: BTreeMap<(u32, u32), String>,
}

impl RowWindows {
    fn new(formulas: BTreeMap<(u32, u32), String>, size: u32) -> Self {
        RowWindows {
            start: 0,
            size: size.max(1),
            cells: BTreeMap::new(),
            formulas,
        }
    }

    /// First row past the current window
    fn end(&self) -> u32 {
        let header = u32::from(self.start == 0);
        self.start.saturating_add(self.size).saturating_add(header)
    }

    fn insert(&mut self, pos: (u32, u32), value: CellValue) {
        self.cells.insert(pos, value);
    }

    /// Drain the current window into rows and move on to the next one
    fn take(&mut self) -> Vec<Row> {
        let end = self.end();

        let later = self.cells.split_off(&(end, 0));
        let mut cells = std::mem::replace(&mut self.cells, later);
        let later = self.formulas.split_off(&(end, 0));
        for (pos, formula) in std::mem::replace(&mut self.formulas, later) {
            cells.insert(pos, CellValue::Formula(formula));
        }
        self.start = end;

        let mut rows: Vec<Row> = Vec::new();
        for ((row, col), value) in cells {
            let index = row.saturating_add(1);
            match rows.last_mut() {
                Some(last) if last.index == index => last.cells.push(Cell::new(col, value)),
                _ => rows.push(Row::new(index, vec![Cell::new(col, value)])),
            }
        }
        rows
    }
}

/// Sanitized header names indexed by column and the record every row starts from
struct Headers {
    names: Vec<String>,
    template: RowRecord,
}

impl Headers {
    /// Failed headers stay empty and drop their column
    fn read(
        header_row: Option<&Row>,
        columns: u32,
        options: &CodecOptions,
        errors: &mut Vec<DecodeError>,
    ) -> Self {
        let mut names = vec![String::new(); columns as usize];

        if let Some(row) = header_row {
            for cell in &row.cells {
                match sanitize_value(&cell.value, options.max_cell_length, options.allow_html) {
                    Ok(name) => {
                        if let Some(slot) = names.get_mut(cell.col as usize) {
                            *slot = name;
                        }
                    }
                    Err(err) => errors.push(DecodeError {
                        row: row.index,
                        column: Some(address::encode_column(cell.col)),
                        message: format!("Header {}: {}", cell.reference(row.index), err),
                    }),
                }
            }
        }

        let template = names
            .iter()
            .filter(|h| !h.is_empty())
            .map(|h| (h.clone(), String::new()))
            .collect();
        Headers { names, template }
    }
}

struct WindowFold<'a> {
    windows: RowWindows,
    shape: SheetShape,
    options: &'a CodecOptions,
    chunked: bool,
    reclaim_every: u64,
    reclaim_hint: Option<&'a ReclaimHint>,
    #[cfg(test)]
    observer: Option<&'a WindowObserver>,
    processed: u64,
    headers: Option<Headers>,
    data: Vec<RowRecord>,
    errors: Vec<DecodeError>,
}

impl WindowFold<'_> {
    fn push(&mut self, pos: (u32, u32), value: CellValue) {
        while pos.0 >= self.windows.end() {
            self.flush();
        }
        self.windows.insert(pos, value);
    }

    fn finish(mut self) -> (Headers, Vec<RowRecord>, Vec<DecodeError>) {
        while self.headers.is_none() || self.windows.start < self.shape.rows {
            self.flush();
        }
        let headers = self.headers.unwrap_or_else(|| Headers {
            names: Vec::new(),
            template: RowRecord::new(),
        });
        (headers, self.data, self.errors)
    }

    #[cfg(test)]
    fn observe(&self, rows: &[Row]) {
        if let Some(observer) = self.observer {
            observer(rows);
        }
    }

    #[cfg(not(test))]
    fn observe(&self, _rows: &[Row]) {}

    fn flush(&mut self) {
        let start = self.windows.start.max(1);
        let mut rows = self.windows.take();
        let end = self.windows.start.min(self.shape.rows);

        if self.headers.is_none() {
            let header_row = match rows.first() {
                Some(row) if row.index == 1 => Some(rows.remove(0)),
                _ => None,
            };
            self.headers = Some(Headers::read(
                header_row.as_ref(),
                self.shape.columns,
                self.options,
                &mut self.errors,
            ));
        }

        self.observe(&rows);

        if let Some(headers) = &self.headers {
            for row in &rows {
                fold_row(row, headers, self.options, &mut self.data, &mut self.errors);
            }
        }

        if !self.chunked || end <= start {
            return;
        }
        self.processed += u64::from(end - start);
        log::debug!("Decoded rows {}..={} of {}", start + 1, end, self.shape.rows);

        if self.processed % self.reclaim_every == 0 {
            if let Some(hint) = self.reclaim_hint {
                hint();
            }
        }
    }
}

/// Decode one sheet row and fold the outcome into data/errors
fn fold_row(
    row: &Row,
    headers: &Headers,
    options: &CodecOptions,
    data: &mut Vec<RowRecord>,
    errors: &mut Vec<DecodeError>,
) {
    if row.is_empty() {
        return;
    }

    match decode_row(row, &headers.names, &headers.template, options) {
        Ok((record, cell_errors)) => {
            errors.extend(cell_errors);
            if record.values().any(|v| !v.is_empty()) {
                data.push(record);
            }
        }
        Err(err) => {
            log::warn!("Skipping row {}: {}", row.index, err);
            errors.push(DecodeError {
                row: row.index,
                column: None,
                message: err.to_string(),
            });
        }
    }
}

/// Build one record. Cell failures come back alongside the record; a row
/// failure discards the record entirely.
fn decode_row(
    row: &Row,
    headers: &[String],
    template: &RowRecord,
    options: &CodecOptions,
) -> std::result::Result<(RowRecord, Vec<DecodeError>), RowError> {
    let mut record = template.clone();
    let mut cell_errors = Vec::new();

    for cell in &row.cells {
        let header = match headers.get(cell.col as usize) {
            Some(h) if !h.is_empty() => h,
            _ => continue,
        };

        if let CellValue::Error(value) = &cell.value {
            return Err(RowError::ErrorValue {
                address: cell.reference(row.index),
                value: value.clone(),
            });
        }

        match decode_cell(&cell.value, options) {
            Ok(value) => {
                record.insert(header.clone(), value);
            }
            Err(err) => cell_errors.push(DecodeError {
                row: row.index,
                column: Some(address::encode_column(cell.col)),
                message: format!("Cell {}: {}", cell.reference(row.index), err),
            }),
        }
    }

    Ok((record, cell_errors))
}

fn decode_cell(value: &CellValue, options: &CodecOptions) -> std::result::Result<String, CellError> {
    if value.is_formula() && !options.allow_formulas {
        return Err(CellError::FormulaNotAllowed);
    }
    Ok(sanitize_value(
        value,
        options.max_cell_length,
        options.allow_html,
    )?)
}

/// Convert calamine Data to our CellValue
fn datatype_to_cellvalue(dt: &Data) -> CellValue {
    match dt {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(d) => CellValue::Number(d.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

/// Same as [`datatype_to_cellvalue`] for cells borrowed from a streaming reader
fn dataref_to_cellvalue(dt: &DataRef<'_>) -> CellValue {
    match dt {
        DataRef::Empty => CellValue::Empty,
        DataRef::String(s) => CellValue::Text(s.clone()),
        DataRef::SharedString(s) => CellValue::Text(s.to_string()),
        DataRef::Float(f) => CellValue::Number(*f),
        DataRef::Int(i) => CellValue::Number(*i as f64),
        DataRef::Bool(b) => CellValue::Bool(*b),
        DataRef::DateTime(d) => CellValue::Number(d.as_f64()),
        DataRef::DateTimeIso(s) => CellValue::Text(s.clone()),
        DataRef::DurationIso(s) => CellValue::Text(s.clone()),
        DataRef::Error(e) => CellValue::Error(e.to_string()),
    }
}

/// Bytes held by the string payloads of a result
fn estimate_result_size(data: &[RowRecord], errors: &[DecodeError], headers: &[String]) -> usize {
    let records: usize = data
        .iter()
        .flat_map(|r| r.iter())
        .map(|(k, v)| k.len() + v.len())
        .sum();
    let errors: usize = errors
        .iter()
        .map(|e| e.message.len() + e.column.as_ref().map_or(0, String::len))
        .sum();
    let headers: usize = headers.iter().map(String::len).sum();
    records + errors + headers
}
