//! Integration tests for sheetguard

use sheetguard::types::CellStyle;
use sheetguard::{
    decode, decode_file, encode, encode_to_file, validate, CellValue, CodecError, CodecOptions,
    RowRecord, WorkbookWriter,
};
use std::io::Cursor;
use tempfile::NamedTempFile;

fn record(pairs: &[(&str, &str)]) -> RowRecord {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn sheet(rows: &[Vec<CellValue>]) -> Vec<u8> {
    let mut workbook = WorkbookWriter::new(Cursor::new(Vec::new())).unwrap();
    workbook.add_worksheet("Sheet1").unwrap();
    if let Some((header, body)) = rows.split_first() {
        workbook.write_row_styled(header, CellStyle::Header).unwrap();
        for row in body {
            workbook.write_row(row).unwrap();
        }
    }
    workbook.close().unwrap().into_inner()
}

#[test]
fn test_write_and_read_roundtrip() {
    let records = vec![
        record(&[("Name", "Alice"), ("Age", "30"), ("City", "NYC")]),
        record(&[("Name", "Bob"), ("Age", "25"), ("City", "SF")]),
    ];
    let options = CodecOptions::default();

    let first = decode(&encode(&records, "People", &options).unwrap(), &options).unwrap();
    let second = decode(&encode(&first.data, "People", &options).unwrap(), &options).unwrap();

    assert_eq!(first.data, records);
    assert_eq!(second.data, first.data);
    assert_eq!(first.headers, vec!["Name", "Age", "City"]);
    assert_eq!(first.metadata.worksheet_name, "People");
    assert_eq!(first.metadata.total_rows, 3);
    assert_eq!(first.metadata.total_columns, 3);
}

#[test]
fn test_file_roundtrip() {
    let temp = NamedTempFile::new().unwrap();
    let records = vec![record(&[("id", "1"), ("label", "first")])];
    let options = CodecOptions::default();

    encode_to_file(&records, "Data", temp.path(), &options).unwrap();
    let result = decode_file(temp.path(), &options).unwrap();

    assert_eq!(result.data, records);
}

#[test]
fn test_decode_file_checks_size_on_disk() {
    let temp = NamedTempFile::new().unwrap();
    encode_to_file(&[record(&[("a", "1")])], "Data", temp.path(), &CodecOptions::default()).unwrap();

    let err = decode_file(temp.path(), &CodecOptions::default().with_max_file_size(16)).unwrap_err();
    assert!(matches!(err, CodecError::FileTooLarge { limit: 16, .. }));
}

#[test]
fn test_oversized_input_never_reaches_rows() {
    let bytes = encode(&[record(&[("a", "1")])], "Data", &CodecOptions::default()).unwrap();
    let options = CodecOptions::default().with_max_file_size(bytes.len() - 1);
    let err = decode(&bytes, &options).unwrap_err();
    assert!(err.to_string().contains("exceeds maximum allowed size"));
}

#[test]
fn test_formula_scenario() {
    let bytes = sheet(&[
        vec!["name".into(), "qty".into()],
        vec!["Cable".into(), "100".into()],
        vec!["Drum".into(), CellValue::Formula("B2*2".into())],
    ]);

    let result = decode(&bytes, &CodecOptions::default()).unwrap();

    assert_eq!(result.data.len(), 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row, 3);
    assert_eq!(result.errors[0].column.as_deref(), Some("B"));
    assert_eq!(result.data[0], record(&[("name", "Cable"), ("qty", "100")]));
}

#[test]
fn test_script_cell_scenario() {
    let bytes = sheet(&[
        vec!["id".into(), "comment".into(), "owner".into()],
        vec![CellValue::Number(1.0), "<script>alert(1)</script>".into(), "ops".into()],
    ]);

    let result = decode(&bytes, &CodecOptions::default()).unwrap();

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row, 2);
    assert_eq!(result.data[0]["id"], "1");
    assert_eq!(result.data[0]["comment"], "");
    assert_eq!(result.data[0]["owner"], "ops");
}

#[test]
fn test_typed_cells_stringified() {
    let bytes = sheet(&[
        vec!["text".into(), "float".into(), "flag".into()],
        vec!["Alice".into(), CellValue::Number(1234.56), CellValue::Bool(true)],
    ]);

    let result = decode(&bytes, &CodecOptions::default()).unwrap();

    assert_eq!(
        result.data[0],
        record(&[("text", "Alice"), ("float", "1234.56"), ("flag", "true")])
    );
}

#[test]
fn test_dangerous_record_aborts_encode() {
    let records = vec![record(&[("a", "1")]), record(&[("a", "eval(payload)")])];
    let err = encode(&records, "Data", &CodecOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "Refusing to write cell A3: Potentially dangerous content detected: eval(");
}

#[test]
fn test_first_record_defines_schema() {
    let records = vec![record(&[("a", "1")]), record(&[("a", "2"), ("b", "x")])];
    let options = CodecOptions::default();

    let result = decode(&encode(&records, "Data", &options).unwrap(), &options).unwrap();

    assert_eq!(result.data, vec![record(&[("a", "1")]), record(&[("a", "2")])]);
    assert!(matches!(encode(&[], "Data", &options), Err(CodecError::EmptyInput)));
}

#[test]
fn test_encode_strips_markup_and_truncates() {
    let records = vec![record(&[("note", "<i>x</i>"), ("code", "ABCDEFGHIJ")])];
    let options = CodecOptions::default().with_max_cell_length(8);

    let result = decode(&encode(&records, "Data", &options).unwrap(), &CodecOptions::default()).unwrap();

    assert_eq!(result.data[0]["note"], "x");
    assert_eq!(result.data[0]["code"], "ABCDEFGH");
}

#[test]
fn test_chunked_encode_matches_single_pass() {
    let records: Vec<RowRecord> = (0..250)
        .map(|i| record(&[("id", i.to_string().as_str()), ("name", format!("Name_{}", i).as_str())]))
        .collect();

    let chunked_opts = CodecOptions::default().with_chunk_size(16);
    let single_opts = CodecOptions::default().with_streaming(false);

    let chunked = decode(&encode(&records, "Data", &chunked_opts).unwrap(), &single_opts).unwrap();
    let single = decode(&encode(&records, "Data", &single_opts).unwrap(), &chunked_opts).unwrap();

    assert_eq!(chunked.data, records);
    assert_eq!(single.data, records);
}

#[test]
fn test_validate_without_decoding() {
    let records: Vec<RowRecord> = (0..10).map(|i| record(&[("n", i.to_string().as_str())])).collect();
    let bytes = encode(&records, "Data", &CodecOptions::default()).unwrap();

    let ok = validate(&bytes, &CodecOptions::default());
    assert!(ok.is_valid);
    assert_eq!(ok.metadata.row_count, 11);
    assert_eq!(ok.metadata.column_count, 1);
    assert_eq!(ok.metadata.worksheet_count, 1);

    let too_many = validate(&bytes, &CodecOptions::default().with_max_rows(5));
    assert!(!too_many.is_valid);
    assert_eq!(too_many.errors.len(), 1);
    assert!(too_many.errors[0].contains("11 rows"));

    let garbage = validate(b"not a workbook", &CodecOptions::default());
    assert!(!garbage.is_valid);
    assert_eq!(garbage.metadata.worksheet_name, None);
}
