//! Legacy sparse-cell shape: wire format and read/write delegation

use sheetguard::{
    decode, decode_range, encode, legacy_read, legacy_sheet_to_json, legacy_write, CodecError,
    CodecOptions, LegacyCell, LegacyInput, LegacyReadOptions, LegacySheet, LegacyValue, LegacyWorkbook,
    RowRecord,
};

fn record(pairs: &[(&str, &str)]) -> RowRecord {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_read_range_covers_header_and_row() {
    let bytes = encode(&[record(&[("x", "1")])], "Data", &CodecOptions::default()).unwrap();

    let workbook = legacy_read(bytes.as_slice(), &LegacyReadOptions::default()).unwrap();
    let sheet = &workbook.sheets[&workbook.sheet_names[0]];
    let range = decode_range(sheet.range.as_deref().unwrap());

    assert_eq!((range.start.row, range.start.col), (0, 0));
    assert_eq!((range.end.row, range.end.col), (1, 0));
}

#[test]
fn test_binary_string_input() {
    let bytes = encode(&[record(&[("x", "1")])], "Data", &CodecOptions::default()).unwrap();
    let binary: String = bytes.iter().map(|&b| char::from(b)).collect();

    let from_string = legacy_read(LegacyInput::BinaryString(&binary), &LegacyReadOptions::default()).unwrap();
    let from_bytes = legacy_read(LegacyInput::Bytes(&bytes), &LegacyReadOptions::default()).unwrap();

    assert_eq!(from_string, from_bytes);
}

#[test]
fn test_wire_shape() {
    let bytes = encode(
        &[record(&[("name", "Cable"), ("qty", "")]), record(&[("name", "Drum"), ("qty", "3")])],
        "Data",
        &CodecOptions::default(),
    )
    .unwrap();

    let workbook = legacy_read(bytes.as_slice(), &LegacyReadOptions::default()).unwrap();
    let json = serde_json::to_value(&workbook).unwrap();

    assert_eq!(
        json,
        serde_json::json!({
            "SheetNames": ["Data"],
            "Sheets": {
                "Data": {
                    "!ref": "A1:B3",
                    "A1": { "v": "name", "t": "s" },
                    "B1": { "v": "qty", "t": "s" },
                    "A2": { "v": "Cable", "t": "s" },
                    "A3": { "v": "Drum", "t": "s" },
                    "B3": { "v": "3", "t": "s" }
                }
            }
        })
    );
}

#[test]
fn test_deserialized_sheet_converts_to_records() {
    let json = r#"{
        "SheetNames": ["Poles"],
        "Sheets": {
            "Poles": {
                "!ref": "A1:C3",
                "A1": { "v": "pole", "t": "s" },
                "C1": { "v": "height", "t": "s" },
                "A2": { "v": "P-1", "t": "s" },
                "B2": { "v": true, "t": "b" },
                "C2": { "v": 12.5, "t": "n" },
                "A3": { "v": "P-2", "t": "s" }
            }
        }
    }"#;
    let workbook: LegacyWorkbook = serde_json::from_str(json).unwrap();
    let sheet = &workbook.sheets["Poles"];

    assert_eq!(sheet.range.as_deref(), Some("A1:C3"));
    assert_eq!(sheet.cells["C2"].v, LegacyValue::Number(12.5));
    assert!(sheet.data.is_none());

    let records = legacy_sheet_to_json(sheet, &CodecOptions::default()).unwrap();
    assert_eq!(
        records,
        vec![
            record(&[("pole", "P-1"), ("Column2", "true"), ("height", "12.5")]),
            record(&[("pole", "P-2"), ("Column2", ""), ("height", "")]),
        ]
    );
}

#[test]
fn test_write_then_decode() {
    let mut sheet = LegacySheet {
        range: Some("A1:B2".to_string()),
        ..Default::default()
    };
    sheet.cells.insert("A1".to_string(), LegacyCell::text("id"));
    sheet.cells.insert("B1".to_string(), LegacyCell::text("name"));
    sheet.cells.insert("A2".to_string(), LegacyCell::text("7"));
    sheet.cells.insert("B2".to_string(), LegacyCell::text("Cable"));

    let mut workbook = LegacyWorkbook {
        sheet_names: vec!["Export".to_string()],
        ..Default::default()
    };
    workbook.sheets.insert("Export".to_string(), sheet);

    let bytes = legacy_write(&workbook, &CodecOptions::default()).unwrap();
    let result = decode(&bytes, &CodecOptions::default()).unwrap();

    assert_eq!(result.metadata.worksheet_name, "Export");
    assert_eq!(result.data, vec![record(&[("id", "7"), ("name", "Cable")])]);
}

#[test]
fn test_read_then_write_keeps_records() {
    let records: Vec<RowRecord> = (0..1_200)
        .map(|i| record(&[("id", i.to_string().as_str())]))
        .collect();
    let bytes = encode(&records, "Big", &CodecOptions::default()).unwrap();

    let workbook = legacy_read(bytes.as_slice(), &LegacyReadOptions::default()).unwrap();
    let rewritten = legacy_write(&workbook, &CodecOptions::default()).unwrap();

    assert_eq!(decode(&rewritten, &CodecOptions::default()).unwrap().data, records);
}

#[test]
fn test_cell_formula_option() {
    use sheetguard::types::CellValue;
    use sheetguard::WorkbookWriter;
    use std::io::Cursor;

    let mut writer = WorkbookWriter::new(Cursor::new(Vec::new())).unwrap();
    writer.add_worksheet("Sheet1").unwrap();
    writer.write_row(&["total".into()]).unwrap();
    writer.write_row(&[CellValue::Formula("SUM(1,2)".into())]).unwrap();
    let bytes = writer.close().unwrap().into_inner();

    let rejected = legacy_read(bytes.as_slice(), &LegacyReadOptions::default()).unwrap();
    assert_eq!(rejected.sheets["Sheet1"].range.as_deref(), Some("A1:A1"));

    let options = LegacyReadOptions {
        cell_formula: true,
        ..Default::default()
    };
    let kept = legacy_read(bytes.as_slice(), &options).unwrap();
    assert_eq!(kept.sheets["Sheet1"].cells["A2"], LegacyCell::text("=SUM(1,2)"));
}

#[test]
fn test_oversized_ref_is_bounded() {
    let json = r#"{
        "SheetNames": ["Wide"],
        "Sheets": {
            "Wide": {
                "!ref": "A1:XFD1048576",
                "A1": { "v": "id", "t": "s" },
                "A2": { "v": "1", "t": "s" }
            }
        }
    }"#;
    let workbook: LegacyWorkbook = serde_json::from_str(json).unwrap();

    let records = legacy_sheet_to_json(&workbook.sheets["Wide"], &CodecOptions::default()).unwrap();
    assert_eq!(records, vec![record(&[("id", "1")])]);

    let bytes = legacy_write(&workbook, &CodecOptions::default()).unwrap();
    let result = decode(&bytes, &CodecOptions::default()).unwrap();
    assert_eq!(result.data, records);

    let mut far = workbook.clone();
    far.sheets
        .get_mut("Wide")
        .unwrap()
        .cells
        .insert("C9".to_string(), LegacyCell::text("x"));
    let err = legacy_write(&far, &CodecOptions::default().with_max_rows(5)).unwrap_err();
    assert!(matches!(err, CodecError::TooManyRows { rows: 9, limit: 5 }));
}
