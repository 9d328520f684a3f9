//! Low-level XLSX workbook writer with ZIP compression
//!
//! Rows are serialized straight into the compressed worksheet entry as they
//! arrive; only the shared strings table is held until [`WorkbookWriter::close`].

use std::io::{Seek, Write};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

use super::shared_strings::SharedStrings;
use super::xml_writer::{escape_into, XmlWriter};
use crate::address;
use crate::error::{CodecError, Result};
use crate::types::{CellStyle, CellValue};

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIP_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Streaming XLSX writer over any seekable sink
///
/// # Examples
///
/// ```
/// use std::io::Cursor;
/// use sheetguard::types::{CellStyle, CellValue};
/// use sheetguard::writer::WorkbookWriter;
///
/// let mut workbook = WorkbookWriter::new(Cursor::new(Vec::new()))?;
/// workbook.add_worksheet("Totals")?;
/// workbook.write_row_styled(&["Item".into(), "Sum".into()], CellStyle::Header)?;
/// workbook.write_row(&["Cable".into(), CellValue::Formula("SUM(1,2)".into())])?;
/// let bytes = workbook.close()?.into_inner();
/// assert!(!bytes.is_empty());
/// # Ok::<(), sheetguard::CodecError>(())
/// ```
pub struct WorkbookWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: SimpleFileOptions,
    shared_strings: SharedStrings,
    worksheets: Vec<String>,
    in_worksheet: bool,
    sheet_data_open: bool,
    current_row: u32,
    xml_buffer: Vec<u8>,         // reused for every row
    cell_ref_cache: Vec<String>, // column letters for the first 100 columns
}

impl<W: Write + Seek> WorkbookWriter<W> {
    pub fn new(sink: W) -> Result<Self> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(6));

        let cell_ref_cache = (0..100).map(address::encode_column).collect();

        Ok(WorkbookWriter {
            zip: ZipWriter::new(sink),
            options,
            shared_strings: SharedStrings::new(),
            worksheets: Vec::new(),
            in_worksheet: false,
            sheet_data_open: false,
            current_row: 0,
            xml_buffer: Vec::with_capacity(8192),
            cell_ref_cache,
        })
    }

    /// Start a new worksheet, finishing the previous one
    pub fn add_worksheet(&mut self, name: &str) -> Result<()> {
        self.finish_current_worksheet()?;

        self.worksheets.push(name.to_string());
        let sheet_path = format!("xl/worksheets/sheet{}.xml", self.worksheets.len());
        self.zip.start_file(sheet_path, self.options)?;

        let mut xml_writer = XmlWriter::new(&mut self.zip);
        xml_writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")?;
        xml_writer.start_element("worksheet")?;
        xml_writer.attribute("xmlns", SPREADSHEET_NS)?;
        xml_writer.attribute("xmlns:r", RELATIONSHIP_NS)?;
        xml_writer.close_start_tag()?;
        xml_writer.flush()?;

        self.in_worksheet = true;
        self.sheet_data_open = false;
        self.current_row = 0;
        Ok(())
    }

    /// Set column widths (in character units) for the current worksheet.
    /// Must be called before the first row is written.
    pub fn set_column_widths(&mut self, widths: &[f64]) -> Result<()> {
        if !self.in_worksheet || self.sheet_data_open {
            return Err(CodecError::WriteError(
                "Column widths must be set before any row is written".to_string(),
            ));
        }
        if widths.is_empty() {
            return Ok(());
        }

        let mut xml_writer = XmlWriter::new(&mut self.zip);
        xml_writer.start_element("cols")?;
        xml_writer.close_start_tag()?;
        for (idx, width) in widths.iter().enumerate() {
            xml_writer.start_element("col")?;
            xml_writer.attribute_int("min", idx as u64 + 1)?;
            xml_writer.attribute_int("max", idx as u64 + 1)?;
            xml_writer.attribute("width", &width.to_string())?;
            xml_writer.attribute_int("customWidth", 1)?;
            xml_writer.close_empty_tag()?;
        }
        xml_writer.end_element("cols")?;
        xml_writer.flush()
    }

    /// Write a row with the default style
    pub fn write_row(&mut self, values: &[CellValue]) -> Result<()> {
        self.write_row_styled(values, CellStyle::Default)
    }

    /// Write a row with every cell in `style`
    pub fn write_row_styled(&mut self, values: &[CellValue], style: CellStyle) -> Result<()> {
        if !self.in_worksheet {
            return Err(CodecError::WriteError("No active worksheet".to_string()));
        }
        self.open_sheet_data()?;

        self.current_row += 1;
        let mut num_buffer = itoa::Buffer::new();
        let row_num = num_buffer.format(self.current_row).to_string();
        let style_id = style.index();

        self.xml_buffer.clear();
        self.xml_buffer.extend_from_slice(b"<row r=\"");
        self.xml_buffer.extend_from_slice(row_num.as_bytes());
        self.xml_buffer.extend_from_slice(b"\">");

        for (col_idx, value) in values.iter().enumerate() {
            if value.is_empty() && style_id == 0 {
                continue;
            }

            self.xml_buffer.extend_from_slice(b"<c r=\"");
            match self.cell_ref_cache.get(col_idx) {
                Some(letters) => self.xml_buffer.extend_from_slice(letters.as_bytes()),
                None => self
                    .xml_buffer
                    .extend_from_slice(address::encode_column(col_idx as u32).as_bytes()),
            }
            self.xml_buffer.extend_from_slice(row_num.as_bytes());
            self.xml_buffer.extend_from_slice(b"\"");

            if style_id > 0 {
                self.xml_buffer.extend_from_slice(b" s=\"");
                self.xml_buffer
                    .extend_from_slice(num_buffer.format(style_id).as_bytes());
                self.xml_buffer.extend_from_slice(b"\"");
            }

            match value {
                CellValue::Empty => {
                    self.xml_buffer.extend_from_slice(b"/>");
                }
                CellValue::Text(s) => self.push_shared_string(s),
                CellValue::Number(n) if n.is_finite() => {
                    self.xml_buffer.extend_from_slice(b" t=\"n\"><v>");
                    self.xml_buffer.extend_from_slice(n.to_string().as_bytes());
                    self.xml_buffer.extend_from_slice(b"</v></c>");
                }
                CellValue::Number(n) => self.push_shared_string(&n.to_string()),
                CellValue::Bool(b) => {
                    self.xml_buffer.extend_from_slice(b" t=\"b\"><v>");
                    self.xml_buffer
                        .extend_from_slice(if *b { b"1" } else { b"0" });
                    self.xml_buffer.extend_from_slice(b"</v></c>");
                }
                CellValue::Formula(f) => {
                    self.xml_buffer.extend_from_slice(b"><f>");
                    escape_into(&mut self.xml_buffer, f.strip_prefix('=').unwrap_or(f));
                    self.xml_buffer.extend_from_slice(b"</f></c>");
                }
                CellValue::Error(e) => {
                    self.xml_buffer.extend_from_slice(b" t=\"e\"><v>");
                    escape_into(&mut self.xml_buffer, e);
                    self.xml_buffer.extend_from_slice(b"</v></c>");
                }
            }
        }

        self.xml_buffer.extend_from_slice(b"</row>");
        self.zip.write_all(&self.xml_buffer)?;
        Ok(())
    }

    /// Push buffered row data through the compressor
    pub fn flush_rows(&mut self) -> Result<()> {
        self.zip.flush()?;
        Ok(())
    }

    /// Rows written to the current worksheet
    pub fn current_row(&self) -> u32 {
        self.current_row
    }

    fn push_shared_string(&mut self, s: &str) {
        let index = self.shared_strings.add_string(s);
        let mut num_buffer = itoa::Buffer::new();
        self.xml_buffer.extend_from_slice(b" t=\"s\"><v>");
        self.xml_buffer
            .extend_from_slice(num_buffer.format(index).as_bytes());
        self.xml_buffer.extend_from_slice(b"</v></c>");
    }

    fn open_sheet_data(&mut self) -> Result<()> {
        if !self.sheet_data_open {
            self.zip.write_all(b"<sheetData>")?;
            self.sheet_data_open = true;
        }
        Ok(())
    }

    fn finish_current_worksheet(&mut self) -> Result<()> {
        if !self.in_worksheet {
            return Ok(());
        }
        self.open_sheet_data()?;
        self.zip.write_all(b"</sheetData></worksheet>")?;

        self.in_worksheet = false;
        self.sheet_data_open = false;
        Ok(())
    }

    /// Write the remaining package parts and return the sink
    pub fn close(mut self) -> Result<W> {
        self.finish_current_worksheet()?;
        if self.worksheets.is_empty() {
            return Err(CodecError::WriteError(
                "Workbook must contain at least one worksheet".to_string(),
            ));
        }

        let options = self.options;

        self.zip.start_file("xl/sharedStrings.xml", options)?;
        {
            let mut xml_writer = XmlWriter::new(&mut self.zip);
            self.shared_strings.write_xml(&mut xml_writer)?;
        }

        self.zip.start_file("xl/workbook.xml", options)?;
        self.write_workbook_xml()?;

        self.zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        self.write_workbook_rels()?;

        self.zip.start_file("xl/styles.xml", options)?;
        self.zip.write_all(STYLES_XML.as_bytes())?;

        self.zip.start_file("[Content_Types].xml", options)?;
        self.write_content_types()?;

        self.zip.start_file("_rels/.rels", options)?;
        self.zip.write_all(ROOT_RELS_XML.as_bytes())?;

        self.zip.start_file("docProps/core.xml", options)?;
        self.write_core_props()?;

        self.zip.start_file("docProps/app.xml", options)?;
        self.zip.write_all(APP_PROPS_XML.as_bytes())?;

        let sink = self.zip.finish()?;
        Ok(sink)
    }

    fn write_workbook_xml(&mut self) -> Result<()> {
        let mut xml_writer = XmlWriter::new(&mut self.zip);

        xml_writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")?;
        xml_writer.start_element("workbook")?;
        xml_writer.attribute("xmlns", SPREADSHEET_NS)?;
        xml_writer.attribute("xmlns:r", RELATIONSHIP_NS)?;
        xml_writer.close_start_tag()?;

        xml_writer.start_element("sheets")?;
        xml_writer.close_start_tag()?;
        for (i, name) in self.worksheets.iter().enumerate() {
            let sheet_id = i as u64 + 1;
            xml_writer.start_element("sheet")?;
            xml_writer.attribute("name", name)?;
            xml_writer.attribute_int("sheetId", sheet_id)?;
            xml_writer.attribute("r:id", &format!("rId{}", sheet_id))?;
            xml_writer.close_empty_tag()?;
        }
        xml_writer.end_element("sheets")?;

        xml_writer.end_element("workbook")?;
        xml_writer.flush()
    }

    fn write_workbook_rels(&mut self) -> Result<()> {
        let sheet_count = self.worksheets.len();
        let mut xml_writer = XmlWriter::new(&mut self.zip);

        xml_writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")?;
        xml_writer.start_element("Relationships")?;
        xml_writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/package/2006/relationships",
        )?;
        xml_writer.close_start_tag()?;

        let mut relationship = |id: usize, kind: &str, target: &str| -> Result<()> {
            xml_writer.start_element("Relationship")?;
            xml_writer.attribute("Id", &format!("rId{}", id))?;
            xml_writer.attribute("Type", &format!("{}/{}", RELATIONSHIP_NS, kind))?;
            xml_writer.attribute("Target", target)?;
            xml_writer.close_empty_tag()
        };

        for i in 1..=sheet_count {
            relationship(i, "worksheet", &format!("worksheets/sheet{}.xml", i))?;
        }
        relationship(sheet_count + 1, "styles", "styles.xml")?;
        relationship(sheet_count + 2, "sharedStrings", "sharedStrings.xml")?;

        xml_writer.end_element("Relationships")?;
        xml_writer.flush()
    }

    fn write_content_types(&mut self) -> Result<()> {
        let sheet_count = self.worksheets.len();
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
"#,
        );
        for i in 1..=sheet_count {
            xml.push_str(&format!(
                "<Override PartName=\"/xl/worksheets/sheet{}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\n",
                i
            ));
        }
        xml.push_str(
            r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
</Types>"#,
        );
        self.zip.write_all(xml.as_bytes())?;
        Ok(())
    }

    fn write_core_props(&mut self) -> Result<()> {
        let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<dc:creator>sheetguard</dc:creator>
<cp:lastModifiedBy>sheetguard</cp:lastModifiedBy>
<dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created>
<dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified>
</cp:coreProperties>"#
        );
        self.zip.write_all(xml.as_bytes())?;
        Ok(())
    }
}

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#;

const APP_PROPS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">
<Application>sheetguard</Application>
<DocSecurity>0</DocSecurity>
<ScaleCrop>false</ScaleCrop>
<LinksUpToDate>false</LinksUpToDate>
<SharedDoc>false</SharedDoc>
<HyperlinksChanged>false</HyperlinksChanged>
</Properties>"#;

// Style 0 is the default, style 1 is the header (bold on grey).
const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="2">
<font><sz val="11"/><name val="Calibri"/></font>
<font><b/><sz val="11"/><name val="Calibri"/></font>
</fonts>
<fills count="3">
<fill><patternFill patternType="none"/></fill>
<fill><patternFill patternType="gray125"/></fill>
<fill><patternFill patternType="solid"><fgColor rgb="FFD9D9D9"/><bgColor indexed="64"/></patternFill></fill>
</fills>
<borders count="1">
<border><left/><right/><top/><bottom/><diagonal/></border>
</borders>
<cellStyleXfs count="1">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
</cellStyleXfs>
<cellXfs count="2">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="0" fontId="1" fillId="2" borderId="0" xfId="0" applyFont="1" applyFill="1"/>
</cellXfs>
</styleSheet>"#;
