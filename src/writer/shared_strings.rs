//! Shared strings table for string deduplication

use super::xml_writer::{needs_space_preserve, XmlWriter};
use crate::error::Result;
use std::collections::HashMap;
use std::io::Write;

/// Shared strings table that deduplicates strings across the workbook
pub struct SharedStrings {
    strings: Vec<String>,
    string_map: HashMap<String, u32>,
    references: u64,
    max_unique_strings: usize, // past this, new strings are appended without dedup
}

impl SharedStrings {
    pub fn new() -> Self {
        SharedStrings {
            strings: Vec::with_capacity(1000),
            string_map: HashMap::with_capacity(1000),
            references: 0,
            max_unique_strings: 100_000,
        }
    }

    /// Add a string and get its index
    pub fn add_string(&mut self, s: &str) -> u32 {
        self.references += 1;
        if let Some(&index) = self.string_map.get(s) {
            return index;
        }

        let index = self.strings.len() as u32;
        self.strings.push(s.to_string());
        if self.string_map.len() < self.max_unique_strings {
            self.string_map.insert(s.to_string(), index);
        }
        index
    }

    /// Number of entries in the table
    pub fn count(&self) -> usize {
        self.strings.len()
    }

    /// Write `xl/sharedStrings.xml`
    pub fn write_xml<W: Write>(&self, writer: &mut XmlWriter<W>) -> Result<()> {
        writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")?;

        writer.start_element("sst")?;
        writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )?;
        writer.attribute_int("count", self.references)?;
        writer.attribute_int("uniqueCount", self.strings.len() as u64)?;
        writer.close_start_tag()?;

        for s in &self.strings {
            writer.start_element("si")?;
            writer.close_start_tag()?;

            writer.start_element("t")?;
            if needs_space_preserve(s) {
                writer.attribute("xml:space", "preserve")?;
            }
            writer.close_start_tag()?;
            writer.write_escaped(s)?;
            writer.end_element("t")?;

            writer.end_element("si")?;
        }

        writer.end_element("sst")?;
        writer.flush()?;
        Ok(())
    }
}

impl Default for SharedStrings {
    fn default() -> Self {
        Self::new()
    }
}
