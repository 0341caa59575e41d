//! Streaming worksheet cell scanner.
//!
//! The target sheet can inflate to several times the archive size, so it is
//! never held in memory whole. The compressed payload is inflated in bounded
//! chunks; decoded text lands in a carry-over buffer that only ever holds the
//! unmatched tail from the previous chunk, which is how cell markup split
//! across a chunk boundary survives. Rows and cells arrive in document order
//! (the format guarantees it), so a single forward pass with append-only
//! accumulation is all that is needed.

use flate2::{Decompress, FlushDecompress, Status};
use std::collections::HashMap;

use crate::error::{ExtractError, Result};
use crate::zip::{CompressionMethod, EntryData};

use super::strings::{find_bytes, find_tag, unescape_xml};

/// Size of the inflated-output buffer handed to the scanner per step.
const INFLATE_CHUNK: usize = 64 * 1024;

/// Bytes held back when the chunk tail could be the start of a cell tag.
const OPEN_TAG_HOLDBACK: usize = 3;

/// How a cell stores its value, from the `t` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// `t="s"` - the value is an index into the shared-string table
    Shared,
    /// `t="str"` or `t="inlineStr"` - literal text
    Text,
    /// `t="b"` - boolean
    Boolean,
    /// No type attribute, or `t="n"` - numeric (dates included)
    Number,
}

/// A cell captured from the header row.
#[derive(Debug, Clone)]
pub struct HeaderCell {
    /// Column letters of the cell reference, e.g. "D"
    pub column: String,
    pub row: u32,
    pub kind: CellKind,
    /// Decoded `<v>` text; for [`CellKind::Shared`] this is the index digits
    pub value: String,
}

/// Result of one full pass over a worksheet stream.
#[derive(Debug, Default)]
pub struct SheetScan {
    /// Header-row cells in document (column) order
    pub header: Vec<HeaderCell>,
    /// Shared-string indices per column label, data rows only, in row order
    pub columns: HashMap<String, Vec<u32>>,
}

/// Incremental cell matcher fed with decoded text chunks.
///
/// Rows before the header row are ignored entirely. Header-row cells are kept
/// in full. Rows after the header contribute only shared-string-typed cells,
/// recorded as per-column index lists; the domain values in this document
/// family are always shared strings, so other cell types carry nothing of
/// interest.
pub struct SheetScanner {
    header_row: u32,
    carry: Vec<u8>,
    header: Vec<HeaderCell>,
    columns: HashMap<String, Vec<u32>>,
    cells_seen: u64,
}

impl SheetScanner {
    pub fn new(header_row: u32) -> Self {
        Self {
            header_row,
            carry: Vec::new(),
            header: Vec::new(),
            columns: HashMap::new(),
            cells_seen: 0,
        }
    }

    /// Append one chunk of decoded sheet text and consume every complete cell
    /// element found so far.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.carry.extend_from_slice(chunk);
        self.consume_complete_cells();
    }

    /// Number of complete `<c>` elements matched so far, any row.
    pub fn cell_count(&self) -> u64 {
        self.cells_seen
    }

    pub fn finish(self) -> SheetScan {
        SheetScan {
            header: self.header,
            columns: self.columns,
        }
    }

    fn consume_complete_cells(&mut self) {
        let buf = std::mem::take(&mut self.carry);
        let mut pos = 0usize;

        loop {
            let Some(start) = find_cell_open(&buf, pos) else {
                // No further cell opens; keep a short tail in case the next
                // chunk completes a split "<c"
                pos = pos.max(buf.len().saturating_sub(OPEN_TAG_HOLDBACK));
                break;
            };

            let Some(tag_end) = find_bytes(&buf, start, b">") else {
                pos = start;
                break;
            };

            let end = if buf[tag_end - 1] == b'/' {
                // Self-closing cell: no value node, nothing to record, but it
                // still counts as a seen cell
                tag_end + 1
            } else {
                match find_bytes(&buf, tag_end, b"</c>") {
                    Some(close) => close + 4,
                    None => {
                        pos = start;
                        break;
                    }
                }
            };

            self.record_cell(&buf[start..end]);
            pos = end;
        }

        self.carry = buf[pos..].to_vec();
    }

    fn record_cell(&mut self, element: &[u8]) {
        self.cells_seen += 1;

        let tag_end = find_bytes(element, 0, b">").unwrap_or(element.len());
        let tag = &element[..tag_end];

        let Some(reference) = attr_value(tag, b"r") else {
            return;
        };
        let Some((column, row)) = split_cell_ref(reference) else {
            return;
        };
        if row < self.header_row {
            return;
        }

        let kind = match attr_value(tag, b"t") {
            Some(b"s") => CellKind::Shared,
            Some(b"str") | Some(b"inlineStr") => CellKind::Text,
            Some(b"b") => CellKind::Boolean,
            _ => CellKind::Number,
        };

        // A cell with no value node is skipped, never an empty string
        let Some(value) = inner_value(element) else {
            return;
        };

        if row == self.header_row {
            self.header.push(HeaderCell {
                column,
                row,
                kind,
                value,
            });
        } else if kind == CellKind::Shared {
            if let Ok(index) = value.trim().parse::<u32>() {
                self.columns.entry(column).or_default().push(index);
            }
        }
    }
}

/// Run a full streaming pass over one worksheet entry.
///
/// Deflated entries are inflated cooperatively in [`INFLATE_CHUNK`]-sized
/// steps; stored entries are fed as a single chunk. The fully inflated stream
/// never exists in memory at once.
pub fn scan_sheet(entry: &EntryData, header_row: u32) -> Result<SheetScan> {
    let mut scanner = SheetScanner::new(header_row);

    match entry.method {
        CompressionMethod::Stored => scanner.push_chunk(&entry.bytes),
        CompressionMethod::Deflate => {
            let mut inflater = Decompress::new(false);
            let mut out = vec![0u8; INFLATE_CHUNK];
            let mut in_pos = 0usize;

            loop {
                let before_in = inflater.total_in();
                let before_out = inflater.total_out();

                let status = inflater
                    .decompress(&entry.bytes[in_pos..], &mut out, FlushDecompress::None)
                    .map_err(|e| {
                        ExtractError::EmptySheet(format!("{}: inflate failed: {e}", entry.name))
                    })?;

                let consumed = (inflater.total_in() - before_in) as usize;
                let produced = (inflater.total_out() - before_out) as usize;
                in_pos += consumed;
                scanner.push_chunk(&out[..produced]);

                match status {
                    Status::StreamEnd => break,
                    Status::Ok | Status::BufError => {
                        if consumed == 0 && produced == 0 {
                            // No forward progress: the deflate stream ended
                            // without a final block
                            return Err(ExtractError::EmptySheet(format!(
                                "{}: deflate stream is truncated",
                                entry.name
                            )));
                        }
                    }
                }
            }
        }
        CompressionMethod::Unknown(method) => {
            return Err(ExtractError::MalformedArchive(format!(
                "entry '{}' uses unsupported compression method {method}",
                entry.name
            )));
        }
    }

    if scanner.cell_count() == 0 {
        return Err(ExtractError::EmptySheet(entry.name.clone()));
    }

    Ok(scanner.finish())
}

/// Next `<c` occurrence that opens a cell element (and not `<cols>` etc.).
fn find_cell_open(buf: &[u8], from: usize) -> Option<usize> {
    find_tag(buf, from, b"<c")
}

/// Value of a double-quoted attribute inside an open tag, if present.
fn attr_value<'a>(tag: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    let mut needle = Vec::with_capacity(name.len() + 3);
    needle.push(b' ');
    needle.extend_from_slice(name);
    needle.extend_from_slice(b"=\"");

    let at = find_bytes(tag, 0, &needle)?;
    let start = at + needle.len();
    let end = find_bytes(tag, start, b"\"")?;
    Some(&tag[start..end])
}

/// Split a cell reference like `D7` into column letters and row number.
fn split_cell_ref(reference: &[u8]) -> Option<(String, u32)> {
    let letters = reference
        .iter()
        .take_while(|b| b.is_ascii_uppercase())
        .count();
    if letters == 0 || letters == reference.len() {
        return None;
    }
    let column = std::str::from_utf8(&reference[..letters]).ok()?.to_string();
    let row = std::str::from_utf8(&reference[letters..])
        .ok()?
        .parse()
        .ok()?;
    Some((column, row))
}

/// Decoded text of the `<v>...</v>` node inside a cell element.
fn inner_value(element: &[u8]) -> Option<String> {
    let open = find_tag(element, 0, b"<v")?;
    let tag_end = find_bytes(element, open, b">")?;
    if element[tag_end - 1] == b'/' {
        return None;
    }
    let start = tag_end + 1;
    let end = find_bytes(element, start, b"</v>")?;
    Some(unescape_xml(&element[start..end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<cols><col min="1" max="4" width="12"/></cols>
<sheetData>
<row r="1" spans="1:4"><c r="A1" t="s"><v>90</v></c></row>
<row r="2"><c r="B2" t="str"><v>Domain Name</v></c></row>
<row r="6" spans="1:4">
<c r="A6" t="s"><v>10</v></c>
<c r="B6" t="s"><v>11</v></c>
<c r="C6" t="str"><v>Notes</v></c>
</row>
<row r="7">
<c r="A7" t="s"><v>20</v></c>
<c r="B7" t="s"><v>21</v></c>
<c r="C7"><v>42.5</v></c>
</row>
<row r="8">
<c r="A8" s="1" t="s"><v>22</v></c>
<c r="B8"/>
<c r="C8" t="b"><v>1</v></c>
</row>
</sheetData>
</worksheet>"#;

    fn scan_in_chunks(xml: &str, chunk_size: usize, header_row: u32) -> SheetScan {
        let mut scanner = SheetScanner::new(header_row);
        for chunk in xml.as_bytes().chunks(chunk_size) {
            scanner.push_chunk(chunk);
        }
        scanner.finish()
    }

    #[test]
    fn captures_header_row_and_data_columns() {
        let scan = scan_in_chunks(SHEET, SHEET.len(), 6);

        assert_eq!(scan.header.len(), 3);
        assert_eq!(scan.header[0].column, "A");
        assert_eq!(scan.header[0].kind, CellKind::Shared);
        assert_eq!(scan.header[0].value, "10");
        assert_eq!(scan.header[2].kind, CellKind::Text);
        assert_eq!(scan.header[2].value, "Notes");

        assert_eq!(scan.columns["A"], vec![20, 22]);
        assert_eq!(scan.columns["B"], vec![21]);
        // C holds a number and a boolean after the header; nothing recorded
        assert!(!scan.columns.contains_key("C"));
    }

    #[test]
    fn rows_before_the_header_are_ignored() {
        let scan = scan_in_chunks(SHEET, SHEET.len(), 6);

        // Row 1 holds a shared string, row 2 a literal "Domain Name"; neither
        // may leak into the header snapshot or the column lists
        assert!(scan.header.iter().all(|c| c.row == 6));
        assert!(scan.columns.values().flatten().all(|&i| i >= 20));
    }

    #[test]
    fn single_byte_chunks_produce_the_same_scan() {
        let whole = scan_in_chunks(SHEET, SHEET.len(), 6);
        let tiny = scan_in_chunks(SHEET, 1, 6);

        assert_eq!(tiny.header.len(), whole.header.len());
        assert_eq!(tiny.columns, whole.columns);
    }

    #[test]
    fn chunk_boundary_inside_a_cell_tag_is_handled() {
        for chunk_size in [2, 3, 5, 7, 16] {
            let scan = scan_in_chunks(SHEET, chunk_size, 6);
            assert_eq!(scan.columns["A"], vec![20, 22], "chunk size {chunk_size}");
        }
    }

    #[test]
    fn self_closing_and_valueless_cells_are_skipped() {
        let xml = r#"<sheetData>
            <row r="6"><c r="A6" t="s"/><c r="B6" t="s"><v/></c></row>
            <row r="7"><c r="A7" t="s"><f>SUM(1)</f></c></row>
        </sheetData>"#;
        let mut scanner = SheetScanner::new(6);
        scanner.push_chunk(xml.as_bytes());

        assert_eq!(scanner.cell_count(), 3);
        let scan = scanner.finish();
        assert!(scan.header.is_empty());
        assert!(scan.columns.is_empty());
    }

    #[test]
    fn escaped_values_decode() {
        let xml = r#"<row r="6"><c r="A6" t="str"><v>R&amp;D spend</v></c></row>"#;
        let mut scanner = SheetScanner::new(6);
        scanner.push_chunk(xml.as_bytes());
        let scan = scanner.finish();
        assert_eq!(scan.header[0].value, "R&D spend");
    }

    #[test]
    fn scan_sheet_reads_a_stored_entry() {
        let entry = EntryData {
            name: "xl/worksheets/sheet2.xml".to_string(),
            method: CompressionMethod::Stored,
            uncompressed_size: SHEET.len() as u64,
            bytes: SHEET.as_bytes().to_vec(),
        };

        let scan = scan_sheet(&entry, 6).unwrap();
        assert_eq!(scan.header.len(), 3);
    }

    #[test]
    fn scan_sheet_inflates_a_deflated_entry_in_chunks() {
        use std::io::Write;

        // Large enough that multiple inflate steps occur
        let mut xml = String::from("<sheetData><row r=\"6\"><c r=\"A6\" t=\"s\"><v>0</v></c></row>");
        for row in 7..3000 {
            xml.push_str(&format!(
                "<row r=\"{row}\"><c r=\"A{row}\" t=\"s\"><v>{}</v></c></row>",
                row % 100
            ));
        }
        xml.push_str("</sheetData>");

        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(xml.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let entry = EntryData {
            name: "xl/worksheets/sheet2.xml".to_string(),
            method: CompressionMethod::Deflate,
            uncompressed_size: xml.len() as u64,
            bytes: compressed,
        };

        let scan = scan_sheet(&entry, 6).unwrap();
        assert_eq!(scan.columns["A"].len(), 3000 - 7);
    }

    #[test]
    fn cell_free_sheet_is_reported_empty() {
        let entry = EntryData {
            name: "xl/worksheets/sheet2.xml".to_string(),
            method: CompressionMethod::Stored,
            uncompressed_size: 23,
            bytes: b"<worksheet></worksheet>".to_vec(),
        };

        let err = scan_sheet(&entry, 6).unwrap_err();
        assert!(matches!(err, ExtractError::EmptySheet(_)));
    }

    #[test]
    fn undecodable_entry_is_reported_empty() {
        let entry = EntryData {
            name: "xl/worksheets/sheet2.xml".to_string(),
            method: CompressionMethod::Deflate,
            uncompressed_size: 100,
            bytes: b"\x00\x01\x02\x03 not a deflate stream".to_vec(),
        };

        let err = scan_sheet(&entry, 6).unwrap_err();
        assert!(matches!(err, ExtractError::EmptySheet(_)));
    }

    #[test]
    fn cell_references_split_into_column_and_row() {
        assert_eq!(split_cell_ref(b"D7"), Some(("D".to_string(), 7)));
        assert_eq!(split_cell_ref(b"AB123"), Some(("AB".to_string(), 123)));
        assert_eq!(split_cell_ref(b"7"), None);
        assert_eq!(split_cell_ref(b"D"), None);
    }
}
