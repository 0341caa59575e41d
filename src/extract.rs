//! Domain extraction orchestration.
//!
//! Sequences the container, metadata, scanner, and resolver layers into one
//! extraction pass. The ordering is a memory discipline, not just a
//! convenience: the full archive buffer is dropped as soon as compressed
//! copies of the two large entries exist, and the sheet's compressed copy is
//! dropped before the shared-string table is inflated. Peak residency is
//! bounded by the largest single inflated artifact, never the sum.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{ExtractError, Result};
use crate::sheet::{CellKind, SheetScan, resolve_shared_strings, resolve_sheet_path, scan_sheet};
use crate::zip::ArchiveDirectory;

/// Sheet-name prefix of the companies worksheet in this export family.
pub const SHEET_NAME_PREFIX: &str = "Companies";

/// Header label of the column holding the domain values.
pub const DOMAIN_COLUMN: &str = "Domain Name";

/// One-indexed row carrying the column labels in this export family. Fixed
/// by the document layout, not auto-detected.
pub const HEADER_ROW: u32 = 6;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";

/// Extracts the distinct trimmed values of one named column from one named
/// sheet of an XLSX archive.
///
/// [`DomainExtractor::default`] is configured for the companies-export
/// layout; the fields exist so tests and sibling document families can point
/// it elsewhere.
#[derive(Debug, Clone)]
pub struct DomainExtractor {
    pub sheet_prefix: String,
    pub column_name: String,
    pub header_row: u32,
}

impl Default for DomainExtractor {
    fn default() -> Self {
        Self {
            sheet_prefix: SHEET_NAME_PREFIX.to_string(),
            column_name: DOMAIN_COLUMN.to_string(),
            header_row: HEADER_ROW,
        }
    }
}

impl DomainExtractor {
    /// Run one extraction over a complete archive buffer.
    ///
    /// Takes the buffer by value: it is released once the two large entries
    /// have been copied out, well before the expensive scanning stages.
    /// Returns the deduplicated, trimmed, non-empty values of the matched
    /// column, in first-appearance order.
    pub fn extract(&self, archive: Vec<u8>) -> Result<Vec<String>> {
        let (sheet_entry, strings_entry) = {
            let directory = ArchiveDirectory::parse(&archive)?;

            let workbook = directory.inflate(&archive, WORKBOOK_PATH)?;
            let rels = directory.inflate(&archive, WORKBOOK_RELS_PATH)?;
            let sheet_path = resolve_sheet_path(&workbook, &rels, &self.sheet_prefix)?;

            (
                directory.materialize(&archive, &sheet_path)?,
                directory.materialize(&archive, SHARED_STRINGS_PATH)?,
            )
        };
        // Both large entries now live as independent compressed copies
        drop(archive);

        let scan = scan_sheet(&sheet_entry, self.header_row)?;
        drop(sheet_entry);

        // Inflate the table only after the sheet copy is gone; `inflate`
        // consumes the compressed copy
        let table = strings_entry.inflate()?;

        let header_wanted: BTreeSet<u32> = scan
            .header
            .iter()
            .filter(|cell| cell.kind == CellKind::Shared)
            .filter_map(|cell| cell.value.trim().parse().ok())
            .collect();
        let header_strings = resolve_shared_strings(&table, &header_wanted);

        let column = self.match_column(&scan, &header_strings)?;

        let indices = scan.columns.get(&column).cloned().unwrap_or_default();
        let wanted: BTreeSet<u32> = indices.iter().copied().collect();
        let resolved = resolve_shared_strings(&table, &wanted);

        let mut seen = HashSet::new();
        let mut domains = Vec::new();
        for index in indices {
            if let Some(value) = resolved.get(&index) {
                let value = value.trim();
                if !value.is_empty() && seen.insert(value.to_string()) {
                    domains.push(value.to_string());
                }
            }
        }

        Ok(domains)
    }

    /// Find the column whose header cell equals the configured column name
    /// after trimming. Shared-string headers compare by their resolved text,
    /// literal headers by their raw value; first match in column order wins.
    fn match_column(
        &self,
        scan: &SheetScan,
        header_strings: &HashMap<u32, String>,
    ) -> Result<String> {
        for cell in &scan.header {
            let value = match cell.kind {
                CellKind::Shared => cell
                    .value
                    .trim()
                    .parse()
                    .ok()
                    .and_then(|index: u32| header_strings.get(&index))
                    .map(String::as_str),
                _ => Some(cell.value.as_str()),
            };
            if let Some(value) = value {
                if value.trim() == self.column_name {
                    return Ok(cell.column.clone());
                }
            }
        }

        Err(ExtractError::ColumnNotFound(self.column_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::HeaderCell;

    fn header_cell(column: &str, kind: CellKind, value: &str) -> HeaderCell {
        HeaderCell {
            column: column.to_string(),
            row: HEADER_ROW,
            kind,
            value: value.to_string(),
        }
    }

    #[test]
    fn matches_shared_string_header_by_resolved_text() {
        let extractor = DomainExtractor::default();
        let scan = SheetScan {
            header: vec![
                header_cell("B", CellKind::Shared, "0"),
                header_cell("C", CellKind::Shared, "1"),
            ],
            columns: HashMap::new(),
        };
        let strings = HashMap::from([
            (0, "Company Name".to_string()),
            (1, "Domain Name".to_string()),
        ]);

        assert_eq!(extractor.match_column(&scan, &strings).unwrap(), "C");
    }

    #[test]
    fn matches_literal_header_after_trimming() {
        let extractor = DomainExtractor::default();
        let scan = SheetScan {
            header: vec![header_cell("D", CellKind::Text, "  Domain Name ")],
            columns: HashMap::new(),
        };

        assert_eq!(
            extractor.match_column(&scan, &HashMap::new()).unwrap(),
            "D"
        );
    }

    #[test]
    fn unmatched_header_reports_the_column_name() {
        let extractor = DomainExtractor::default();
        let scan = SheetScan {
            header: vec![header_cell("A", CellKind::Text, "Website")],
            columns: HashMap::new(),
        };

        let err = extractor.match_column(&scan, &HashMap::new()).unwrap_err();
        assert!(matches!(err, ExtractError::ColumnNotFound(ref c) if c == "Domain Name"));
    }
}
