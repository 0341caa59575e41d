//! Minimal-footprint decoding of the workbook's XML parts.

mod meta;
mod scan;
mod strings;

pub use meta::resolve_sheet_path;
pub use scan::{CellKind, HeaderCell, SheetScan, SheetScanner, scan_sheet};
pub use strings::resolve_shared_strings;
