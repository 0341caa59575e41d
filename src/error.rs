//! Error taxonomy for a single extraction call.
//!
//! Every failure is terminal for the call that produced it; no partial state
//! survives into later calls. Each variant carries enough detail (entry name,
//! sheet prefix, column label) to diagnose a specific uploaded file, since the
//! message is the only signal available when an export fails to process.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

/// Failure kinds raised while extracting domains from an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The EOCD signature could not be found, a central or local header
    /// signature mismatched, or a record was truncated.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// A required entry is absent from the central directory.
    #[error("archive entry '{0}' not found in the central directory")]
    EntryMissing(String),

    /// The workbook manifest declares no sheet with the configured prefix.
    #[error("no sheet starting with '{0}' found in the workbook")]
    SheetNotFound(String),

    /// A sheet's relationship id has no Target in the relationships document.
    #[error("workbook relationship '{0}' could not be resolved to a target")]
    RelationshipNotFound(String),

    /// The sheet entry decompressed to no usable cell content.
    #[error("sheet '{0}' is empty or could not be decompressed")]
    EmptySheet(String),

    /// The header row was scanned but no cell matched the target column name.
    #[error("'{0}' column not found in the header row")]
    ColumnNotFound(String),
}

// The library operates on in-memory buffers only, so an I/O error can only
// come from a cursor or decoder hitting a truncated structure.
impl From<std::io::Error> for ExtractError {
    fn from(err: std::io::Error) -> Self {
        ExtractError::MalformedArchive(format!("truncated structure: {err}"))
    }
}

impl From<quick_xml::Error> for ExtractError {
    fn from(err: quick_xml::Error) -> Self {
        ExtractError::MalformedArchive(format!("unreadable workbook metadata: {err}"))
    }
}
