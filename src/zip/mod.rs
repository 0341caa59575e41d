//! Read-only access to the ZIP container holding the workbook parts.

mod directory;
mod structures;

pub use directory::{ArchiveDirectory, EntryData};
pub use structures::{ArchiveEntry, CompressionMethod, EndOfCentralDirectory};
