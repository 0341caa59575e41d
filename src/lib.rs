//! # domsift
//!
//! Memory-bounded extraction of unique domain names from large XLSX exports.
//!
//! The export files this crate targets can reach ~100 MB on the wire and
//! several times that decompressed, while the extraction runs under a small
//! heap ceiling. The implementation therefore never builds a workbook model:
//! it indexes the ZIP central directory without decompressing anything,
//! copies out just the two entries it needs, streams the worksheet through a
//! chunked inflater, and resolves shared strings on demand with an
//! early-exiting byte scan.
//!
//! ## Features
//!
//! - ZIP central-directory indexing with no payload decompression
//! - Chunked worksheet scanning; the inflated sheet never exists whole
//! - On-demand shared-string resolution proportional to the indices needed
//! - Staged buffer release: peak memory is one inflated artifact, not the sum
//! - Local-file and HTTP archive sources
//!
//! ## Example
//!
//! ```no_run
//! use domsift::{ArchiveSource, DomainExtractor, LocalFileSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let archive = LocalFileSource::new("export.xlsx").fetch().await?;
//!
//!     // The buffer is consumed; it is released before the heavy scanning
//!     let domains = DomainExtractor::default().extract(archive)?;
//!     for domain in &domains {
//!         println!("{domain}");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod extract;
pub mod io;
pub mod report;
pub mod sheet;
pub mod zip;

pub use cli::Cli;
pub use error::ExtractError;
pub use extract::DomainExtractor;
pub use io::{ArchiveSource, HttpSource, LocalFileSource};
pub use report::ChangeReport;
