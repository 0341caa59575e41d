mod http;
mod local;

pub use http::HttpSource;
pub use local::LocalFileSource;

use anyhow::Result;
use async_trait::async_trait;

/// Trait for fetching the complete archive content from a backing store.
///
/// The extractor works on a fully resident buffer (the central directory
/// lives at the tail), so a source hands over the whole body in one call.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Download the full archive into memory.
    async fn fetch(&self) -> Result<Vec<u8>>;
}
