use super::ArchiveSource;
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Archive source backed by a local file
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ArchiveSource for LocalFileSource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}
