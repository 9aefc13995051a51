//! Content sources: where cache misses read file bytes from.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

/// Backing store for [`StaticFiles`](super::StaticFiles).
///
/// `read` runs on a cache miss, on its own task, once per load episode.
/// Any error is reported to clients as "not found".
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Source name for logging/debugging.
    fn name(&self) -> &str;

    /// Read the full contents of `path`.
    async fn read(&self, path: &Path) -> io::Result<Bytes>;
}

/// Reads files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSource;

#[async_trait]
impl ContentSource for DiskSource {
    fn name(&self) -> &str {
        "disk"
    }

    async fn read(&self, path: &Path) -> io::Result<Bytes> {
        tokio::fs::read(path).await.map(Bytes::from)
    }
}
