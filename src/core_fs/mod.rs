// File access used by transfers. Path resolution beyond the site root is left to the store.

pub mod local;

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

pub use local::LocalFileStore;

/// File opened for a download.
pub trait FileSource: AsyncRead + AsyncSeek + Unpin + Send {}

impl<T> FileSource for T where T: AsyncRead + AsyncSeek + Unpin + Send {}

/// File opened for an upload.
pub trait FileSink: AsyncWrite + AsyncSeek + Unpin + Send {}

impl<T> FileSink for T where T: AsyncWrite + AsyncSeek + Unpin + Send {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// STOR: start from an empty file
    Truncate,
    /// STOR after REST: keep the content before the offset and drop the rest. A file shorter
    /// than the offset is left as is.
    Resume(u64),
    /// APPE: keep the existing content, the caller seeks to the end
    Append,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn open_read(&self, path: &str) -> io::Result<Box<dyn FileSource>>;

    async fn open_write(&self, path: &str, mode: WriteMode) -> io::Result<Box<dyn FileSink>>;
}
