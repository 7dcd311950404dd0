use crate::core_fs::{FileSink, FileSource, FileStore, WriteMode};
use crate::helpers::sanitize_input;
use async_trait::async_trait;
use log::debug;
use std::io;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};

/// Files under a site root directory on the local disk.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a client path onto the site root. The result never leaves the root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(sanitize_input(path))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn open_read(&self, path: &str) -> io::Result<Box<dyn FileSource>> {
        let full_path = self.resolve(path);
        debug!("Opening {:?} for reading", full_path);
        let file = File::open(&full_path).await?;
        if file.metadata().await?.is_dir() {
            return Err(io::Error::new(io::ErrorKind::Other, "Is a directory"));
        }
        Ok(Box::new(file))
    }

    async fn open_write(&self, path: &str, mode: WriteMode) -> io::Result<Box<dyn FileSink>> {
        let full_path = self.resolve(path);
        debug!("Opening {:?} for writing ({:?})", full_path, mode);
        let mut options = OpenOptions::new();
        options.write(true).create(true);
        if mode == WriteMode::Truncate {
            options.truncate(true);
        }
        let file = options.open(&full_path).await?;
        if let WriteMode::Resume(offset) = mode {
            if file.metadata().await?.len() >= offset {
                file.set_len(offset).await?;
            }
        }
        Ok(Box::new(file))
    }
}
