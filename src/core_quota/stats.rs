// Transfer statistics per user

use chrono::{DateTime, Local};
use log::debug;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Receives one record per finished transfer.
pub trait StatsSink: Send + Sync {
    fn record_download(&self, username: &str, kilobytes: u64, milliseconds: u64);

    fn record_upload(&self, username: &str, kilobytes: u64, milliseconds: u64);
}

/// Transfer totals for one user
#[derive(Debug, Clone, PartialEq)]
pub struct UserTransferStats {
    pub username: String,

    /// KiB uploaded (cumulative)
    pub uploaded_kb: u64,

    /// Time spent uploading, in milliseconds
    pub upload_ms: u64,

    pub files_uploaded: u32,

    /// KiB downloaded (cumulative)
    pub downloaded_kb: u64,

    /// Time spent downloading, in milliseconds
    pub download_ms: u64,

    pub files_downloaded: u32,

    pub last_activity: Option<DateTime<Local>>,
}

impl UserTransferStats {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            uploaded_kb: 0,
            upload_ms: 0,
            files_uploaded: 0,
            downloaded_kb: 0,
            download_ms: 0,
            files_downloaded: 0,
            last_activity: None,
        }
    }

    pub fn record_upload(&mut self, kilobytes: u64, milliseconds: u64) {
        self.uploaded_kb += kilobytes;
        self.upload_ms += milliseconds;
        self.files_uploaded += 1;
        self.last_activity = Some(Local::now());
    }

    pub fn record_download(&mut self, kilobytes: u64, milliseconds: u64) {
        self.downloaded_kb += kilobytes;
        self.download_ms += milliseconds;
        self.files_downloaded += 1;
        self.last_activity = Some(Local::now());
    }

    pub fn format_stats(&self) -> String {
        let upload_mb = self.uploaded_kb as f64 / 1024.0;
        let download_mb = self.downloaded_kb as f64 / 1024.0;

        format!(
            "Upload: {:.2}MB ({} files), Download: {:.2}MB ({} files)",
            upload_mb, self.files_uploaded, download_mb, self.files_downloaded
        )
    }
}

/// In-memory statistics for every user seen since start.
#[derive(Debug, Default)]
pub struct TransferStatsManager {
    stats: RwLock<HashMap<String, UserTransferStats>>,
}

impl TransferStatsManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_stats(&self, username: &str) -> Option<UserTransferStats> {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .cloned()
    }

    fn update(&self, username: &str, apply: impl FnOnce(&mut UserTransferStats)) {
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        let entry = stats
            .entry(username.to_string())
            .or_insert_with(|| UserTransferStats::new(username));
        apply(entry);
        debug!("Stats for {}: {}", username, entry.format_stats());
    }
}

impl StatsSink for TransferStatsManager {
    fn record_download(&self, username: &str, kilobytes: u64, milliseconds: u64) {
        self.update(username, |s| s.record_download(kilobytes, milliseconds));
    }

    fn record_upload(&self, username: &str, kilobytes: u64, milliseconds: u64) {
        self.update(username, |s| s.record_upload(kilobytes, milliseconds));
    }
}
