use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Download,
    Upload,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Download => "download",
            Direction::Upload => "upload",
        }
    }
}

/// Representation type selected with `TYPE`. ASCII is the RFC 959 default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    #[default]
    Ascii,
    Binary,
}

impl DataType {
    pub fn label(&self) -> &'static str {
        match self {
            DataType::Ascii => "ASCII",
            DataType::Binary => "BINARY",
        }
    }
}

/// Lifecycle of one transfer. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransferPhase {
    Idle,
    SlotPending,
    SlotHeld,
    SourceOpen,
    Announced,
    DataOpen,
    Streaming,
    Completed,
    Aborted,
}

impl TransferPhase {
    pub fn advance(&mut self, next: TransferPhase) {
        assert!(
            next > *self,
            "transfer phase {:?} cannot follow {:?}",
            next,
            self
        );
        *self = next;
    }
}

/// Byte count and timing of one active transfer.
#[derive(Debug, Clone)]
pub struct TransferState {
    bytes: u64,
    start: Instant,
    end: Option<Instant>,
}

impl TransferState {
    pub fn new() -> Self {
        Self {
            bytes: 0,
            start: Instant::now(),
            end: None,
        }
    }

    pub fn update(&mut self, len: usize) {
        self.bytes += len as u64;
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Time since the transfer started, or its total duration once closed.
    pub fn elapsed(&self) -> Duration {
        match self.end {
            Some(end) => end.duration_since(self.start),
            None => self.start.elapsed(),
        }
    }

    /// Records the end time. Later calls keep the first value.
    pub fn close(&mut self) -> Duration {
        if self.end.is_none() {
            self.end = Some(Instant::now());
        }
        self.elapsed()
    }
}

impl Default for TransferState {
    fn default() -> Self {
        Self::new()
    }
}
