//! Progress events emitted by the orchestrator while it scans and cleans

use std::path::PathBuf;

/// Real-time updates, one location at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A location's scan has started.
    ScanStarted {
        name: String,
        index: usize,
        total: usize,
        paths: Vec<PathBuf>,
    },

    /// A location's scan has finished.
    ScanFinished {
        name: String,
        exists: bool,
        total_bytes: u64,
        file_count: u64,
    },

    /// Cleanup of a location has started.
    CleanupStarted {
        name: String,
        index: usize,
        total: usize,
    },

    /// Cleanup of a location has finished or was refused.
    CleanupFinished {
        name: String,
        success: bool,
        freed_bytes: u64,
        deleted_file_count: u64,
    },

    /// The run stopped before this location because of a user interrupt.
    Cancelled { next: String },
}

impl ProgressEvent {
    pub fn location(&self) -> &str {
        match self {
            ProgressEvent::ScanStarted { name, .. }
            | ProgressEvent::ScanFinished { name, .. }
            | ProgressEvent::CleanupStarted { name, .. }
            | ProgressEvent::CleanupFinished { name, .. } => name,
            ProgressEvent::Cancelled { next } => next,
        }
    }
}
