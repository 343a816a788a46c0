//! Cleanup history for audit trails
//!
//! Every cleanup run writes one JSON log with a record per location:
//! what was freed, how many files went, and why a location was refused.
//! Deletions are permanent, so the log is the only trace of what happened.

use crate::cleaner::DeletionOutcome;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Record of one location's cleanup
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LocationRecord {
    /// When the location finished
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub deleted_files: u64,
    pub freed_bytes: u64,
    pub success: bool,
    /// Refusal reason when nothing was touched
    pub refusal: Option<String>,
    /// Files that could not be removed
    pub errors: Vec<String>,
}

impl From<&DeletionOutcome> for LocationRecord {
    fn from(outcome: &DeletionOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            location: outcome.name.clone(),
            deleted_files: outcome.deleted_file_count,
            freed_bytes: outcome.freed_bytes,
            success: outcome.success,
            refusal: outcome.refusal.as_ref().map(|r| r.to_string()),
            errors: outcome.errors.clone(),
        }
    }
}

/// Log of all locations cleaned in a session
#[derive(Serialize, Deserialize, Debug)]
pub struct CleanupLog {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub session_start: DateTime<Utc>,
    pub records: Vec<LocationRecord>,
    pub total_bytes_freed: u64,
    pub total_files_deleted: u64,
    /// Locations refused before any file was touched
    pub refused: usize,
    /// The run stopped early on user request
    pub cancelled: bool,
}

impl Default for CleanupLog {
    fn default() -> Self {
        Self::new()
    }
}

impl CleanupLog {
    pub fn new() -> Self {
        Self {
            session_start: Utc::now(),
            records: Vec::new(),
            total_bytes_freed: 0,
            total_files_deleted: 0,
            refused: 0,
            cancelled: false,
        }
    }

    pub fn add_record(&mut self, record: LocationRecord) {
        self.total_bytes_freed += record.freed_bytes;
        self.total_files_deleted += record.deleted_files;
        if !record.success {
            self.refused += 1;
        }
        self.records.push(record);
    }

    pub fn log_outcome(&mut self, outcome: &DeletionOutcome) {
        self.add_record(LocationRecord::from(outcome));
    }

    /// Save into the history directory, returning the file path
    pub fn save(&self) -> Result<PathBuf> {
        self.save_to(&get_history_dir()?)
    }

    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        let filename = format!("cleanup_{}.json", self.session_start.format("%Y%m%d_%H%M%S"));
        let log_path = dir.join(filename);

        let json = serde_json::to_string_pretty(self).context("Failed to serialize cleanup log")?;
        fs::write(&log_path, json)
            .with_context(|| format!("Failed to write cleanup log to {}", log_path.display()))?;

        Ok(log_path)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} locations cleaned, {} files ({}), {} refused",
            self.records.len() - self.refused,
            self.total_files_deleted,
            bytesize::to_string(self.total_bytes_freed, true),
            self.refused
        )
    }
}

/// History directory under the user's data dir, created on demand
pub fn get_history_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "tempsweep").context("Failed to determine data directory")?;
    let history_dir = dirs.data_local_dir().join("history");

    if !history_dir.exists() {
        fs::create_dir_all(&history_dir)
            .with_context(|| format!("Failed to create history directory: {}", history_dir.display()))?;
    }

    Ok(history_dir)
}

/// All logs, newest first
pub fn list_logs() -> Result<Vec<PathBuf>> {
    list_logs_in(&get_history_dir()?)
}

pub fn list_logs_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut logs: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read history directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();

    // File names carry the timestamp
    logs.sort();
    logs.reverse();

    Ok(logs)
}

pub fn load_log(path: &Path) -> Result<CleanupLog> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read log file: {}", path.display()))?;

    serde_json::from_str(&content).with_context(|| format!("Failed to parse log file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Refusal;
    use chrono::TimeZone;

    fn outcome(name: &str, files: u64, bytes: u64) -> DeletionOutcome {
        DeletionOutcome {
            name: name.to_string(),
            success: true,
            deleted_file_count: files,
            freed_bytes: bytes,
            ..Default::default()
        }
    }

    #[test]
    fn test_record_from_refusal() {
        let refused = DeletionOutcome::refused(
            "Chrome Cache",
            Refusal::ProcessesRunning {
                processes: vec!["chrome.exe".to_string()],
            },
        );
        let record = LocationRecord::from(&refused);
        assert!(!record.success);
        assert_eq!(record.refusal.as_deref(), Some("processes running: chrome.exe"));
    }

    #[test]
    fn test_log_totals() {
        let mut log = CleanupLog::new();
        log.log_outcome(&outcome("A", 3, 3000));
        log.log_outcome(&outcome("B", 1, 500));
        log.log_outcome(&DeletionOutcome::refused("C", Refusal::RequiresElevation));

        assert_eq!(log.records.len(), 3);
        assert_eq!(log.total_bytes_freed, 3500);
        assert_eq!(log.total_files_deleted, 4);
        assert_eq!(log.refused, 1);
        assert!(log.summary().starts_with("2 locations cleaned, 4 files"));
        assert!(log.summary().ends_with("1 refused"));
    }

    #[test]
    fn test_save_list_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut older = CleanupLog::new();
        older.session_start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        older.log_outcome(&outcome("A", 1, 10));
        let mut newer = CleanupLog::new();
        newer.session_start = Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap();
        newer.cancelled = true;

        older.save_to(temp_dir.path()).unwrap();
        newer.save_to(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let logs = list_logs_in(temp_dir.path()).unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].ends_with("cleanup_20240201_100000.json"));

        let loaded = load_log(&logs[1]).unwrap();
        assert_eq!(loaded.records, older.records_with_second_precision());
        assert!(load_log(&logs[0]).unwrap().cancelled);
    }

    impl CleanupLog {
        /// Timestamps are stored with second precision
        fn records_with_second_precision(&self) -> Vec<LocationRecord> {
            self.records
                .iter()
                .map(|r| LocationRecord {
                    timestamp: Utc.timestamp_opt(r.timestamp.timestamp(), 0).unwrap(),
                    ..r.clone()
                })
                .collect()
        }
    }
}
