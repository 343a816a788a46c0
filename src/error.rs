//! Error and refusal types
//!
//! Refusals are expected outcomes: a location that may not be cleaned right
//! now is reported with a reason and the run moves on. `SystemError` covers
//! failures of the external tools we shell out to, and `RunError` covers
//! misuse of the scan/clean state machine.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Why a location was not cleaned. Nothing on disk is touched once one of
/// these is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Refusal {
    #[error("not safe to delete")]
    NotSafeToDelete,

    #[error("requires elevated privileges")]
    RequiresElevation,

    #[error("display only")]
    DisplayOnly,

    #[error("component store maintenance only")]
    MaintenanceOnly,

    #[error("processes running: {}", .processes.join(", "))]
    ProcessesRunning { processes: Vec<String> },

    #[error("could not stop service '{service}': {reason}")]
    ServiceStopFailed { service: String, reason: String },

    #[error("could not take ownership of {}: {reason}", .path.display())]
    OwnershipFailed { path: PathBuf, reason: String },

    #[error("could not stop '{process}': {reason}")]
    ShellStopFailed { process: String, reason: String },

    #[error("path does not exist")]
    NothingToDelete,
}

/// Failure of an external collaborator (service control, ownership tools,
/// component store maintenance, process enumeration).
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed: {details}")]
    CommandFailed { command: String, details: String },

    #[error("{command} timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("{operation} is not supported on this platform")]
    Unsupported { operation: &'static str },
}

impl SystemError {
    /// True for a maintenance run that hit its wall-clock budget.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SystemError::Timeout { .. })
    }
}

/// Misuse of the orchestrator's scan/select/delete sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("unknown location '{0}'")]
    UnknownLocation(String),

    #[error("location '{0}' has no scan result from this run")]
    NotScanned(String),

    #[error("no locations selected")]
    EmptySelection,

    #[error("run cancelled by user")]
    Cancelled,
}
