//! tempsweep library crate
//!
//! The scan/clean engine behind the `tempsweep` binary: a static catalog of
//! disposable-data locations, a size scanner, and a cleanup executor that
//! stops services or checks running processes before deleting anything.

pub mod catalog;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod prompt;
pub mod report;
pub mod resolver;
pub mod scan_events;
pub mod scanner;
pub mod system;
pub mod theme;
pub mod utils;
