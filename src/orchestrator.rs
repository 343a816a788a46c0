//! Scan/cleanup orchestration
//!
//! Drives the catalog through one run:
//! `Idle -> Scanning -> Scanned -> ConfirmingSelection -> Deleting -> Done`.
//! The orchestrator owns the scan result table for the run. Deletion only ever
//! touches the paths stored in that table, never freshly resolved ones, so
//! what gets deleted is exactly what the user confirmed.

use crate::catalog::{self, Category, LocationDescriptor, Priority};
use crate::cleaner::{CleanOptions, Cleaner, DeletionOutcome, FileRemover};
use crate::error::{Refusal, RunError};
use crate::resolver::{PathExpander, Resolver};
use crate::scan_events::ProgressEvent;
use crate::scanner;
use crate::system::{Elevation, SystemOps};
use crate::utils;
use chrono::{DateTime, Local};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Scanning,
    Scanned,
    ConfirmingSelection,
    Deleting,
    Done,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Scanning => "scanning",
            RunState::Scanned => "scanned",
            RunState::ConfirmingSelection => "confirming selection",
            RunState::Deleting => "deleting",
            RunState::Done => "done",
        }
    }
}

/// Scan outcome for one location. Superseded by the next scan, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub name: String,
    pub category: Category,
    pub priority: Priority,
    pub safe_delete: bool,
    pub requires_admin: bool,
    pub method: &'static str,
    pub resolved_paths: Vec<PathBuf>,
    /// At least one resolved path exists. When false, both totals are 0.
    pub exists: bool,
    pub total_bytes: u64,
    pub file_count: u64,
    pub errors: Vec<String>,
    /// Not measured because the admin gate failed
    pub skipped: bool,
}

impl ScanResult {
    /// Whether this result can be offered for deletion
    pub fn is_deletable(&self) -> bool {
        self.exists && self.safe_delete && !self.skipped && self.total_bytes > 0
    }

    pub fn size_human(&self) -> String {
        bytesize::to_string(self.total_bytes, true)
    }
}

/// Everything a renderer needs about one scan pass
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub generated_at: DateTime<Local>,
    pub elevated: bool,
    pub total_bytes: u64,
    pub total_files: u64,
    pub locations_scanned: usize,
    pub results: Vec<ScanResult>,
}

impl ScanReport {
    pub fn deletable_bytes(&self) -> u64 {
        self.results
            .iter()
            .filter(|r| r.is_deletable())
            .map(|r| r.total_bytes)
            .sum()
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().map(|r| r.errors.len()).sum()
    }
}

/// Aggregate of one deletion pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupSummary {
    pub outcomes: Vec<DeletionOutcome>,
    pub freed_bytes: u64,
    pub deleted_file_count: u64,
    /// The run was interrupted before every selected location was processed
    pub cancelled: bool,
    pub dry_run: bool,
}

impl CleanupSummary {
    fn add(&mut self, outcome: DeletionOutcome) {
        self.freed_bytes += outcome.freed_bytes;
        self.deleted_file_count += outcome.deleted_file_count;
        self.outcomes.push(outcome);
    }

    pub fn refused(&self) -> impl Iterator<Item = &DeletionOutcome> {
        self.outcomes.iter().filter(|o| o.refusal.is_some())
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.errors.len()).sum()
    }
}

/// Knobs that come from configuration and command-line flags
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub clean: CleanOptions,
    /// Scan independent locations on the rayon pool
    pub parallel: bool,
    /// Location names left out of scan and clean
    pub excluded: Vec<String>,
    pub dry_run: bool,
}

pub struct Orchestrator<'a> {
    system: &'a dyn SystemOps,
    expander: &'a dyn PathExpander,
    remover: Option<&'a dyn FileRemover>,
    elevation: Elevation,
    locations: Vec<LocationDescriptor>,
    options: RunOptions,
    state: RunState,
    results: Vec<ScanResult>,
    index: HashMap<String, usize>,
    selection: Vec<String>,
    cancel: Arc<AtomicBool>,
    events: Option<Sender<ProgressEvent>>,
}

impl<'a> Orchestrator<'a> {
    /// New run over the full catalog
    pub fn new(system: &'a dyn SystemOps, expander: &'a dyn PathExpander, elevation: Elevation) -> Self {
        Self {
            system,
            expander,
            remover: None,
            elevation,
            locations: catalog::all().to_vec(),
            options: RunOptions::default(),
            state: RunState::Idle,
            results: Vec::new(),
            index: HashMap::new(),
            selection: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            events: None,
        }
    }

    /// Restrict the run to these locations (in this order)
    pub fn with_locations(mut self, locations: Vec<LocationDescriptor>) -> Self {
        self.locations = locations;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_remover(mut self, remover: &'a dyn FileRemover) -> Self {
        self.remover = Some(remover);
        self
    }

    /// Share a flag that, once set, stops the run before its next location
    pub fn with_cancel_token(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: Sender<ProgressEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the event channel; `None` drops the current sender
    pub fn set_events(&mut self, events: Option<Sender<ProgressEvent>>) {
        self.events = events;
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn elevation(&self) -> Elevation {
        self.elevation
    }

    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Scan every non-excluded location, replacing any earlier results.
    ///
    /// A location whose admin gate fails still gets a result, marked skipped.
    pub fn scan(&mut self) -> Result<&[ScanResult], RunError> {
        if matches!(self.state, RunState::Scanning | RunState::Deleting) {
            return Err(self.invalid("scan"));
        }
        self.state = RunState::Scanning;
        self.selection.clear();

        let targets: Vec<&LocationDescriptor> = self
            .locations
            .iter()
            .filter(|loc| !self.options.excluded.iter().any(|name| name == &loc.name))
            .collect();
        let total = targets.len();
        let resolver = Resolver::new(self.expander);
        let elevation = self.elevation;
        let events = self.events.as_ref();

        let results: Vec<ScanResult> = if self.options.parallel {
            let cancel = &self.cancel;
            let scanned: Vec<Option<ScanResult>> = targets
                .par_iter()
                .enumerate()
                .map(|(i, loc)| {
                    if cancel.load(Ordering::SeqCst) {
                        None
                    } else {
                        Some(scan_location(loc, &resolver, elevation, i, total, events))
                    }
                })
                .collect();
            if let Some(skipped) = scanned.iter().position(Option::is_none) {
                emit(events, ProgressEvent::Cancelled { next: targets[skipped].name.clone() });
                self.state = RunState::Done;
                return Err(RunError::Cancelled);
            }
            scanned.into_iter().flatten().collect()
        } else {
            let mut results = Vec::with_capacity(total);
            for (i, loc) in targets.iter().enumerate() {
                if self.cancel.load(Ordering::SeqCst) {
                    emit(events, ProgressEvent::Cancelled { next: loc.name.clone() });
                    self.state = RunState::Done;
                    return Err(RunError::Cancelled);
                }
                results.push(scan_location(loc, &resolver, elevation, i, total, events));
            }
            results
        };

        self.index = results
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        self.results = results;
        self.state = RunState::Scanned;
        tracing::info!("scanned {} locations", self.results.len());
        Ok(&self.results)
    }

    /// Results of the latest scan, in catalog order
    pub fn results(&self) -> &[ScanResult] {
        &self.results
    }

    pub fn result(&self, name: &str) -> Option<&ScanResult> {
        self.index.get(name).map(|&i| &self.results[i])
    }

    /// Deletable results, largest first
    pub fn deletable(&self) -> Vec<&ScanResult> {
        let mut deletable: Vec<&ScanResult> = self.results.iter().filter(|r| r.is_deletable()).collect();
        deletable.sort_by(|a, b| b.total_bytes.cmp(&a.total_bytes));
        deletable
    }

    pub fn report(&self) -> ScanReport {
        ScanReport {
            generated_at: Local::now(),
            elevated: self.elevation.is_elevated(),
            total_bytes: self.results.iter().map(|r| r.total_bytes).sum(),
            total_files: self.results.iter().map(|r| r.file_count).sum(),
            locations_scanned: self.results.len(),
            results: self.results.clone(),
        }
    }

    /// Choose which scanned locations to clean.
    ///
    /// Every name must have a result from this run's scan.
    pub fn select<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), RunError> {
        if !matches!(self.state, RunState::Scanned | RunState::ConfirmingSelection) {
            return Err(self.invalid("select locations"));
        }
        if names.is_empty() {
            return Err(RunError::EmptySelection);
        }

        let mut selection = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if !self.index.contains_key(name) {
                return Err(if self.locations.iter().any(|loc| loc.name == name) {
                    RunError::NotScanned(name.to_string())
                } else {
                    RunError::UnknownLocation(name.to_string())
                });
            }
            if !selection.iter().any(|s: &String| s == name) {
                selection.push(name.to_string());
            }
        }

        self.selection = selection;
        self.state = RunState::ConfirmingSelection;
        Ok(())
    }

    /// Select every deletable location
    pub fn select_all(&mut self) -> Result<(), RunError> {
        let names: Vec<String> = self.deletable().iter().map(|r| r.name.clone()).collect();
        self.select(names.as_slice())
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    /// Clean the selected locations one after another.
    ///
    /// A refusal or partial failure in one location never stops the others.
    /// A set cancel flag stops the run before the next location starts;
    /// locations already processed keep their effects.
    pub fn delete_selected(&mut self) -> Result<CleanupSummary, RunError> {
        if self.state != RunState::ConfirmingSelection {
            return Err(self.invalid("delete"));
        }
        self.state = RunState::Deleting;

        let mut cleaner = Cleaner::new(self.system, self.elevation).with_options(self.options.clean);
        if let Some(remover) = self.remover {
            cleaner = cleaner.with_remover(remover);
        }

        let mut summary = CleanupSummary {
            dry_run: self.options.dry_run,
            ..Default::default()
        };
        let total = self.selection.len();

        for (i, name) in self.selection.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::warn!("cleanup interrupted before {}", name);
                emit(self.events.as_ref(), ProgressEvent::Cancelled { next: name.clone() });
                summary.cancelled = true;
                break;
            }
            emit(
                self.events.as_ref(),
                ProgressEvent::CleanupStarted {
                    name: name.clone(),
                    index: i,
                    total,
                },
            );

            let result = &self.results[self.index[name]];
            let outcome = match self.locations.iter().find(|loc| &loc.name == name) {
                None => DeletionOutcome::refused(name, Refusal::NothingToDelete),
                Some(_) if !result.exists => DeletionOutcome::refused(name, Refusal::NothingToDelete),
                Some(location) if self.options.dry_run => cleaner.preview(location, &result.resolved_paths),
                Some(location) => cleaner.delete(location, &result.resolved_paths),
            };

            emit(
                self.events.as_ref(),
                ProgressEvent::CleanupFinished {
                    name: name.clone(),
                    success: outcome.success,
                    freed_bytes: outcome.freed_bytes,
                    deleted_file_count: outcome.deleted_file_count,
                },
            );
            summary.add(outcome);
        }

        self.state = RunState::Done;
        Ok(summary)
    }

    fn invalid(&self, action: &'static str) -> RunError {
        RunError::InvalidTransition {
            action,
            state: self.state.as_str(),
        }
    }
}

fn scan_location(
    location: &LocationDescriptor,
    resolver: &Resolver<'_>,
    elevation: Elevation,
    index: usize,
    total: usize,
    events: Option<&Sender<ProgressEvent>>,
) -> ScanResult {
    let resolved_paths = resolver.resolve(location);
    emit(
        events,
        ProgressEvent::ScanStarted {
            name: location.name.clone(),
            index,
            total,
            paths: resolved_paths.clone(),
        },
    );

    let exists = resolved_paths
        .iter()
        .any(|p| utils::safe_symlink_metadata(p).is_ok());
    let mut result = ScanResult {
        name: location.name.clone(),
        category: location.category,
        priority: location.priority,
        // Maintenance-only locations are never offered for deletion
        safe_delete: location.safe_delete && location.method.deletes_files(),
        requires_admin: location.requires_admin,
        method: location.method.as_str(),
        resolved_paths,
        exists,
        total_bytes: 0,
        file_count: 0,
        errors: Vec::new(),
        skipped: false,
    };

    if location.requires_admin && !elevation.is_elevated() {
        tracing::debug!("skipping {}: not elevated", location.name);
        result.skipped = true;
        result.errors.push(Refusal::RequiresElevation.to_string());
    } else if exists {
        let scan = if location.is_file {
            scanner::scan_files(&result.resolved_paths)
        } else {
            scanner::scan_paths(&result.resolved_paths)
        };
        result.total_bytes = scan.total_bytes;
        result.file_count = scan.file_count;
        result.errors = scan.errors;
    }

    emit(
        events,
        ProgressEvent::ScanFinished {
            name: result.name.clone(),
            exists: result.exists,
            total_bytes: result.total_bytes,
            file_count: result.file_count,
        },
    );
    result
}

fn emit(events: Option<&Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is watching
        let _ = tx.send(event);
    }
}
