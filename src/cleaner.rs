use crate::catalog::{CleanupMethod, LocationDescriptor};
use crate::error::{Refusal, SystemError};
use crate::resolver;
use crate::scanner;
use crate::system::{Elevation, SystemOps};
use crate::utils;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use walkdir::WalkDir;

/// Removes files and directories. The cleaner never touches the disk
/// directly, which lets tests simulate locked files.
pub trait FileRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    /// Remove an empty directory; fails on non-empty ones.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// `std::fs` with long-path support
#[derive(Debug, Default, Clone, Copy)]
pub struct StdRemover;

impl FileRemover for StdRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        match utils::safe_remove_file(path) {
            #[cfg(windows)]
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                // Read-only attribute blocks deletion on Windows
                let meta = utils::safe_symlink_metadata(path)?;
                let mut perms = meta.permissions();
                if !perms.readonly() {
                    return Err(e);
                }
                perms.set_readonly(false);
                std::fs::set_permissions(path, perms)?;
                utils::safe_remove_file(path)
            }
            other => other,
        }
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        utils::safe_remove_dir(path)
    }
}

/// Bounded retry for files that are briefly locked by another process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per file, between 1 and `MAX_ATTEMPTS`
    pub attempts: u32,
    pub delay: Duration,
    /// Double the delay after every failed attempt
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(100),
            exponential: false,
        }
    }
}

impl RetryPolicy {
    /// Upper bound on attempts per file
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Keep `attempts` within `1..=MAX_ATTEMPTS`
    pub fn clamp_attempts(attempts: u32) -> u32 {
        attempts.clamp(1, Self::MAX_ATTEMPTS)
    }

    /// Pause after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.exponential {
            self.delay * 2u32.saturating_pow(attempt.saturating_sub(1))
        } else {
            self.delay
        }
    }
}

/// Result of one cleanup attempt on one location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    pub name: String,
    /// False only when the location was refused before any file was touched
    pub success: bool,
    pub deleted_file_count: u64,
    pub freed_bytes: u64,
    /// Per-file failures and restart problems; these do not clear `success`
    pub errors: Vec<String>,
    pub refusal: Option<Refusal>,
    /// Counts are what would have been deleted; nothing was removed
    pub dry_run: bool,
}

impl DeletionOutcome {
    pub fn refused(name: &str, refusal: Refusal) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            refusal: Some(refusal),
            ..Default::default()
        }
    }
}

/// Result of a component store maintenance run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceOutcome {
    pub success: bool,
    pub timed_out: bool,
    pub message: String,
}

/// What has to be put back once the files are gone
enum Restore {
    Service(String),
    Process(String),
}

enum FileResult {
    Deleted(u64),
    /// A symlink or other non-regular entry; removed but not counted
    Unlinked,
    Vanished,
    Failed(String),
}

/// Options that shape how a location's tree is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanOptions {
    pub retry: RetryPolicy,
    /// Remove subdirectories left empty after their files are deleted
    pub prune_empty_dirs: bool,
    /// Also remove the location's own directory when it ends up empty
    pub remove_empty_root: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            prune_empty_dirs: true,
            remove_empty_root: true,
        }
    }
}

pub struct Cleaner<'a> {
    system: &'a dyn SystemOps,
    remover: &'a dyn FileRemover,
    elevation: Elevation,
    options: CleanOptions,
}

impl<'a> Cleaner<'a> {
    pub fn new(system: &'a dyn SystemOps, elevation: Elevation) -> Self {
        Self {
            system,
            remover: &StdRemover,
            elevation,
            options: CleanOptions::default(),
        }
    }

    pub fn with_remover(mut self, remover: &'a dyn FileRemover) -> Self {
        self.remover = remover;
        self
    }

    pub fn with_options(mut self, options: CleanOptions) -> Self {
        self.options = options;
        self.options.retry.attempts = RetryPolicy::clamp_attempts(self.options.retry.attempts);
        self
    }

    pub fn elevation(&self) -> Elevation {
        self.elevation
    }

    /// Delete everything under `paths` for `location`.
    ///
    /// `paths` must come from this run's scan of the same location. The
    /// sequence is: static gates, running-process check, service stop or
    /// shell stop or ownership, file removal, then restart of whatever was
    /// stopped. A refusal in the first steps returns before any file is touched.
    pub fn delete(&self, location: &LocationDescriptor, paths: &[PathBuf]) -> DeletionOutcome {
        if let Err(refusal) = self.precheck(location) {
            tracing::warn!("refusing {}: {}", location.name, refusal);
            return DeletionOutcome::refused(&location.name, refusal);
        }

        let restore = match self.prepare(location, paths) {
            Ok(restore) => restore,
            Err(refusal) => {
                tracing::warn!("refusing {}: {}", location.name, refusal);
                return DeletionOutcome::refused(&location.name, refusal);
            }
        };

        let mut outcome = DeletionOutcome {
            name: location.name.clone(),
            success: true,
            ..Default::default()
        };
        for path in paths {
            self.delete_path(path, location.is_file, &mut outcome);
        }

        if let Some(restore) = restore {
            self.restore(restore, &mut outcome);
        }

        tracing::info!(
            "{}: deleted {} files, freed {} bytes, {} errors",
            location.name,
            outcome.deleted_file_count,
            outcome.freed_bytes,
            outcome.errors.len()
        );
        outcome
    }

    /// Run the side-effect-free checks and report what `delete` would remove
    pub fn preview(&self, location: &LocationDescriptor, paths: &[PathBuf]) -> DeletionOutcome {
        if let Err(refusal) = self.precheck(location) {
            return DeletionOutcome::refused(&location.name, refusal);
        }
        let scan = if location.is_file {
            scanner::scan_files(paths)
        } else {
            scanner::scan_paths(paths)
        };
        DeletionOutcome {
            name: location.name.clone(),
            success: true,
            deleted_file_count: scan.file_count,
            freed_bytes: scan.total_bytes,
            errors: scan.errors,
            refusal: None,
            dry_run: true,
        }
    }

    /// Whole-store compaction of the Windows component store.
    ///
    /// Independent of any resolved paths. A timeout is reported as a
    /// failure and is not retried.
    pub fn compact_component_store(&self, aggressive: bool, timeout: Duration) -> MaintenanceOutcome {
        if !self.elevation.is_elevated() {
            return MaintenanceOutcome {
                success: false,
                timed_out: false,
                message: Refusal::RequiresElevation.to_string(),
            };
        }

        tracing::info!("starting component store cleanup (aggressive: {})", aggressive);
        match self.system.compact_component_store(aggressive, timeout) {
            Ok(()) => MaintenanceOutcome {
                success: true,
                timed_out: false,
                message: "Component store cleanup completed".to_string(),
            },
            Err(e) => MaintenanceOutcome {
                success: false,
                timed_out: e.is_timeout(),
                message: e.to_string(),
            },
        }
    }

    /// Steps without side effects: gates, method, running processes
    fn precheck(&self, location: &LocationDescriptor) -> Result<(), Refusal> {
        resolver::check_gates(location, self.elevation)?;

        match location.method {
            CleanupMethod::DisplayOnly => return Err(Refusal::DisplayOnly),
            CleanupMethod::ComponentStore => return Err(Refusal::MaintenanceOnly),
            _ => {}
        }

        let blockers = location.process_check();
        if !blockers.is_empty() {
            let running = self.system.running_processes_among(blockers);
            if !running.is_empty() {
                return Err(Refusal::ProcessesRunning { processes: running });
            }
        }
        Ok(())
    }

    /// Stop whatever holds the files open. On refusal nothing is left stopped.
    fn prepare(&self, location: &LocationDescriptor, paths: &[PathBuf]) -> Result<Option<Restore>, Refusal> {
        match &location.method {
            CleanupMethod::StopService { service } => {
                match self.system.stop_service(service) {
                    Ok(change) => {
                        tracing::info!("stopped service {} ({:?})", service, change);
                        Ok(Some(Restore::Service(service.clone())))
                    }
                    Err(e) => Err(Refusal::ServiceStopFailed {
                        service: service.clone(),
                        reason: e.to_string(),
                    }),
                }
            }
            CleanupMethod::RestartShell { process } => match self.system.terminate_process(process) {
                Ok(()) => {
                    tracing::info!("stopped {}", process);
                    Ok(Some(Restore::Process(process.clone())))
                }
                Err(e) => Err(Refusal::ShellStopFailed {
                    process: process.clone(),
                    reason: e.to_string(),
                }),
            },
            CleanupMethod::TakeOwnership | CleanupMethod::Elevated => {
                for path in paths.iter().filter(|p| p.exists()) {
                    self.system
                        .take_ownership(path)
                        .map_err(|e| Refusal::OwnershipFailed {
                            path: path.clone(),
                            reason: e.to_string(),
                        })?;
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn restore(&self, restore: Restore, outcome: &mut DeletionOutcome) {
        let (what, result): (String, Result<(), SystemError>) = match restore {
            Restore::Service(service) => {
                let result = self.system.start_service(&service).map(|_| ());
                (format!("service '{service}'"), result)
            }
            Restore::Process(process) => {
                let result = self.system.launch_process(&process);
                (format!("'{process}'"), result)
            }
        };

        match result {
            Ok(()) => tracing::info!("restarted {}", what),
            Err(e) => {
                tracing::error!("failed to restart {}: {}", what, e);
                outcome.errors.push(format!("Failed to restart {}: {}", what, e));
            }
        }
    }

    fn delete_path(&self, path: &Path, expect_file: bool, outcome: &mut DeletionOutcome) {
        let meta = match utils::safe_symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => {
                outcome
                    .errors
                    .push(format!("Error at {}: {}", utils::display_path(path), e));
                return;
            }
        };

        if meta.is_dir() && expect_file {
            outcome.errors.push(scanner::unexpected_directory(path));
        } else if meta.is_dir() {
            self.delete_tree(path, outcome);
        } else {
            self.record(self.delete_file(path), outcome);
        }
    }

    /// Files first, then each directory once its contents are done
    fn delete_tree(&self, root: &Path, outcome: &mut DeletionOutcome) {
        let walker = WalkDir::new(root)
            .min_depth(1)
            .contents_first(true)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !utils::is_windows_reparse_point(e.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Entries removed by someone else mid-walk are fine
                    if e.io_error().map(|io| io.kind()) == Some(io::ErrorKind::NotFound) {
                        continue;
                    }
                    let at = e.path().unwrap_or(root);
                    outcome
                        .errors
                        .push(format!("Error at {}: {}", utils::display_path(at), e));
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                if self.options.prune_empty_dirs {
                    // Non-empty or locked directories stay
                    let _ = self.remover.remove_dir(entry.path());
                }
            } else {
                let result = self.delete_file(entry.path());
                self.record(result, outcome);
            }
        }

        if self.options.prune_empty_dirs && self.options.remove_empty_root {
            let _ = self.remover.remove_dir(root);
        }
    }

    fn delete_file(&self, path: &Path) -> FileResult {
        let attempts = self.options.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = utils::safe_symlink_metadata(path)
                .and_then(|meta| self.remover.remove_file(path).map(|()| meta));

            match result {
                Ok(meta) if meta.is_file() => return FileResult::Deleted(meta.len()),
                Ok(_) => return FileResult::Unlinked,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return FileResult::Vanished,
                Err(e) if attempt < attempts => {
                    let pause = self.options.retry.delay_after(attempt);
                    tracing::debug!(
                        "attempt {}/{} on {} failed ({}), retrying in {:?}",
                        attempt,
                        attempts,
                        path.display(),
                        e,
                        pause
                    );
                    thread::sleep(pause);
                    attempt += 1;
                }
                Err(e) => return FileResult::Failed(describe_failure(path, &e)),
            }
        }
    }

    fn record(&self, result: FileResult, outcome: &mut DeletionOutcome) {
        match result {
            FileResult::Deleted(size) => {
                outcome.deleted_file_count += 1;
                outcome.freed_bytes += size;
            }
            FileResult::Unlinked | FileResult::Vanished => {}
            FileResult::Failed(message) => outcome.errors.push(message),
        }
    }
}

fn describe_failure(path: &Path, e: &io::Error) -> String {
    let shown = utils::display_path(path);
    if utils::is_lock_error(e) {
        format!("Locked by another process: {shown}")
    } else if e.kind() == io::ErrorKind::PermissionDenied {
        format!("Access denied: {shown}")
    } else {
        format!("Could not delete {shown}: {e}")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::{Category, Priority};
    use crate::system::{ComponentStoreAnalysis, ServiceChange};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Scriptable stand-in for the operating system that records every call
    #[derive(Default)]
    pub(crate) struct FakeSystem {
        pub running: Vec<String>,
        pub stop_fails: bool,
        pub start_fails: bool,
        pub ownership_fails: bool,
        pub terminate_fails: bool,
        pub compaction: Option<fn() -> Result<(), SystemError>>,
        pub calls: RefCell<Vec<String>>,
    }

    impl FakeSystem {
        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn log(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl SystemOps for FakeSystem {
        fn is_elevated(&self) -> bool {
            false
        }

        fn running_processes_among(&self, names: &[String]) -> Vec<String> {
            self.log(format!("query {}", names.join(",")));
            names
                .iter()
                .filter(|n| self.running.iter().any(|r| r.eq_ignore_ascii_case(n)))
                .cloned()
                .collect()
        }

        fn stop_service(&self, name: &str) -> Result<ServiceChange, SystemError> {
            self.log(format!("stop {name}"));
            if self.stop_fails {
                Err(SystemError::CommandFailed {
                    command: format!("net stop {name}"),
                    details: "access is denied".to_string(),
                })
            } else {
                Ok(ServiceChange::Changed)
            }
        }

        fn start_service(&self, name: &str) -> Result<ServiceChange, SystemError> {
            self.log(format!("start {name}"));
            if self.start_fails {
                Err(SystemError::CommandFailed {
                    command: format!("net start {name}"),
                    details: "service is disabled".to_string(),
                })
            } else {
                Ok(ServiceChange::Changed)
            }
        }

        fn take_ownership(&self, path: &Path) -> Result<(), SystemError> {
            self.log(format!("takeown {}", path.display()));
            if self.ownership_fails {
                Err(SystemError::CommandFailed {
                    command: "takeown".to_string(),
                    details: "denied".to_string(),
                })
            } else {
                Ok(())
            }
        }

        fn terminate_process(&self, name: &str) -> Result<(), SystemError> {
            self.log(format!("terminate {name}"));
            if self.terminate_fails {
                Err(SystemError::CommandFailed {
                    command: format!("terminate {name}"),
                    details: "denied".to_string(),
                })
            } else {
                Ok(())
            }
        }

        fn launch_process(&self, name: &str) -> Result<(), SystemError> {
            self.log(format!("launch {name}"));
            Ok(())
        }

        fn compact_component_store(&self, aggressive: bool, _timeout: Duration) -> Result<(), SystemError> {
            self.log(format!("compact {aggressive}"));
            self.compaction.map_or(Ok(()), |f| f())
        }

        fn analyze_component_store(&self, _timeout: Duration) -> Result<ComponentStoreAnalysis, SystemError> {
            Ok(ComponentStoreAnalysis::default())
        }
    }

    /// Fails every removal of files with the given names, counting attempts
    #[derive(Default)]
    pub(crate) struct LockingRemover {
        pub locked: Vec<String>,
        pub attempts: RefCell<HashMap<String, u32>>,
        pub dir_removals: Cell<u32>,
    }

    impl FileRemover for LockingRemover {
        fn remove_file(&self, path: &Path) -> io::Result<()> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            if self.locked.contains(&name) {
                *self.attempts.borrow_mut().entry(name).or_insert(0) += 1;
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "file is being used by another process",
                ));
            }
            fs::remove_file(path)
        }

        fn remove_dir(&self, path: &Path) -> io::Result<()> {
            self.dir_removals.set(self.dir_removals.get() + 1);
            fs::remove_dir(path)
        }
    }

    fn fast_options() -> CleanOptions {
        CleanOptions {
            retry: RetryPolicy {
                attempts: 3,
                delay: Duration::from_millis(1),
                exponential: false,
            },
            ..CleanOptions::default()
        }
    }

    fn location(dir: &Path) -> LocationDescriptor {
        LocationDescriptor::new("Test", dir.to_string_lossy(), Category::System, Priority::Medium)
    }

    fn fill(dir: &Path, files: &[(&str, usize)]) {
        for (name, size) in files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, vec![7u8; *size]).unwrap();
        }
    }

    fn test_dir() -> (TempDir, PathBuf) {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("target");
        fs::create_dir(&target).unwrap();
        (temp_dir, target)
    }

    #[test]
    fn test_delete_plain_directory() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("a.tmp", 1000), ("b.tmp", 1000), ("c.tmp", 1000)]);
        let system = FakeSystem::default();
        let cleaner = Cleaner::new(&system, Elevation::NotElevated).with_options(fast_options());

        let outcome = cleaner.delete(&location(&dir), &[dir.clone()]);

        assert!(outcome.success);
        assert_eq!(outcome.deleted_file_count, 3);
        assert_eq!(outcome.freed_bytes, 3000);
        assert!(outcome.errors.is_empty());
        assert!(!dir.exists());
    }

    #[test]
    fn test_delete_nested_tree_prunes_empty_dirs() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("x/y/z/deep.log", 10), ("x/one.log", 20), ("top.log", 30)]);
        let system = FakeSystem::default();
        let cleaner = Cleaner::new(&system, Elevation::NotElevated).with_options(fast_options());

        let outcome = cleaner.delete(&location(&dir), &[dir.clone()]);

        assert_eq!(outcome.deleted_file_count, 3);
        assert_eq!(outcome.freed_bytes, 60);
        assert!(!dir.join("x").exists());
    }

    #[test]
    fn test_keep_root_when_configured() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("sub/a", 5)]);
        let system = FakeSystem::default();
        let options = CleanOptions {
            remove_empty_root: false,
            ..fast_options()
        };
        let cleaner = Cleaner::new(&system, Elevation::NotElevated).with_options(options);

        cleaner.delete(&location(&dir), &[dir.clone()]);

        assert!(dir.exists());
        assert!(!dir.join("sub").exists());
    }

    #[test]
    fn test_locked_file_is_retried_then_reported() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("free1", 100), ("free2", 200), ("sub/locked.db", 400)]);
        let system = FakeSystem::default();
        let remover = LockingRemover {
            locked: vec!["locked.db".to_string()],
            ..Default::default()
        };
        let cleaner = Cleaner::new(&system, Elevation::NotElevated)
            .with_options(fast_options())
            .with_remover(&remover);

        let outcome = cleaner.delete(&location(&dir), &[dir.clone()]);

        assert!(outcome.success);
        assert_eq!(outcome.deleted_file_count, 2);
        assert_eq!(outcome.freed_bytes, 300);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("locked.db"));
        assert_eq!(remover.attempts.borrow().get("locked.db"), Some(&3));
        // Directories holding the locked file are left in place
        assert!(dir.join("sub").join("locked.db").exists());
    }

    #[test]
    fn test_retry_attempts_capped_at_three() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("locked.db", 10)]);
        let system = FakeSystem::default();
        let remover = LockingRemover {
            locked: vec!["locked.db".to_string()],
            ..Default::default()
        };
        let mut options = fast_options();
        options.retry.attempts = 10;
        let cleaner = Cleaner::new(&system, Elevation::NotElevated)
            .with_options(options)
            .with_remover(&remover);

        let outcome = cleaner.delete(&location(&dir), &[dir.clone()]);

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(remover.attempts.borrow().get("locked.db"), Some(&3));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_removed_but_not_counted() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("a.tmp", 100)]);
        std::os::unix::fs::symlink(dir.join("a.tmp"), dir.join("link")).unwrap();
        let system = FakeSystem::default();
        let cleaner = Cleaner::new(&system, Elevation::NotElevated).with_options(fast_options());

        let scan = scanner::scan_path(&dir);
        let outcome = cleaner.delete(&location(&dir), &[dir.clone()]);

        assert_eq!(outcome.deleted_file_count, scan.file_count);
        assert_eq!(outcome.freed_bytes, scan.total_bytes);
        assert_eq!(outcome.deleted_file_count, 1);
        assert_eq!(outcome.freed_bytes, 100);
        assert!(!dir.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdir_does_not_stop_deletion() {
        use std::os::unix::fs::PermissionsExt;

        if nix::unistd::geteuid().is_root() {
            return;
        }
        let (_guard, dir) = test_dir();
        fill(&dir, &[("a.tmp", 100), ("b.tmp", 50), ("locked/hidden.tmp", 999)]);
        let locked = dir.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        let system = FakeSystem::default();
        let cleaner = Cleaner::new(&system, Elevation::NotElevated).with_options(fast_options());

        let outcome = cleaner.delete(&location(&dir), &[dir.clone()]);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.deleted_file_count, 2);
        assert_eq!(outcome.freed_bytes, 150);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("locked"));
        assert!(locked.join("hidden.tmp").exists());
        assert!(!dir.join("a.tmp").exists());
    }

    #[test]
    fn test_file_location_leaves_directory_alone() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("CBS.log/inner.log", 30)]);
        let target = dir.join("CBS.log");
        let system = FakeSystem::default();
        let cleaner = Cleaner::new(&system, Elevation::NotElevated).with_options(fast_options());
        let loc = LocationDescriptor::new("CBS Log", target.to_string_lossy(), Category::Logs, Priority::Low).file();

        let outcome = cleaner.delete(&loc, &[target.clone()]);

        assert!(outcome.success);
        assert_eq!(outcome.deleted_file_count, 0);
        assert_eq!(outcome.errors.len(), 1);
        assert!(target.join("inner.log").exists());
    }

    #[test]
    fn test_single_file_location() {
        let (_guard, dir) = test_dir();
        let file = dir.join("MEMORY.DMP");
        fs::write(&file, vec![0u8; 2048]).unwrap();
        let system = FakeSystem::default();
        let cleaner = Cleaner::new(&system, Elevation::NotElevated).with_options(fast_options());
        let loc = LocationDescriptor::new("Dump", file.to_string_lossy(), Category::System, Priority::High).file();

        let outcome = cleaner.delete(&loc, &[file.clone()]);

        assert!(outcome.success);
        assert_eq!(outcome.deleted_file_count, 1);
        assert_eq!(outcome.freed_bytes, 2048);
        assert!(!file.exists());
        assert!(dir.exists());
    }

    #[test]
    fn test_missing_paths_are_skipped() {
        let (_guard, dir) = test_dir();
        let system = FakeSystem::default();
        let cleaner = Cleaner::new(&system, Elevation::NotElevated).with_options(fast_options());

        let outcome = cleaner.delete(&location(&dir), &[dir.join("gone")]);

        assert!(outcome.success);
        assert_eq!(outcome.deleted_file_count, 0);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_not_safe_refused_in_every_state() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("keep", 1)]);
        let loc = location(&dir).not_safe();

        for elevation in [Elevation::Elevated, Elevation::NotElevated] {
            for running in [vec![], vec!["chrome.exe".to_string()]] {
                let system = FakeSystem {
                    running,
                    ..Default::default()
                };
                let cleaner = Cleaner::new(&system, elevation).with_options(fast_options());
                let outcome = cleaner.delete(&loc, &[dir.clone()]);
                assert!(!outcome.success);
                assert_eq!(outcome.refusal, Some(Refusal::NotSafeToDelete));
            }
        }
        assert!(dir.join("keep").exists());
    }

    #[test]
    fn test_admin_location_needs_elevation() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("a", 1)]);
        let loc = location(&dir).admin();
        let system = FakeSystem::default();

        let refused = Cleaner::new(&system, Elevation::NotElevated).delete(&loc, &[dir.clone()]);
        assert_eq!(refused.refusal, Some(Refusal::RequiresElevation));
        assert!(dir.join("a").exists());

        let allowed = Cleaner::new(&system, Elevation::Elevated)
            .with_options(fast_options())
            .delete(&loc, &[dir.clone()]);
        assert!(allowed.success);
        assert_eq!(allowed.deleted_file_count, 1);
    }

    #[test]
    fn test_running_process_blocks_deletion() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("cache_0", 10)]);
        let loc = location(&dir).check_processes(&["chrome.exe", "msedge.exe", "firefox.exe"]);
        let system = FakeSystem {
            running: vec!["msedge.exe".to_string(), "firefox.exe".to_string()],
            ..Default::default()
        };

        let outcome = Cleaner::new(&system, Elevation::NotElevated).delete(&loc, &[dir.clone()]);

        assert!(!outcome.success);
        assert_eq!(
            outcome.refusal,
            Some(Refusal::ProcessesRunning {
                processes: vec!["msedge.exe".to_string(), "firefox.exe".to_string()]
            })
        );
        assert!(dir.join("cache_0").exists());
        assert!(!system.calls().iter().any(|c| c.starts_with("terminate")));
    }

    #[test]
    fn test_process_check_passes_when_nothing_runs() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("cache_0", 10)]);
        let loc = location(&dir).check_processes(&["chrome.exe"]);
        let system = FakeSystem::default();

        let outcome = Cleaner::new(&system, Elevation::NotElevated)
            .with_options(fast_options())
            .delete(&loc, &[dir.clone()]);

        assert!(outcome.success);
        assert_eq!(outcome.deleted_file_count, 1);
    }

    #[test]
    fn test_service_stop_failure_refuses_without_restart() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("update.cab", 10)]);
        let loc = location(&dir).stop_service("wuauserv");
        let system = FakeSystem {
            stop_fails: true,
            ..Default::default()
        };

        let outcome = Cleaner::new(&system, Elevation::NotElevated).delete(&loc, &[dir.clone()]);

        assert!(!outcome.success);
        match outcome.refusal {
            Some(Refusal::ServiceStopFailed { service, reason }) => {
                assert_eq!(service, "wuauserv");
                assert!(reason.contains("access is denied"));
            }
            other => panic!("unexpected refusal {other:?}"),
        }
        assert_eq!(system.calls(), vec!["stop wuauserv".to_string()]);
        assert!(dir.join("update.cab").exists());
    }

    #[test]
    fn test_service_restarted_after_deleting_nothing() {
        let (_guard, dir) = test_dir();
        let loc = location(&dir).stop_service("wuauserv");
        let system = FakeSystem::default();

        let outcome = Cleaner::new(&system, Elevation::NotElevated)
            .with_options(fast_options())
            .delete(&loc, &[dir.clone()]);

        assert!(outcome.success);
        assert_eq!(outcome.deleted_file_count, 0);
        assert_eq!(
            system.calls(),
            vec!["stop wuauserv".to_string(), "start wuauserv".to_string()]
        );
    }

    #[test]
    fn test_restart_failure_is_recorded_not_fatal() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("a.log", 10)]);
        let loc = location(&dir).stop_service("FontCache");
        let system = FakeSystem {
            start_fails: true,
            ..Default::default()
        };

        let outcome = Cleaner::new(&system, Elevation::NotElevated)
            .with_options(fast_options())
            .delete(&loc, &[dir.clone()]);

        assert!(outcome.success);
        assert_eq!(outcome.deleted_file_count, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("FontCache"));
    }

    #[test]
    fn test_service_restarted_even_with_locked_files() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("CBS.log", 10)]);
        let loc = location(&dir).stop_service("TrustedInstaller");
        let system = FakeSystem::default();
        let remover = LockingRemover {
            locked: vec!["CBS.log".to_string()],
            ..Default::default()
        };

        let outcome = Cleaner::new(&system, Elevation::NotElevated)
            .with_options(fast_options())
            .with_remover(&remover)
            .delete(&loc, &[dir.clone()]);

        assert!(outcome.success);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(system.calls().last().map(String::as_str), Some("start TrustedInstaller"));
    }

    #[test]
    fn test_ownership_failure_refuses() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("old.sys", 10)]);
        let loc = location(&dir).method(CleanupMethod::TakeOwnership);
        let system = FakeSystem {
            ownership_fails: true,
            ..Default::default()
        };

        let outcome = Cleaner::new(&system, Elevation::NotElevated).delete(&loc, &[dir.clone()]);

        assert!(matches!(outcome.refusal, Some(Refusal::OwnershipFailed { .. })));
        assert!(dir.join("old.sys").exists());
    }

    #[test]
    fn test_ownership_taken_before_delete() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("etl.log", 10)]);
        let loc = location(&dir).method(CleanupMethod::Elevated);
        let system = FakeSystem::default();

        let outcome = Cleaner::new(&system, Elevation::NotElevated)
            .with_options(fast_options())
            .delete(&loc, &[dir.clone(), dir.join("missing")]);

        assert!(outcome.success);
        assert_eq!(system.calls(), vec![format!("takeown {}", dir.display())]);
    }

    #[test]
    fn test_shell_restarted_around_delete() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("iconcache_16.db", 64)]);
        let loc = location(&dir).method(CleanupMethod::RestartShell {
            process: "explorer.exe".to_string(),
        });
        let system = FakeSystem::default();

        let outcome = Cleaner::new(&system, Elevation::NotElevated)
            .with_options(fast_options())
            .delete(&loc, &[dir.join("iconcache_16.db")]);

        assert!(outcome.success);
        assert_eq!(outcome.deleted_file_count, 1);
        assert_eq!(
            system.calls(),
            vec!["terminate explorer.exe".to_string(), "launch explorer.exe".to_string()]
        );
    }

    #[test]
    fn test_shell_stop_failure_refuses() {
        let (_guard, dir) = test_dir();
        let loc = location(&dir).method(CleanupMethod::RestartShell {
            process: "explorer.exe".to_string(),
        });
        let system = FakeSystem {
            terminate_fails: true,
            ..Default::default()
        };

        let outcome = Cleaner::new(&system, Elevation::NotElevated).delete(&loc, &[dir.clone()]);

        assert!(matches!(outcome.refusal, Some(Refusal::ShellStopFailed { .. })));
        assert_eq!(system.calls(), vec!["terminate explorer.exe".to_string()]);
    }

    #[test]
    fn test_display_only_always_refused() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("installer.msi", 10)]);
        let mut loc = location(&dir).method(CleanupMethod::DisplayOnly);
        loc.safe_delete = true;
        let system = FakeSystem::default();

        let outcome = Cleaner::new(&system, Elevation::Elevated).delete(&loc, &[dir.clone()]);

        assert_eq!(outcome.refusal, Some(Refusal::DisplayOnly));
        assert!(dir.join("installer.msi").exists());
    }

    #[test]
    fn test_component_store_location_refused_for_delete() {
        let (_guard, dir) = test_dir();
        let mut loc = location(&dir).method(CleanupMethod::ComponentStore);
        loc.safe_delete = true;
        let system = FakeSystem::default();

        let outcome = Cleaner::new(&system, Elevation::Elevated).delete(&loc, &[dir.clone()]);

        assert_eq!(outcome.refusal, Some(Refusal::MaintenanceOnly));
        assert!(system.calls().is_empty());
    }

    fn dism_timeout() -> Result<(), SystemError> {
        Err(SystemError::Timeout {
            command: "Dism.exe".to_string(),
            secs: 600,
        })
    }

    #[test]
    fn test_compaction_timeout_reported() {
        let system = FakeSystem {
            compaction: Some(dism_timeout as fn() -> Result<(), SystemError>),
            ..Default::default()
        };

        let outcome = Cleaner::new(&system, Elevation::Elevated)
            .compact_component_store(false, Duration::from_secs(600));

        assert!(!outcome.success);
        assert!(outcome.timed_out);
        assert_eq!(system.calls(), vec!["compact false".to_string()]);
    }

    #[test]
    fn test_compaction_requires_elevation() {
        let system = FakeSystem::default();
        let outcome = Cleaner::new(&system, Elevation::NotElevated)
            .compact_component_store(true, Duration::from_secs(1));

        assert!(!outcome.success);
        assert!(!outcome.timed_out);
        assert!(system.calls().is_empty());
    }

    #[test]
    fn test_preview_touches_nothing() {
        let (_guard, dir) = test_dir();
        fill(&dir, &[("a", 10), ("b", 20)]);
        let loc = location(&dir).stop_service("wuauserv");
        let system = FakeSystem::default();

        let outcome = Cleaner::new(&system, Elevation::NotElevated).preview(&loc, &[dir.clone()]);

        assert!(outcome.dry_run);
        assert_eq!(outcome.deleted_file_count, 2);
        assert_eq!(outcome.freed_bytes, 30);
        assert!(dir.join("a").exists());
        assert!(system.calls().is_empty());
    }

    #[test]
    fn test_exponential_backoff_delays() {
        let policy = RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(100),
            exponential: true,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(RetryPolicy::default().delay_after(2), Duration::from_millis(100));
    }
}
