//! Location catalog
//!
//! The static table of places known to collect disposable data, plus the
//! types that describe them. The table is built once on first use and never
//! changes for the lifetime of the process.

mod entries;

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of data a location holds. Only used for grouping in reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    System,
    Browser,
    Application,
    Gaming,
    Development,
    Cloud,
    Logs,
    ViewOnly,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::System => "System",
            Category::Browser => "Browser",
            Category::Application => "Application",
            Category::Gaming => "Gaming",
            Category::Development => "Development",
            Category::Cloud => "Cloud",
            Category::Logs => "Logs",
            Category::ViewOnly => "View only",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation tier, most urgent first. `Never` locations are never deleted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    Never,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "Critical",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
            Priority::Never => "Never",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a location has to be prepared before its files can be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CleanupMethod {
    /// Delete the files, nothing else.
    SimpleDelete,
    /// Take ownership of the tree first (upgrade leftovers owned by TrustedInstaller).
    TakeOwnership,
    /// Stop a service, delete, then start it again no matter what happened.
    StopService { service: String },
    /// Refuse while any of these processes is running.
    ProcessCheck { processes: Vec<String> },
    /// Acquire elevated rights on the tree first (SYSTEM-owned logs).
    Elevated,
    /// Terminate the shell process holding the files, delete, relaunch it.
    RestartShell { process: String },
    /// Only the component store maintenance operation may shrink this location.
    ComponentStore,
    /// Scan and report only.
    DisplayOnly,
}

impl CleanupMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupMethod::SimpleDelete => "simple_delete",
            CleanupMethod::TakeOwnership => "takeown_and_delete",
            CleanupMethod::StopService { .. } => "service_stop_delete",
            CleanupMethod::ProcessCheck { .. } => "process_check_delete",
            CleanupMethod::Elevated => "elevated_delete",
            CleanupMethod::RestartShell { .. } => "explorer_restart_delete",
            CleanupMethod::ComponentStore => "dism_cleanup",
            CleanupMethod::DisplayOnly => "display_only",
        }
    }

    /// Whether the executor may ever remove files for this method.
    pub fn deletes_files(&self) -> bool {
        !matches!(self, CleanupMethod::ComponentStore | CleanupMethod::DisplayOnly)
    }
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationDescriptor {
    /// Unique name, also the key of the scan result table
    pub name: String,
    /// One or more paths, possibly with `%VAR%` placeholders and a glob in the last component
    pub path_templates: Vec<String>,
    pub category: Category,
    pub priority: Priority,
    /// Hard gate: false means the location is never deleted
    pub safe_delete: bool,
    pub requires_admin: bool,
    pub method: CleanupMethod,
    /// The templates name single files. A directory found at one of
    /// these paths is reported as an error instead of being scanned or deleted.
    pub is_file: bool,
    pub expected_size_mb: u64,
    pub description: String,
    pub warning: Option<String>,
}

impl LocationDescriptor {
    /// New simple-delete location with a single path template.
    ///
    /// `Priority::Never` always yields `safe_delete = false`.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        category: Category,
        priority: Priority,
    ) -> Self {
        Self {
            name: name.into(),
            path_templates: vec![path.into()],
            category,
            priority,
            safe_delete: priority != Priority::Never,
            requires_admin: false,
            method: CleanupMethod::SimpleDelete,
            is_file: false,
            expected_size_mb: 0,
            description: String::new(),
            warning: None,
        }
    }

    /// Same as [`LocationDescriptor::new`] with several path templates.
    pub fn with_paths<I, S>(name: impl Into<String>, paths: I, category: Category, priority: Priority) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut descriptor = Self::new(name, String::new(), category, priority);
        descriptor.path_templates = paths.into_iter().map(Into::into).collect();
        descriptor
    }

    pub fn admin(mut self) -> Self {
        self.requires_admin = true;
        self
    }

    pub fn method(mut self, method: CleanupMethod) -> Self {
        if matches!(method, CleanupMethod::DisplayOnly) {
            self.safe_delete = false;
        }
        self.method = method;
        self
    }

    pub fn stop_service(self, service: &str) -> Self {
        self.method(CleanupMethod::StopService {
            service: service.to_string(),
        })
    }

    pub fn check_processes(self, processes: &[&str]) -> Self {
        self.method(CleanupMethod::ProcessCheck {
            processes: processes.iter().map(|p| p.to_string()).collect(),
        })
    }

    pub fn not_safe(mut self) -> Self {
        self.safe_delete = false;
        self
    }

    pub fn file(mut self) -> Self {
        self.is_file = true;
        self
    }

    pub fn expected_mb(mut self, mb: u64) -> Self {
        self.expected_size_mb = mb;
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = text.to_string();
        self
    }

    pub fn warning(mut self, text: &str) -> Self {
        self.warning = Some(text.to_string());
        self
    }

    pub fn service_to_stop(&self) -> Option<&str> {
        match &self.method {
            CleanupMethod::StopService { service } => Some(service),
            _ => None,
        }
    }

    /// Processes that block deletion while running. Empty for most methods.
    pub fn process_check(&self) -> &[String] {
        match &self.method {
            CleanupMethod::ProcessCheck { processes } => processes,
            _ => &[],
        }
    }
}

lazy_static::lazy_static! {
    static ref CATALOG: Vec<LocationDescriptor> = entries::all();
}

/// Every location, high-priority group first.
pub fn all() -> &'static [LocationDescriptor] {
    &CATALOG
}

pub fn find(name: &str) -> Option<&'static LocationDescriptor> {
    CATALOG.iter().find(|loc| loc.name == name)
}

pub fn by_category(category: Category) -> Vec<&'static LocationDescriptor> {
    CATALOG.iter().filter(|loc| loc.category == category).collect()
}

pub fn by_priority(priority: Priority) -> Vec<&'static LocationDescriptor> {
    CATALOG.iter().filter(|loc| loc.priority == priority).collect()
}

pub fn safe_locations() -> Vec<&'static LocationDescriptor> {
    CATALOG.iter().filter(|loc| loc.safe_delete).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let mut seen = HashSet::new();
        for loc in all() {
            assert!(seen.insert(loc.name.as_str()), "duplicate name {}", loc.name);
        }
    }

    #[test]
    fn test_every_location_has_a_path() {
        for loc in all() {
            assert!(!loc.path_templates.is_empty(), "{} has no paths", loc.name);
            assert!(loc.path_templates.iter().all(|p| !p.is_empty()));
        }
    }

    #[test]
    fn test_never_priority_is_not_safe() {
        for loc in by_priority(Priority::Never) {
            assert!(!loc.safe_delete, "{} must not be deletable", loc.name);
        }
    }

    #[test]
    fn test_display_only_is_not_safe() {
        let loc = LocationDescriptor::new("x", "/x", Category::Logs, Priority::Low)
            .method(CleanupMethod::DisplayOnly);
        assert!(!loc.safe_delete);
        assert!(!loc.method.deletes_files());
    }

    #[test]
    fn test_method_accessors() {
        let svc = LocationDescriptor::new("svc", "/x", Category::System, Priority::High)
            .stop_service("wuauserv");
        assert_eq!(svc.service_to_stop(), Some("wuauserv"));
        assert!(svc.process_check().is_empty());

        let proc = LocationDescriptor::new("proc", "/x", Category::Browser, Priority::Medium)
            .check_processes(&["chrome.exe"]);
        assert_eq!(proc.process_check(), ["chrome.exe".to_string()]);
        assert_eq!(proc.service_to_stop(), None);
        assert_eq!(proc.method.as_str(), "process_check_delete");
    }

    #[test]
    fn test_lookups() {
        assert!(find("User Temp").is_some());
        assert!(find("does not exist").is_none());
        assert!(by_category(Category::Browser)
            .iter()
            .all(|loc| loc.category == Category::Browser));
        assert!(safe_locations().iter().all(|loc| loc.safe_delete));
        assert!(!by_category(Category::ViewOnly).is_empty());
    }

    #[test]
    fn test_priority_order() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::Low < Priority::Never);
    }
}
