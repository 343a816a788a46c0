//! Location resolution
//!
//! Turns a catalog entry into concrete paths and decides whether its gates
//! allow deletion at all. Glob patterns are matched against the disk every
//! time `resolve` runs, so a later scan sees files created since the last one.

use crate::catalog::LocationDescriptor;
use crate::error::Refusal;
use crate::system::Elevation;
use globset::GlobBuilder;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Outcome of the static gate check: `Err` carries the refusal reason.
pub type GateResult = Result<(), Refusal>;

/// Expands `%VAR%` placeholders in a path template.
pub trait PathExpander: Sync {
    fn expand(&self, template: &str) -> String;
}

/// Expands placeholders from the process environment, looked up at call time.
///
/// Unknown variables are left in place, so the resulting path simply does
/// not exist and scans as empty.
#[derive(Debug, Default, Clone)]
pub struct EnvExpander {
    overrides: HashMap<String, String>,
}

impl EnvExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `value` for `name` instead of the environment
    pub fn with_var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.overrides.insert(name.to_ascii_uppercase(), value.into());
        self
    }

    fn lookup(&self, name: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(&name.to_ascii_uppercase()) {
            return Some(value.clone());
        }
        env::var(name).ok()
    }
}

impl PathExpander for EnvExpander {
    fn expand(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('%') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('%') else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let name = &after[..end];
            if !is_var_name(name) {
                out.push('%');
                rest = after;
                continue;
            }
            match self.lookup(name) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push('%');
                    out.push_str(name);
                    out.push('%');
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '(' | ')'))
}

pub struct Resolver<'a> {
    expander: &'a dyn PathExpander,
}

impl<'a> Resolver<'a> {
    pub fn new(expander: &'a dyn PathExpander) -> Self {
        Self { expander }
    }

    /// Concrete paths for every template of `location`.
    ///
    /// Paths nested inside another resolved path are dropped so nothing is
    /// counted twice. Globs that match nothing contribute no paths.
    pub fn resolve(&self, location: &LocationDescriptor) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for template in &location.path_templates {
            let expanded = PathBuf::from(self.expander.expand(template));
            if has_glob(&expanded) {
                paths.extend(expand_glob(&expanded));
            } else {
                paths.push(expanded);
            }
        }
        collapse_nested(paths)
    }
}

/// Static gates: `safe_delete` first, then the admin requirement.
///
/// In-use processes and services are checked by the cleaner at delete time.
pub fn check_gates(location: &LocationDescriptor, elevation: Elevation) -> GateResult {
    if !location.safe_delete {
        return Err(Refusal::NotSafeToDelete);
    }
    if location.requires_admin && !elevation.is_elevated() {
        return Err(Refusal::RequiresElevation);
    }
    Ok(())
}

/// Only the final component may hold a pattern
fn has_glob(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().contains(['*', '?', '[']))
        .unwrap_or(false)
}

fn expand_glob(pattern_path: &Path) -> Vec<PathBuf> {
    let (Some(parent), Some(pattern)) = (pattern_path.parent(), pattern_path.file_name()) else {
        return Vec::new();
    };

    let matcher = match GlobBuilder::new(&pattern.to_string_lossy())
        .case_insensitive(cfg!(windows))
        .literal_separator(true)
        .build()
    {
        Ok(glob) => glob.compile_matcher(),
        Err(e) => {
            tracing::warn!("invalid pattern in {}: {}", pattern_path.display(), e);
            return Vec::new();
        }
    };

    let Ok(entries) = crate::utils::safe_read_dir(parent) else {
        return Vec::new();
    };

    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| matcher.is_match(entry.file_name()))
        .map(|entry| entry.path())
        .collect();
    matches.sort();
    matches
}

fn collapse_nested(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut kept: Vec<PathBuf> = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        let covered = paths
            .iter()
            .enumerate()
            .any(|(j, other)| j != i && other != path && path.starts_with(other));
        if !covered && !kept.contains(path) {
            kept.push(path.clone());
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, Priority};
    use std::fs;

    #[test]
    fn test_expand_known_variable() {
        let expander = EnvExpander::new().with_var("LOCALAPPDATA", "/home/u/local");
        assert_eq!(
            expander.expand("%LOCALAPPDATA%/pip/cache"),
            "/home/u/local/pip/cache"
        );
    }

    #[test]
    fn test_expand_is_case_insensitive_for_overrides() {
        let expander = EnvExpander::new().with_var("SystemRoot", "C:/Windows");
        assert_eq!(expander.expand("%SYSTEMROOT%/Temp"), "C:/Windows/Temp");
    }

    #[test]
    fn test_expand_unknown_variable_left_in_place() {
        let expander = EnvExpander::new();
        let template = "%TEMPSWEEP_SURELY_UNSET_VAR%/x";
        assert_eq!(expander.expand(template), template);
    }

    #[test]
    fn test_expand_unpaired_percent() {
        let expander = EnvExpander::new().with_var("A", "1");
        assert_eq!(expander.expand("50%/%A%"), "50%/1");
        assert_eq!(expander.expand("%A%%"), "1%");
    }

    #[test]
    fn test_resolve_multiple_templates() {
        let expander = EnvExpander::new().with_var("ROOT", "/data");
        let loc = LocationDescriptor::with_paths(
            "multi",
            ["%ROOT%/one", "%ROOT%/two"],
            Category::Application,
            Priority::Medium,
        );
        let paths = Resolver::new(&expander).resolve(&loc);
        assert_eq!(paths, vec![PathBuf::from("/data/one"), PathBuf::from("/data/two")]);
    }

    #[test]
    fn test_resolve_collapses_nested_paths() {
        let expander = EnvExpander::new();
        let loc = LocationDescriptor::with_paths(
            "cbs",
            ["/logs/CBS/CBS.log", "/logs/CBS", "/logs/CBS"],
            Category::Logs,
            Priority::Critical,
        );
        let paths = Resolver::new(&expander).resolve(&loc);
        assert_eq!(paths, vec![PathBuf::from("/logs/CBS")]);
    }

    #[test]
    fn test_resolve_glob_reads_disk_each_time() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().to_string_lossy().to_string();
        fs::write(temp_dir.path().join("iconcache_16.db"), "a").unwrap();
        fs::write(temp_dir.path().join("thumbcache_16.db"), "b").unwrap();

        let expander = EnvExpander::new().with_var("DIR", root);
        let loc = LocationDescriptor::new(
            "icons",
            "%DIR%/iconcache_*.db",
            Category::System,
            Priority::Low,
        )
        .file();
        let resolver = Resolver::new(&expander);

        assert_eq!(
            resolver.resolve(&loc),
            vec![temp_dir.path().join("iconcache_16.db")]
        );

        fs::write(temp_dir.path().join("iconcache_32.db"), "c").unwrap();
        assert_eq!(resolver.resolve(&loc).len(), 2);
    }

    #[test]
    fn test_resolve_glob_without_matches() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pattern = temp_dir.path().join("wpndatabase.db*");
        let loc = LocationDescriptor::new(
            "notifications",
            pattern.to_string_lossy(),
            Category::System,
            Priority::Low,
        );
        assert!(Resolver::new(&EnvExpander::new()).resolve(&loc).is_empty());
    }

    #[test]
    fn test_gate_not_safe_checked_first() {
        let loc = LocationDescriptor::new("x", "/x", Category::ViewOnly, Priority::Never).admin();
        assert_eq!(check_gates(&loc, Elevation::NotElevated), Err(Refusal::NotSafeToDelete));
        assert_eq!(check_gates(&loc, Elevation::Elevated), Err(Refusal::NotSafeToDelete));
    }

    #[test]
    fn test_gate_admin_requirement() {
        let loc = LocationDescriptor::new("x", "/x", Category::System, Priority::High).admin();
        assert_eq!(check_gates(&loc, Elevation::NotElevated), Err(Refusal::RequiresElevation));
        assert_eq!(check_gates(&loc, Elevation::Elevated), Ok(()));
    }

    #[test]
    fn test_gate_plain_location() {
        let loc = LocationDescriptor::new("x", "/x", Category::System, Priority::Medium);
        assert_eq!(check_gates(&loc, Elevation::NotElevated), Ok(()));
    }
}
