//! User configuration
//!
//! Stored as TOML at `<config dir>/tempsweep/config.toml`. Every field has a
//! default, so a partial or missing file is fine.

use crate::cleaner::{CleanOptions, RetryPolicy};
use crate::orchestrator::RunOptions;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cleanup: CleanupConfig,
    pub scan: ScanConfig,
    pub maintenance: MaintenanceConfig,
    pub report: ReportConfig,
    pub exclusions: ExclusionConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Attempts per file before it is reported as locked (minimum 1)
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub exponential_backoff: bool,
    pub prune_empty_dirs: bool,
    /// Remove a location's own directory once it is empty
    pub remove_empty_root: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 100,
            exponential_backoff: false,
            prune_empty_dirs: true,
            remove_empty_root: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub timeout_secs: u64,
    pub analyze_timeout_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            analyze_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Where Markdown reports go (None = current directory)
    pub directory: Option<String>,
    pub write_markdown: bool,
    pub max_listed_errors: usize,
    /// Locations above this size get a recommendation in the report
    pub large_location_mb: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            directory: None,
            write_markdown: true,
            max_listed_errors: 50,
            large_location_mb: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Location names never scanned or cleaned
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Path of the config file
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "tempsweep")
            .context("Failed to determine config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load config from disk, falling back to defaults on any problem
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("ignoring config file: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load config, writing the defaults first if no file exists yet
    pub fn load_or_create() -> Self {
        match Self::try_load() {
            Ok(Some(config)) => config,
            Ok(None) => {
                let config = Self::default();
                if let Err(e) = config.save() {
                    tracing::warn!("could not write default config: {:#}", e);
                }
                config
            }
            Err(e) => {
                tracing::warn!("ignoring config file: {:#}", e);
                Self::default()
            }
        }
    }

    fn try_load() -> Result<Option<Self>> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
            .map(Some)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Command-line flags win over the file
    pub fn apply_cli_overrides(&mut self, parallel: Option<bool>, exclude: &[String], no_report: bool) {
        if let Some(parallel) = parallel {
            self.scan.parallel = parallel;
        }
        for name in exclude {
            if !self.exclusions.locations.contains(name) {
                self.exclusions.locations.push(name.clone());
            }
        }
        if no_report {
            self.report.write_markdown = false;
        }
    }

    fn normalize(&mut self) {
        self.cleanup.retry_attempts = RetryPolicy::clamp_attempts(self.cleanup.retry_attempts);
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: RetryPolicy::clamp_attempts(self.cleanup.retry_attempts),
            delay: Duration::from_millis(self.cleanup.retry_delay_ms),
            exponential: self.cleanup.exponential_backoff,
        }
    }

    pub fn run_options(&self, dry_run: bool) -> RunOptions {
        RunOptions {
            clean: CleanOptions {
                retry: self.retry_policy(),
                prune_empty_dirs: self.cleanup.prune_empty_dirs,
                remove_empty_root: self.cleanup.remove_empty_root,
            },
            parallel: self.scan.parallel,
            excluded: self.exclusions.locations.clone(),
            dry_run,
        }
    }

    pub fn maintenance_timeout(&self) -> Duration {
        Duration::from_secs(self.maintenance.timeout_secs)
    }

    pub fn analyze_timeout(&self) -> Duration {
        Duration::from_secs(self.maintenance.analyze_timeout_secs)
    }

    pub fn report_dir(&self) -> PathBuf {
        match &self.report.directory {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}
