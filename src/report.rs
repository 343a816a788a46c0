//! Markdown scan report
//!
//! Written next to the user (or to the configured directory) as
//! `temp_scan_report_<YYYYmmdd_HHMMSS>.md`.

use crate::catalog::{Category, Priority};
use crate::orchestrator::{ScanReport, ScanResult};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// How much detail goes into the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Cap on individually listed errors
    pub max_listed_errors: usize,
    /// Locations larger than this are called out in the recommendations
    pub large_location_bytes: u64,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            max_listed_errors: 50,
            large_location_bytes: 100 * 1024 * 1024,
        }
    }
}

pub fn report_file_name(report: &ScanReport) -> String {
    format!("temp_scan_report_{}.md", report.generated_at.format("%Y%m%d_%H%M%S"))
}

/// Render and write the report into `dir`, returning the file path
pub fn write_report(report: &ScanReport, dir: &Path, options: ReportOptions) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(report_file_name(report));
    fs::write(&path, render(report, options))
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}

fn human(bytes: u64) -> String {
    bytesize::to_string(bytes, true)
}

fn current_user() -> String {
    std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "unknown".to_string())
}

pub fn render(report: &ScanReport, options: ReportOptions) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_body(&mut out, report, options);
    out
}

fn write_body(out: &mut String, report: &ScanReport, options: ReportOptions) -> std::fmt::Result {
    writeln!(out, "# Temporary Files Scan Report\n")?;
    writeln!(
        out,
        "**Created:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "**User:** {}\n", current_user())?;
    writeln!(
        out,
        "**Elevated:** {}\n",
        if report.elevated { "yes" } else { "no" }
    )?;
    writeln!(out, "---\n")?;

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total size:** {}", human(report.total_bytes))?;
    writeln!(out, "- **Files:** {}", report.total_files)?;
    writeln!(out, "- **Locations scanned:** {}", report.locations_scanned)?;
    writeln!(out, "- **Can be cleaned:** {}\n", human(report.deletable_bytes()))?;
    writeln!(out, "---\n")?;

    writeln!(out, "## Details\n")?;
    let mut groups: BTreeMap<(Priority, Category), Vec<&ScanResult>> = BTreeMap::new();
    for result in &report.results {
        groups.entry((result.priority, result.category)).or_default().push(result);
    }

    let mut current_priority = None;
    for ((priority, category), mut results) in groups {
        if current_priority != Some(priority) {
            writeln!(out, "### Priority: {}\n", priority)?;
            current_priority = Some(priority);
        }
        writeln!(out, "#### {}\n", category)?;
        results.sort_by(|a, b| b.total_bytes.cmp(&a.total_bytes));
        for result in results {
            write_location(out, result, report.total_bytes)?;
        }
    }

    let errors: Vec<(&str, &str)> = report
        .results
        .iter()
        .flat_map(|r| r.errors.iter().map(move |e| (r.name.as_str(), e.as_str())))
        .collect();
    if !errors.is_empty() {
        writeln!(out, "---\n")?;
        writeln!(out, "## Errors\n")?;
        writeln!(out, "<details>")?;
        writeln!(out, "<summary>Show errors</summary>\n")?;
        for (name, error) in errors.iter().take(options.max_listed_errors) {
            writeln!(out, "- **{}:** {}", name, error)?;
        }
        if errors.len() > options.max_listed_errors {
            writeln!(
                out,
                "\n*...and {} more errors*",
                errors.len() - options.max_listed_errors
            )?;
        }
        writeln!(out, "\n</details>\n")?;
    }

    writeln!(out, "---\n")?;
    writeln!(out, "## Recommendations\n")?;
    let mut large: Vec<&ScanResult> = report
        .results
        .iter()
        .filter(|r| r.total_bytes > options.large_location_bytes)
        .collect();
    large.sort_by(|a, b| b.total_bytes.cmp(&a.total_bytes));

    if large.is_empty() {
        writeln!(out, "No unusually large temporary data found.")?;
    } else {
        writeln!(out, "These locations take up a lot of space:\n")?;
        for result in large.iter().take(5) {
            let advice = if result.is_deletable() {
                "can be cleaned"
            } else if result.safe_delete {
                "can be cleaned with administrator rights"
            } else {
                "review manually, not cleaned automatically"
            };
            writeln!(out, "- **{}:** {} ({})", result.name, human(result.total_bytes), advice)?;
        }
    }
    writeln!(out, "\n---\n")?;
    writeln!(out, "*Generated by tempsweep {}*", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}

fn write_location(out: &mut String, result: &ScanResult, total_bytes: u64) -> std::fmt::Result {
    writeln!(out, "##### {}\n", result.name)?;
    for path in &result.resolved_paths {
        writeln!(out, "**Path:** `{}`\n", crate::utils::display_path(path))?;
    }

    if result.skipped {
        writeln!(out, "**Status:** skipped (requires elevated privileges)\n")?;
        return Ok(());
    }
    if !result.exists {
        writeln!(out, "**Status:** path does not exist\n")?;
        return Ok(());
    }

    writeln!(out, "- **Size:** {}", human(result.total_bytes))?;
    writeln!(out, "- **Files:** {}", result.file_count)?;
    if result.total_bytes > 0 && total_bytes > 0 {
        let share = result.total_bytes as f64 / total_bytes as f64 * 100.0;
        writeln!(out, "- **Share:** {:.1}% of total", share)?;
    }
    if !result.safe_delete {
        writeln!(out, "- **View only:** not deleted by this tool")?;
    }
    if !result.errors.is_empty() {
        writeln!(out, "- **Warnings:** {} access errors", result.errors.len())?;
    }
    writeln!(out)
}
