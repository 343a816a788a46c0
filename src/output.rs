use crate::catalog::LocationDescriptor;
use crate::cleaner::MaintenanceOutcome;
use crate::orchestrator::{CleanupSummary, ScanReport, ScanResult};
use crate::system::ComponentStoreAnalysis;
use crate::theme::Theme;
use serde::Serialize;

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Quiet,       // Only errors
    Normal,      // Standard output
    Verbose,     // More details
    VeryVerbose, // All details including paths and errors
}

impl OutputMode {
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            OutputMode::Quiet
        } else {
            match verbose {
                0 => OutputMode::Normal,
                1 => OutputMode::Verbose,
                _ => OutputMode::VeryVerbose,
            }
        }
    }
}

#[derive(Serialize)]
struct JsonScan<'a> {
    version: &'static str,
    timestamp: String,
    elevated: bool,
    summary: JsonSummary,
    locations: &'a [ScanResult],
}

#[derive(Serialize)]
struct JsonSummary {
    locations_scanned: usize,
    total_files: u64,
    total_bytes: u64,
    total_human: String,
    deletable_bytes: u64,
    deletable_human: String,
}

#[derive(Serialize)]
struct JsonCleanup<'a> {
    version: &'static str,
    timestamp: String,
    #[serde(flatten)]
    summary: &'a CleanupSummary,
    freed_human: String,
}

fn human(bytes: u64) -> String {
    bytesize::to_string(bytes, true)
}

fn status_of(result: &ScanResult) -> String {
    if result.skipped {
        "[!] Needs admin".to_string()
    } else if !result.exists {
        "Not present".to_string()
    } else if !result.safe_delete {
        "View only".to_string()
    } else if result.total_bytes == 0 {
        "Empty".to_string()
    } else {
        "[OK] Can clean".to_string()
    }
}

pub fn print_scan_human(report: &ScanReport, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }

    println!();
    println!("{}", Theme::header("Temp Scan Results"));
    println!("{}", Theme::divider_bold(78));
    println!();
    println!(
        "{:<34} {:<9} {:>9} {:>12}  {}",
        Theme::primary("Location"),
        Theme::primary("Priority"),
        Theme::primary("Files"),
        Theme::primary("Size"),
        Theme::primary("Status")
    );
    println!("{}", Theme::divider(78));

    for result in &report.results {
        // Absent locations only clutter the normal view
        if !result.exists && !result.skipped && mode == OutputMode::Normal {
            continue;
        }
        let status = status_of(result);
        let status = if status.starts_with("[OK]") {
            Theme::success(&status)
        } else if status.starts_with("[!]") {
            Theme::warning(&status)
        } else {
            Theme::muted(&status)
        };
        println!(
            "{:<34} {:<9} {:>9} {:>12}  {}",
            result.name,
            Theme::priority(result.priority),
            Theme::value(&result.file_count.to_string()),
            Theme::size(&result.size_human()),
            status
        );

        if mode == OutputMode::VeryVerbose {
            for path in &result.resolved_paths {
                println!("    {}", Theme::muted(&path.display().to_string()));
            }
        }
        if mode != OutputMode::Normal && !result.errors.is_empty() {
            let shown = if mode == OutputMode::VeryVerbose { result.errors.len() } else { 3 };
            for error in result.errors.iter().take(shown) {
                println!("    {}", Theme::error(error));
            }
            if result.errors.len() > shown {
                println!("    {}", Theme::muted(&format!("... and {} more", result.errors.len() - shown)));
            }
        }
    }

    println!("{}", Theme::divider(78));
    println!(
        "{:<34} {:<9} {:>9} {:>12}",
        Theme::header("Total"),
        "",
        Theme::value(&report.total_files.to_string()),
        Theme::size(&human(report.total_bytes)),
    );

    let deletable = report.deletable_bytes();
    println!();
    if deletable == 0 {
        println!("{}", Theme::success("Nothing to clean up."));
    } else {
        println!(
            "{} can be cleaned. Run {} to choose what to remove.",
            Theme::size(&human(deletable)),
            Theme::command("tempsweep clean")
        );
    }
    let errors = report.error_count();
    if errors > 0 && mode == OutputMode::Normal {
        println!("{}", Theme::muted(&format!("{errors} entries could not be read (use -v for details)")));
    }
    if !report.elevated && report.results.iter().any(|r| r.skipped) {
        println!(
            "{}",
            Theme::muted("Some locations were skipped; run as administrator to include them.")
        );
    }
    println!();
}

pub fn print_scan_json(report: &ScanReport) -> anyhow::Result<()> {
    let json = JsonScan {
        version: "1.0",
        timestamp: report.generated_at.to_rfc3339(),
        elevated: report.elevated,
        summary: JsonSummary {
            locations_scanned: report.locations_scanned,
            total_files: report.total_files,
            total_bytes: report.total_bytes,
            total_human: human(report.total_bytes),
            deletable_bytes: report.deletable_bytes(),
            deletable_human: human(report.deletable_bytes()),
        },
        locations: &report.results,
    };
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

pub fn print_cleanup_human(summary: &CleanupSummary, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }

    println!();
    let title = if summary.dry_run { "Dry Run (nothing deleted)" } else { "Cleanup Results" };
    println!("{}", Theme::header(title));
    println!("{}", Theme::divider_bold(70));

    for outcome in &summary.outcomes {
        match &outcome.refusal {
            Some(refusal) => println!(
                "{} {:<34} {}",
                Theme::warning("[SKIP]"),
                outcome.name,
                Theme::muted(&refusal.to_string())
            ),
            None => println!(
                "{} {:<34} {:>8} files {:>12}",
                Theme::success("[OK]  "),
                outcome.name,
                outcome.deleted_file_count,
                Theme::size(&human(outcome.freed_bytes))
            ),
        }
        if !outcome.errors.is_empty() {
            let shown = match mode {
                OutputMode::Normal => 0,
                OutputMode::Verbose => 5,
                _ => outcome.errors.len(),
            };
            for error in outcome.errors.iter().take(shown) {
                println!("       {}", Theme::error(error));
            }
            if outcome.errors.len() > shown {
                println!(
                    "       {}",
                    Theme::muted(&format!("{} problems (use -v for details)", outcome.errors.len() - shown))
                );
            }
        }
    }

    println!("{}", Theme::divider(70));
    let verb = if summary.dry_run { "Would free" } else { "Freed" };
    println!(
        "{} {} ({} files)",
        Theme::primary(verb),
        Theme::size(&human(summary.freed_bytes)),
        summary.deleted_file_count
    );
    let errors = summary.error_count();
    if errors > 0 {
        println!("{}", Theme::warning(&format!("{errors} items could not be removed")));
    }
    if summary.cancelled {
        println!("{}", Theme::warning("Cleanup was interrupted; remaining locations were not touched."));
    }
    println!();
}

pub fn print_cleanup_json(summary: &CleanupSummary) -> anyhow::Result<()> {
    let json = JsonCleanup {
        version: "1.0",
        timestamp: chrono::Local::now().to_rfc3339(),
        summary,
        freed_human: human(summary.freed_bytes),
    };
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Catalog listing for `tempsweep list`
pub fn print_catalog(locations: &[&LocationDescriptor], mode: OutputMode) {
    println!();
    println!("{}", Theme::header("Known Locations"));
    println!("{}", Theme::divider_bold(78));
    println!(
        "{:<34} {:<12} {:<9} {:<6} {}",
        Theme::primary("Location"),
        Theme::primary("Category"),
        Theme::primary("Priority"),
        Theme::primary("Admin"),
        Theme::primary("Method")
    );
    println!("{}", Theme::divider(78));

    for loc in locations {
        println!(
            "{:<34} {:<12} {:<9} {:<6} {}",
            loc.name,
            loc.category.as_str(),
            Theme::priority(loc.priority),
            if loc.requires_admin { "yes" } else { "no" },
            Theme::muted(loc.method.as_str())
        );
        if mode != OutputMode::Normal {
            if !loc.description.is_empty() {
                println!("    {}", Theme::secondary(&loc.description));
            }
            for template in &loc.path_templates {
                println!("    {}", Theme::muted(template));
            }
            if let Some(warning) = &loc.warning {
                println!("    {} {}", Theme::warning("Warning:"), warning);
            }
        }
    }
    println!();
}

pub fn print_component_store_analysis(analysis: &ComponentStoreAnalysis) {
    println!();
    println!("{}", Theme::header("Component Store Analysis"));
    println!("{}", Theme::divider_bold(60));
    match &analysis.actual_size {
        Some(size) => println!("Actual size:            {}", Theme::size(size)),
        None => println!("Actual size:            {}", Theme::muted("unknown")),
    }
    if let Some(count) = &analysis.reclaimable_packages {
        println!("Reclaimable packages:   {}", Theme::value(count));
    }
    match analysis.cleanup_recommended {
        Some(true) => println!("{}", Theme::warning("Component store cleanup is recommended.")),
        Some(false) => println!("{}", Theme::success("No component store cleanup needed.")),
        None => {}
    }
    println!();
}

pub fn print_maintenance(outcome: &MaintenanceOutcome) {
    if outcome.success {
        println!("{} {}", Theme::success("[OK]"), outcome.message);
    } else if outcome.timed_out {
        println!("{} {}", Theme::error("[TIMEOUT]"), outcome.message);
    } else {
        println!("{} {}", Theme::error("[FAILED]"), outcome.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, Priority};

    fn result(exists: bool, safe: bool, bytes: u64) -> ScanResult {
        ScanResult {
            name: "x".to_string(),
            category: Category::System,
            priority: Priority::Medium,
            safe_delete: safe,
            requires_admin: false,
            method: "simple_delete",
            resolved_paths: Vec::new(),
            exists,
            total_bytes: bytes,
            file_count: if bytes > 0 { 1 } else { 0 },
            errors: Vec::new(),
            skipped: false,
        }
    }

    #[test]
    fn test_output_mode_from_flags() {
        assert_eq!(OutputMode::from_flags(0, false), OutputMode::Normal);
        assert_eq!(OutputMode::from_flags(1, false), OutputMode::Verbose);
        assert_eq!(OutputMode::from_flags(3, false), OutputMode::VeryVerbose);
        assert_eq!(OutputMode::from_flags(2, true), OutputMode::Quiet);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_of(&result(false, true, 0)), "Not present");
        assert_eq!(status_of(&result(true, false, 10)), "View only");
        assert_eq!(status_of(&result(true, true, 0)), "Empty");
        assert_eq!(status_of(&result(true, true, 10)), "[OK] Can clean");
        let mut skipped = result(true, true, 0);
        skipped.skipped = true;
        assert_eq!(status_of(&skipped), "[!] Needs admin");
    }

    #[test]
    fn test_json_scan_shape() {
        let results = vec![result(true, true, 2048)];
        let json = JsonScan {
            version: "1.0",
            timestamp: String::new(),
            elevated: false,
            summary: JsonSummary {
                locations_scanned: 1,
                total_files: 1,
                total_bytes: 2048,
                total_human: human(2048),
                deletable_bytes: 2048,
                deletable_human: human(2048),
            },
            locations: &results,
        };
        let value = serde_json::to_value(&json).unwrap();
        assert_eq!(value["summary"]["total_bytes"], 2048);
        assert_eq!(value["locations"][0]["category"], "system");
        assert_eq!(value["locations"][0]["exists"], true);
    }
}
