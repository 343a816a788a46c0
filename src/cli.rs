use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc};

use crate::catalog::{self, Category, LocationDescriptor, Priority};
use crate::cleaner::Cleaner;
use crate::config::Config;
use crate::history::{self, CleanupLog};
use crate::orchestrator::{CleanupSummary, Orchestrator};
use crate::output::{self, OutputMode};
use crate::progress;
use crate::prompt;
use crate::report::{self, ReportOptions};
use crate::resolver::EnvExpander;
use crate::system::{Elevation, HostSystem, SystemOps};
use crate::theme::Theme;

#[derive(Parser)]
#[command(name = "tempsweep")]
#[command(version)]
#[command(about = "Find and remove temporary files, caches and logs on Windows")]
#[command(long_about = "tempsweep measures a catalog of known cache, log and temp locations \
    and deletes their contents after confirmation.\n\n\
    Without a subcommand it scans, writes a Markdown report and asks what to clean.\n\n\
    Examples:\n  \
    tempsweep scan                      # Scan every location\n  \
    tempsweep scan --category browser   # Only browser caches\n  \
    tempsweep clean --all -y            # Clean everything that is safe, no questions\n  \
    tempsweep clean --location \"User Temp\" --dry-run")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Increase output verbosity (-v, -vv for more)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Measure all locations (read-only, safe to run anytime)
    #[command(visible_alias = "s")]
    Scan {
        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Only scan locations of this category
        #[arg(long, value_enum)]
        category: Option<Category>,

        /// Only scan locations of this priority
        #[arg(long, value_enum)]
        priority: Option<Priority>,

        /// Do not write the Markdown report
        #[arg(long)]
        no_report: bool,

        /// Scan locations in parallel
        #[arg(long)]
        parallel: bool,

        /// Skip a location by name (repeatable)
        #[arg(long, value_name = "NAME")]
        exclude: Vec<String>,
    },

    /// Scan, then delete the contents of the chosen locations
    #[command(visible_alias = "c")]
    Clean {
        /// Clean every location that is safe to delete
        #[arg(short = 'a', long, conflicts_with = "location")]
        all: bool,

        /// Clean this location (repeatable)
        #[arg(short = 'l', long, value_name = "NAME")]
        location: Vec<String>,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        /// Show what would be deleted without deleting anything
        #[arg(long)]
        dry_run: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Skip a location by name (repeatable)
        #[arg(long, value_name = "NAME")]
        exclude: Vec<String>,
    },

    /// Show the catalog of known locations
    List {
        #[arg(long, value_enum)]
        category: Option<Category>,

        #[arg(long, value_enum)]
        priority: Option<Priority>,

        /// Only locations that may be deleted
        #[arg(long)]
        safe: bool,
    },

    /// Analyze or clean up the Windows component store (WinSxS)
    ComponentStore {
        /// Only report the store size and whether cleanup is recommended
        #[arg(long)]
        analyze: bool,

        /// Also remove superseded versions permanently (cannot be undone)
        #[arg(long, conflicts_with = "analyze")]
        reset_base: bool,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show or reset the configuration
    Config {
        /// Reset the configuration to defaults
        #[arg(long)]
        reset: bool,
    },

    /// Show recent cleanup logs
    History {
        /// Number of logs to show
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from_flags(self.verbose, self.quiet)
    }

    /// Run the selected command. `cancel` is set on Ctrl-C.
    pub fn run(self, cancel: Arc<AtomicBool>) -> Result<()> {
        let mode = self.output_mode();
        match self.command {
            None => run_interactive(mode, cancel),
            Some(Commands::Scan {
                json,
                category,
                priority,
                no_report,
                parallel,
                exclude,
            }) => {
                let mut config = Config::load();
                config.apply_cli_overrides(parallel.then_some(true), &exclude, no_report || json);
                let locations = filtered_locations(category, priority, false)
                    .into_iter()
                    .cloned()
                    .collect();
                run_scan(&config, locations, json, mode, cancel)
            }
            Some(Commands::Clean {
                all,
                location,
                yes,
                dry_run,
                json,
                exclude,
            }) => {
                let mut config = Config::load();
                config.apply_cli_overrides(None, &exclude, true);
                for name in &location {
                    if catalog::find(name).is_none() {
                        anyhow::bail!("Unknown location '{}'. Run 'tempsweep list' to see all names.", name);
                    }
                }
                let request = CleanRequest {
                    all,
                    locations: location,
                    yes,
                    dry_run,
                    json,
                };
                run_clean(&config, request, mode, cancel)
            }
            Some(Commands::List { category, priority, safe }) => {
                output::print_catalog(&filtered_locations(category, priority, safe), mode);
                Ok(())
            }
            Some(Commands::ComponentStore { analyze, reset_base, yes }) => {
                run_component_store(analyze, reset_base, yes, mode)
            }
            Some(Commands::Config { reset }) => {
                if reset {
                    Config::default().save()?;
                    println!("{} Configuration reset to defaults.", Theme::success("OK"));
                } else {
                    show_config()?;
                }
                Ok(())
            }
            Some(Commands::History { limit }) => show_history(limit),
        }
    }
}

struct CleanRequest {
    all: bool,
    locations: Vec<String>,
    yes: bool,
    dry_run: bool,
    json: bool,
}

fn filtered_locations(
    category: Option<Category>,
    priority: Option<Priority>,
    safe_only: bool,
) -> Vec<&'static LocationDescriptor> {
    let base = match (category, priority) {
        (Some(category), _) => catalog::by_category(category),
        (None, Some(priority)) => catalog::by_priority(priority),
        (None, None) if safe_only => catalog::safe_locations(),
        (None, None) => catalog::all().iter().collect(),
    };
    base.into_iter()
        .filter(|loc| priority.map_or(true, |p| loc.priority == p))
        .filter(|loc| !safe_only || loc.safe_delete)
        .collect()
}

fn report_options(config: &Config) -> ReportOptions {
    ReportOptions {
        max_listed_errors: config.report.max_listed_errors,
        large_location_bytes: config.report.large_location_mb * 1024 * 1024,
    }
}

/// Scan with a progress bar unless output is quiet or machine-readable
fn scan_with_progress(run: &mut Orchestrator<'_>, show_progress: bool) -> Result<()> {
    if !show_progress {
        run.scan()?;
        return Ok(());
    }

    let (tx, rx) = mpsc::channel();
    let pb = progress::create_progress_bar(0, "Scanning...");
    let handle = progress::follow_events(rx, pb);
    run.set_events(Some(tx));
    let result = run.scan().map(|_| ());
    run.set_events(None);
    let _ = handle.join();
    result?;
    Ok(())
}

fn clean_with_progress(run: &mut Orchestrator<'_>, show_progress: bool) -> Result<CleanupSummary> {
    if !show_progress {
        return Ok(run.delete_selected()?);
    }

    let (tx, rx) = mpsc::channel();
    let pb = progress::create_progress_bar(0, "Cleaning...");
    let handle = progress::follow_events(rx, pb);
    run.set_events(Some(tx));
    let result = run.delete_selected();
    run.set_events(None);
    let _ = handle.join();
    Ok(result?)
}

fn write_report_if_enabled(run: &Orchestrator<'_>, config: &Config, mode: OutputMode) -> Option<std::path::PathBuf> {
    if !config.report.write_markdown {
        return None;
    }
    match report::write_report(&run.report(), &config.report_dir(), report_options(config)) {
        Ok(path) => {
            if mode != OutputMode::Quiet {
                println!("Report written to {}", Theme::command(&path.display().to_string()));
            }
            Some(path)
        }
        Err(e) => {
            eprintln!("{} {:#}", Theme::error("[WARNING]"), e);
            None
        }
    }
}

fn run_scan(
    config: &Config,
    locations: Vec<LocationDescriptor>,
    json: bool,
    mode: OutputMode,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    let system = HostSystem;
    let expander = EnvExpander::new();
    let mut run = Orchestrator::new(&system, &expander, system.elevation())
        .with_locations(locations)
        .with_options(config.run_options(false))
        .with_cancel_token(cancel);

    scan_with_progress(&mut run, !json && mode != OutputMode::Quiet)?;

    if json {
        output::print_scan_json(&run.report())?;
    } else {
        output::print_scan_human(&run.report(), mode);
        write_report_if_enabled(&run, config, mode);
    }
    Ok(())
}

fn run_clean(config: &Config, request: CleanRequest, mode: OutputMode, cancel: Arc<AtomicBool>) -> Result<()> {
    let system = HostSystem;
    let expander = EnvExpander::new();
    let elevation = system.elevation();
    let mut run = Orchestrator::new(&system, &expander, elevation)
        .with_options(config.run_options(request.dry_run))
        .with_cancel_token(cancel);

    let show_progress = !request.json && mode != OutputMode::Quiet;
    scan_with_progress(&mut run, show_progress)?;

    if request.all {
        if run.deletable().is_empty() {
            println!("{}", Theme::success("Nothing to clean up."));
            return Ok(());
        }
        run.select_all()?;
    } else if !request.locations.is_empty() {
        run.select(request.locations.as_slice())?;
    } else {
        let candidates = run.deletable();
        if candidates.is_empty() {
            println!("{}", Theme::success("Nothing to clean up."));
            return Ok(());
        }
        let stdin = io::stdin();
        let chosen = prompt::choose_locations(&mut stdin.lock(), &mut io::stdout(), &candidates)?;
        match chosen {
            Some(names) if !names.is_empty() => run.select(names.as_slice())?,
            Some(_) => {
                println!("{}", Theme::muted("No locations selected."));
                return Ok(());
            }
            None => {
                println!("{}", Theme::muted("Cancelled."));
                return Ok(());
            }
        }
    }

    if !request.yes && !request.dry_run && !confirm_selection(&run)? {
        println!("{}", Theme::muted("Cancelled."));
        return Ok(());
    }

    let summary = clean_with_progress(&mut run, show_progress)?;
    finish_cleanup(config, &summary, request.json, mode)
}

fn confirm_selection(run: &Orchestrator<'_>) -> Result<bool> {
    let total: u64 = run
        .selection()
        .iter()
        .filter_map(|name| run.result(name))
        .map(|r| r.total_bytes)
        .sum();
    println!();
    println!(
        "{} You are about to permanently delete {}.",
        Theme::warning("WARNING:"),
        Theme::size(&bytesize::to_string(total, true))
    );
    println!("Locations: {}", run.selection().join(", "));
    let stdin = io::stdin();
    let cancel = run.cancel_token();
    Ok(prompt::confirm_unless_cancelled(
        &mut stdin.lock(),
        &mut io::stdout(),
        "Really delete?",
        &cancel,
    )?)
}

fn finish_cleanup(config: &Config, summary: &CleanupSummary, json: bool, mode: OutputMode) -> Result<()> {
    if json {
        output::print_cleanup_json(summary)?;
    } else {
        output::print_cleanup_human(summary, mode);
    }

    if config.history.enabled && !summary.dry_run && !summary.outcomes.is_empty() {
        let mut log = CleanupLog::new();
        for outcome in &summary.outcomes {
            log.log_outcome(outcome);
        }
        log.cancelled = summary.cancelled;
        match log.save() {
            Ok(path) => tracing::info!("cleanup log saved to {}", path.display()),
            Err(e) => eprintln!("{} Could not save cleanup log: {:#}", Theme::error("[WARNING]"), e),
        }
    }
    Ok(())
}

fn run_interactive(mode: OutputMode, cancel: Arc<AtomicBool>) -> Result<()> {
    let config = Config::load();
    let system = HostSystem;
    let expander = EnvExpander::new();
    let elevation = system.elevation();

    println!();
    println!("{}", Theme::header("tempsweep - temporary file scanner & cleaner"));
    println!("{}", Theme::divider_bold(60));
    if elevation == Elevation::NotElevated {
        println!(
            "{}",
            Theme::muted("Not running as administrator: system locations will be skipped.")
        );
    }

    let mut run = Orchestrator::new(&system, &expander, elevation)
        .with_options(config.run_options(false))
        .with_cancel_token(cancel);
    scan_with_progress(&mut run, mode != OutputMode::Quiet)?;
    output::print_scan_human(&run.report(), mode);
    let report_path = write_report_if_enabled(&run, &config, mode);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();

    let candidates = run.deletable();
    if candidates.is_empty() {
        println!("{}", Theme::success("Nothing to clean up."));
        return Ok(());
    }
    if !prompt::confirm(&mut input, &mut out, "Clean up files now?")? {
        println!("{}", Theme::muted("No cleanup performed."));
        return Ok(());
    }

    let Some(names) = prompt::choose_locations(&mut input, &mut out, &candidates)? else {
        println!("{}", Theme::muted("Cancelled."));
        return Ok(());
    };
    if names.is_empty() {
        println!("{}", Theme::muted("No locations selected."));
        return Ok(());
    }
    run.select(names.as_slice())?;
    drop(input);

    if !confirm_selection(&run)? {
        println!("{}", Theme::muted("Cancelled."));
        return Ok(());
    }

    let summary = clean_with_progress(&mut run, mode != OutputMode::Quiet)?;
    finish_cleanup(&config, &summary, false, mode)?;
    if let Some(path) = report_path {
        println!("Scan report: {}", Theme::command(&path.display().to_string()));
    }
    Ok(())
}

fn run_component_store(analyze: bool, reset_base: bool, yes: bool, mode: OutputMode) -> Result<()> {
    let config = Config::load();
    let system = HostSystem;
    let elevation = system.elevation();

    if !elevation.is_elevated() {
        anyhow::bail!("Component store maintenance requires an elevated (administrator) prompt.");
    }

    if analyze {
        let spinner = (mode != OutputMode::Quiet).then(|| progress::create_spinner("Analyzing component store..."));
        let analysis = system.analyze_component_store(config.analyze_timeout());
        if let Some(pb) = &spinner {
            progress::finish_and_clear(pb);
        }
        output::print_component_store_analysis(&analysis.context("Component store analysis failed")?);
        return Ok(());
    }

    if reset_base {
        println!(
            "{}",
            Theme::warning("--reset-base removes superseded updates permanently; they can no longer be uninstalled.")
        );
    }
    if !yes {
        let stdin = io::stdin();
        if !prompt::confirm(&mut stdin.lock(), &mut io::stdout(), "Start component store cleanup? This can take several minutes.")? {
            println!("{}", Theme::muted("Cancelled."));
            return Ok(());
        }
    }

    let spinner = (mode != OutputMode::Quiet).then(|| progress::create_spinner("Cleaning up component store..."));
    let outcome = Cleaner::new(&system, elevation).compact_component_store(reset_base, config.maintenance_timeout());
    if let Some(pb) = &spinner {
        progress::finish_and_clear(pb);
    }
    output::print_maintenance(&outcome);
    if !outcome.success {
        anyhow::bail!("Component store cleanup did not complete");
    }
    Ok(())
}

fn show_config() -> Result<()> {
    let config = Config::load_or_create();
    println!("{}", Theme::header("Current Configuration"));
    println!("{}", Theme::divider_bold(60));
    println!();
    println!("Cleanup:");
    println!("  Retry attempts: {}", config.cleanup.retry_attempts);
    println!("  Retry delay: {} ms", config.cleanup.retry_delay_ms);
    println!("  Exponential backoff: {}", config.cleanup.exponential_backoff);
    println!("  Prune empty directories: {}", config.cleanup.prune_empty_dirs);
    println!("  Remove empty location root: {}", config.cleanup.remove_empty_root);
    println!();
    println!("Scan:");
    println!("  Parallel: {}", config.scan.parallel);
    println!();
    println!("Maintenance:");
    println!("  Cleanup timeout: {} s", config.maintenance.timeout_secs);
    println!("  Analyze timeout: {} s", config.maintenance.analyze_timeout_secs);
    println!();
    println!("Report:");
    match &config.report.directory {
        Some(dir) => println!("  Directory: {}", dir),
        None => println!("  Directory: (current directory)"),
    }
    println!("  Write Markdown: {}", config.report.write_markdown);
    println!("  Max listed errors: {}", config.report.max_listed_errors);
    println!("  Large location threshold: {} MB", config.report.large_location_mb);
    println!();
    println!("Exclusions:");
    if config.exclusions.locations.is_empty() {
        println!("  (none)");
    } else {
        for name in &config.exclusions.locations {
            println!("  {}", name);
        }
    }
    println!();
    println!("History:");
    println!("  Enabled: {}", config.history.enabled);
    println!();
    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
    Ok(())
}

fn show_history(limit: usize) -> Result<()> {
    let logs = history::list_logs()?;
    if logs.is_empty() {
        println!("{}", Theme::muted("No cleanup history yet."));
        return Ok(());
    }

    println!("{}", Theme::header("Cleanup History"));
    println!("{}", Theme::divider_bold(60));
    for path in logs.iter().take(limit) {
        match history::load_log(path) {
            Ok(log) => {
                let when = log.session_start.with_timezone(&chrono::Local);
                let mut line = format!("{}  {}", when.format("%Y-%m-%d %H:%M:%S"), log.summary());
                if log.cancelled {
                    line.push_str(" (interrupted)");
                }
                println!("{}", line);
            }
            Err(e) => println!("{} {:#}", Theme::error("[unreadable]"), e),
        }
    }
    if logs.len() > limit {
        println!("{}", Theme::muted(&format!("... and {} older logs", logs.len() - limit)));
    }
    Ok(())
}
