use anyhow::Result;
use clap::Parser;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempsweep::cli::Cli;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) | (false, 0) => "error",
        (false, 1) => "info",
        _ => "debug",
    };
    // RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tempsweep={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// First Ctrl-C asks the run to stop before its next location, a second one exits.
fn install_interrupt_handler() -> Result<Arc<AtomicBool>> {
    use signal_hook::consts::SIGINT;
    use signal_hook::flag;

    let cancel = Arc::new(AtomicBool::new(false));
    flag::register_conditional_shutdown(SIGINT, 130, Arc::clone(&cancel))?;
    flag::register(SIGINT, Arc::clone(&cancel))?;
    Ok(cancel)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let cancel = install_interrupt_handler()?;
    cli.run(cancel)
}
