use crate::scan_events::ProgressEvent;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Create a spinner for indeterminate progress
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Create a progress bar for determinate progress
pub fn create_progress_bar(total: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Drive a progress bar from orchestrator events on a background thread.
///
/// The thread ends when the sending side is dropped.
pub fn follow_events(rx: Receiver<ProgressEvent>, pb: ProgressBar) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in rx {
            match event {
                ProgressEvent::ScanStarted { name, index, total, .. } => {
                    if index == 0 {
                        pb.set_position(0);
                    }
                    pb.set_length(total as u64);
                    pb.set_message(format!("Scanning {name}"));
                }
                ProgressEvent::ScanFinished { .. } => pb.inc(1),
                ProgressEvent::CleanupStarted { name, index, total } => {
                    if index == 0 {
                        pb.set_position(0);
                    }
                    pb.set_length(total as u64);
                    pb.set_message(format!("Cleaning {name}"));
                }
                ProgressEvent::CleanupFinished { .. } => pb.inc(1),
                ProgressEvent::Cancelled { .. } => pb.set_message("Cancelling..."),
            }
        }
        pb.finish_and_clear();
    })
}

/// Finish and clear progress bar
pub fn finish_and_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}
