//! Console styling shared by all human-readable output

use crate::catalog::Priority;
use colored::{ColoredString, Colorize};

pub struct Theme;

impl Theme {
    pub fn header(text: &str) -> ColoredString {
        text.bold().cyan()
    }

    pub fn primary(text: &str) -> ColoredString {
        text.bold()
    }

    pub fn secondary(text: &str) -> ColoredString {
        text.normal()
    }

    pub fn muted(text: &str) -> ColoredString {
        text.dimmed()
    }

    pub fn value(text: &str) -> ColoredString {
        text.white()
    }

    pub fn size(text: &str) -> ColoredString {
        text.yellow()
    }

    pub fn command(text: &str) -> ColoredString {
        text.cyan()
    }

    pub fn success(text: &str) -> ColoredString {
        text.green()
    }

    pub fn warning(text: &str) -> ColoredString {
        text.yellow().bold()
    }

    pub fn error(text: &str) -> ColoredString {
        text.red().bold()
    }

    pub fn priority(priority: Priority) -> ColoredString {
        let text = priority.as_str();
        match priority {
            Priority::Critical => text.red().bold(),
            Priority::High => text.yellow().bold(),
            Priority::Medium => text.cyan(),
            Priority::Low => text.normal(),
            Priority::Never => text.dimmed(),
        }
    }

    pub fn divider(width: usize) -> ColoredString {
        "─".repeat(width).dimmed()
    }

    pub fn divider_bold(width: usize) -> ColoredString {
        "━".repeat(width).bold()
    }
}
