//! Interactive selection and confirmation
//!
//! Parsing is kept separate from terminal IO so it can be tested on its own.

use crate::orchestrator::ScanResult;
use crate::theme::Theme;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

/// What the user typed at the selection prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Quit,
    /// Zero-based indices into the offered list, in the order typed
    Indices(Vec<usize>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("invalid input '{0}': enter 'a', 'q' or numbers separated by commas")]
    Invalid(String),
}

/// Parse `a`, `q`, or a comma-separated list of 1-based numbers.
///
/// Numbers outside `1..=count` are ignored. Anything that is not a number
/// rejects the whole input.
pub fn parse_selection(input: &str, count: usize) -> Result<Selection, SelectionError> {
    let input = input.trim().to_lowercase();
    match input.as_str() {
        "a" | "all" => return Ok(Selection::All),
        "q" | "quit" => return Ok(Selection::Quit),
        _ => {}
    }

    let mut indices = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let number: usize = part.parse().map_err(|_| SelectionError::Invalid(input.clone()))?;
        if (1..=count).contains(&number) && !indices.contains(&(number - 1)) {
            indices.push(number - 1);
        }
    }
    Ok(Selection::Indices(indices))
}

/// `Some(true)` for yes, `Some(false)` for no, `None` for anything else
pub fn parse_confirmation(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" | "j" | "ja" => Some(true),
        "n" | "no" | "nein" => Some(false),
        _ => None,
    }
}

/// Print `question` and read one line. EOF reads as an empty answer.
pub fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<String> {
    write!(output, "{question}")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Yes/no question; anything unrecognised counts as no
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    let answer = ask(input, output, &format!("{question} [y/N]: "))?;
    Ok(parse_confirmation(&answer).unwrap_or(false))
}

/// Like `confirm`, but a cancel request that arrived while the prompt was
/// waiting turns a yes into a no.
pub fn confirm_unless_cancelled<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    cancel: &AtomicBool,
) -> io::Result<bool> {
    let answer = confirm(input, output, question)?;
    Ok(answer && !cancel.load(Ordering::SeqCst))
}

/// Offer `candidates` (already sorted) and return the chosen names.
///
/// `None` means the user quit or gave unusable input.
pub fn choose_locations<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    candidates: &[&ScanResult],
) -> io::Result<Option<Vec<String>>> {
    writeln!(output)?;
    writeln!(output, "{}", Theme::header("The following locations can be cleaned:"))?;
    writeln!(output)?;
    for (i, result) in candidates.iter().enumerate() {
        writeln!(output, "{:>3}. {}", i + 1, Theme::primary(&result.name))?;
        writeln!(
            output,
            "     {}, {} files",
            Theme::size(&result.size_human()),
            result.file_count
        )?;
        for path in &result.resolved_paths {
            writeln!(output, "     {}", Theme::muted(&crate::utils::display_path(path)))?;
        }
    }
    writeln!(output)?;
    writeln!(output, "  {}  clean all", Theme::command("a"))?;
    writeln!(output, "  {}  clean specific numbers (comma-separated)", Theme::command("1,2,3"))?;
    writeln!(output, "  {}  quit", Theme::command("q"))?;
    writeln!(output)?;

    let answer = ask(input, output, "Your choice: ")?;
    let names = match parse_selection(&answer, candidates.len()) {
        Ok(Selection::Quit) => return Ok(None),
        Ok(Selection::All) => candidates.iter().map(|r| r.name.clone()).collect(),
        Ok(Selection::Indices(indices)) => indices.iter().map(|&i| candidates[i].name.clone()).collect(),
        Err(e) => {
            writeln!(output, "{}", Theme::error(&e.to_string()))?;
            return Ok(None);
        }
    };
    Ok(Some(names))
}
