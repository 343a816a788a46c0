use crate::utils;
use serde::Serialize;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Size totals for one path (or a set of paths once merged)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PathScan {
    pub total_bytes: u64,
    pub file_count: u64,
    /// Entries that could not be listed or measured. Scanning carries on past them.
    pub errors: Vec<String>,
}

impl PathScan {
    /// Fold another path's totals into this one
    pub fn merge(&mut self, other: PathScan) {
        self.total_bytes += other.total_bytes;
        self.file_count += other.file_count;
        self.errors.extend(other.errors);
    }
}

/// Measure a single file or a whole directory tree.
///
/// - Missing path: empty result, not an error
/// - File: its size and a count of 1
/// - Directory: every regular file below it; entries that fail are recorded
///   in `errors` and the walk continues
///
/// Symlinks and Windows reparse points are never followed.
pub fn scan_path(path: &Path) -> PathScan {
    let mut result = PathScan::default();

    let meta = match utils::safe_symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return result,
        Err(e) => {
            result.errors.push(format!("Error at {}: {}", utils::display_path(path), e));
            return result;
        }
    };

    if !meta.is_dir() {
        match utils::safe_metadata(path) {
            Ok(meta) => {
                result.total_bytes = meta.len();
                result.file_count = 1;
            }
            Err(e) => result
                .errors
                .push(format!("Error at {}: {}", utils::display_path(path), e)),
        }
        return result;
    }

    let walker = WalkDir::new(path)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !utils::is_windows_reparse_point(e.path()));

    for entry in walker {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                match entry.metadata() {
                    Ok(meta) => {
                        result.total_bytes += meta.len();
                        result.file_count += 1;
                    }
                    Err(e) => result.errors.push(walk_error(path, &e)),
                }
            }
            Err(e) => result.errors.push(walk_error(path, &e)),
        }
    }

    result
}

/// Scan several paths and add the results together
pub fn scan_paths<P: AsRef<Path>>(paths: &[P]) -> PathScan {
    let mut total = PathScan::default();
    for path in paths {
        total.merge(scan_path(path.as_ref()));
    }
    total
}

/// Like `scan_paths` for locations that name single files. A path that
/// turned out to be a directory is reported, not walked.
pub fn scan_files<P: AsRef<Path>>(paths: &[P]) -> PathScan {
    let mut total = PathScan::default();
    for path in paths {
        let path = path.as_ref();
        match utils::safe_symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => total.errors.push(unexpected_directory(path)),
            _ => total.merge(scan_path(path)),
        }
    }
    total
}

pub fn unexpected_directory(path: &Path) -> String {
    format!("Expected a file but found a directory: {}", utils::display_path(path))
}

fn walk_error(root: &Path, err: &walkdir::Error) -> String {
    let at = err.path().unwrap_or(root);
    match err.io_error() {
        Some(io_err) => format!("Error at {}: {}", utils::display_path(at), io_err),
        None => format!("Error at {}: {}", utils::display_path(at), err),
    }
}
