//! Shared filesystem helpers
//!
//! Thin wrappers over `std::fs` that retry with the `\\?\` long-path prefix on
//! Windows, plus a few error classifications used by the scanner and cleaner.

use std::io;
use std::path::{Path, PathBuf};

/// Normalize a path for display (strip Windows long-path prefixes).
pub fn display_path(path: &Path) -> String {
    let path_str = path.to_string_lossy().to_string();
    #[cfg(windows)]
    {
        if let Some(stripped) = path_str.strip_prefix(r"\\?\UNC\") {
            return format!(r"\\{}", stripped);
        }
        if let Some(stripped) = path_str.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }
    path_str
}

/// Convert to long path format for Windows (\\?\)
///
/// Windows has a default path length limit of 260 characters (MAX_PATH).
/// The \\?\ prefix enables extended-length paths up to ~32,767 characters.
#[cfg(windows)]
pub fn to_long_path(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if s.starts_with(r"\\?\") {
            return path.to_path_buf();
        }
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    if let Some(s) = absolute.to_str() {
        PathBuf::from(format!(r"\\?\{}", s))
    } else {
        path.to_path_buf()
    }
}

#[cfg(not(windows))]
pub fn to_long_path(path: &Path) -> PathBuf {
    path.to_path_buf()
}

/// ERROR_PATH_NOT_FOUND, which Windows also returns for paths over MAX_PATH
#[cfg(windows)]
fn is_path_too_long(e: &io::Error) -> bool {
    e.raw_os_error() == Some(3)
}

/// Safe metadata that falls back to long path on Windows when normal access fails
#[cfg(windows)]
pub fn safe_metadata(path: &Path) -> io::Result<std::fs::Metadata> {
    match std::fs::metadata(path) {
        Ok(m) => Ok(m),
        Err(e) if is_path_too_long(&e) => std::fs::metadata(to_long_path(path)),
        Err(e) => Err(e),
    }
}

#[cfg(not(windows))]
pub fn safe_metadata(path: &Path) -> io::Result<std::fs::Metadata> {
    std::fs::metadata(path)
}

/// Safe symlink_metadata that falls back to long path on Windows
#[cfg(windows)]
pub fn safe_symlink_metadata(path: &Path) -> io::Result<std::fs::Metadata> {
    match std::fs::symlink_metadata(path) {
        Ok(m) => Ok(m),
        Err(e) if is_path_too_long(&e) => std::fs::symlink_metadata(to_long_path(path)),
        Err(e) => Err(e),
    }
}

#[cfg(not(windows))]
pub fn safe_symlink_metadata(path: &Path) -> io::Result<std::fs::Metadata> {
    std::fs::symlink_metadata(path)
}

/// Safe read_dir that falls back to long path on Windows
#[cfg(windows)]
pub fn safe_read_dir(path: &Path) -> io::Result<std::fs::ReadDir> {
    match std::fs::read_dir(path) {
        Ok(rd) => Ok(rd),
        Err(e) if is_path_too_long(&e) => std::fs::read_dir(to_long_path(path)),
        Err(e) => Err(e),
    }
}

#[cfg(not(windows))]
pub fn safe_read_dir(path: &Path) -> io::Result<std::fs::ReadDir> {
    std::fs::read_dir(path)
}

/// Safe remove_file that uses long path on Windows
#[cfg(windows)]
pub fn safe_remove_file(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if is_path_too_long(&e) => std::fs::remove_file(to_long_path(path)),
        Err(e) => Err(e),
    }
}

#[cfg(not(windows))]
pub fn safe_remove_file(path: &Path) -> io::Result<()> {
    std::fs::remove_file(path)
}

/// Safe remove_dir (empty directories only) that uses long path on Windows
#[cfg(windows)]
pub fn safe_remove_dir(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if is_path_too_long(&e) => std::fs::remove_dir(to_long_path(path)),
        Err(e) => Err(e),
    }
}

#[cfg(not(windows))]
pub fn safe_remove_dir(path: &Path) -> io::Result<()> {
    std::fs::remove_dir(path)
}

/// Returns true if this path is a Windows reparse point (junction/symlink/mount point).
///
/// `walkdir`'s `follow_links(false)` stops at symlinks, but junctions can still
/// be walked as normal directories and lead outside the location being cleaned.
pub fn is_windows_reparse_point(path: &Path) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x0400;
        if let Ok(meta) = std::fs::symlink_metadata(path) {
            return meta.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0;
        }
        false
    }
    #[cfg(not(windows))]
    {
        let _ = path;
        false
    }
}

/// True when the error means another process holds the file open
/// (ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION on Windows).
pub fn is_lock_error(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(32) | Some(33)) && cfg!(windows)
}
