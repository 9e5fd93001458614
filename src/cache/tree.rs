//! Directory tree helpers: copy, size and best-effort removal

use crate::error::{TpoError, TpoResult};
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

/// Copy `src` recursively into `dst` (created if missing).
///
/// Regular files and directories are copied; symlinks are never created,
/// so the copy is self-contained on any filesystem.
pub fn copy_tree(src: &Path, dst: &Path) -> TpoResult<u64> {
    fs::create_dir_all(dst)
        .map_err(|e| TpoError::io(format!("creating directory {}", dst.display()), e))?;

    let mut copied = 0u64;
    for entry in WalkDir::new(src).min_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| {
            let context = format!("walking {}", src.display());
            match e.into_io_error() {
                Some(source) => TpoError::io(context, source),
                None => TpoError::Internal(format!("{context}: filesystem loop")),
            }
        })?;

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| TpoError::Internal(format!("path outside copy root: {e}")))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                TpoError::io(format!("creating directory {}", target.display()), e)
            })?;
        } else if entry.file_type().is_file() {
            copied += fs::copy(entry.path(), &target).map_err(|e| {
                TpoError::io(
                    format!(
                        "copying {} to {}",
                        entry.path().display(),
                        target.display()
                    ),
                    e,
                )
            })?;
        }
    }

    Ok(copied)
}

/// Total size in bytes of all regular files below `root`.
///
/// Unreadable entries are skipped.
pub fn tree_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Remove a file or directory tree. Missing paths are not an error.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };

    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Format bytes as human-readable size (e.g., "1.5 MB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Whether `dir` exists and has no entries
pub fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

/// Modification time of `path`, or the epoch if unavailable
pub fn modified(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
