//! Zip expansion for downloaded framework archives

use crate::error::{TpoError, TpoResult};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// Suffix of in-progress extraction directories
pub const EXTRACT_SUFFIX: &str = ".extract";

/// Expand `archive` so that its content ends up at `target`.
///
/// The archive is unpacked into a temporary sibling of `target`. Source-host
/// archives wrap everything in one top-level directory; when that is the
/// case the wrapper is stripped. The result is moved into place with a
/// single rename, so `target` never holds a partial tree.
pub fn expand_archive(archive: &Path, target: &Path) -> TpoResult<()> {
    let parent = target.parent().ok_or_else(|| {
        TpoError::Internal(format!("extraction target {} has no parent", target.display()))
    })?;
    let stem = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let staging = tempfile::Builder::new()
        .prefix(&format!("{stem}."))
        .suffix(EXTRACT_SUFFIX)
        .tempdir_in(parent)
        .map_err(|e| TpoError::io(format!("creating staging dir in {}", parent.display()), e))?;
    let contents = staging.path().join("contents");

    let file = File::open(archive)
        .map_err(|e| TpoError::io(format!("opening archive {}", archive.display()), e))?;
    let mut zip = ZipArchive::new(file)?;
    zip.extract(&contents)?;

    let source = content_root(&contents, archive)?;
    fs::rename(&source, target).map_err(|e| {
        TpoError::io(
            format!("moving {} into {}", source.display(), target.display()),
            e,
        )
    })?;

    debug!(archive = %archive.display(), target = %target.display(), "Archive expanded");
    Ok(())
}

/// The single top-level directory of an extracted tree, or the tree itself
fn content_root(contents: &Path, archive: &Path) -> TpoResult<PathBuf> {
    let children: Vec<PathBuf> = match fs::read_dir(contents) {
        Ok(read) => read.filter_map(Result::ok).map(|e| e.path()).collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            return Err(TpoError::io(
                format!("reading extracted tree {}", contents.display()),
                e,
            ))
        }
    };

    match children.as_slice() {
        [] => Err(TpoError::ArchiveLayout {
            path: archive.to_path_buf(),
            reason: "archive is empty".to_string(),
        }),
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Ok(contents.to_path_buf()),
    }
}
