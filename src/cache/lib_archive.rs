//! Prebuilt library archives reused across builds
//!
//! Object files of a compiled library are packed into a static archive
//! keyed by library, version, platform and build flags:
//! `<cache root>/lib_archives/<platform>/<lib>-<version>-<fp8>.a`.

use crate::cache::fingerprint::short_hash;
use crate::cache::naming::{sanitize_name, validate_name};
use crate::constants::LIB_ARCHIVE_DIR;
use crate::error::{TpoError, TpoResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Smallest size of a well-formed archive (the `!<arch>\n` magic)
const MIN_ARCHIVE_LEN: u64 = 8;

const DEFAULT_AR_TOOL: &str = "ar";

/// Static library archives stored under a local cache root
#[derive(Debug, Clone)]
pub struct LibArchiveStore {
    root: PathBuf,
    ar_tool: String,
}

impl LibArchiveStore {
    /// Store inside the local cache rooted at `cache_root`
    pub fn new(cache_root: &Path) -> Self {
        Self {
            root: cache_root.join(LIB_ARCHIVE_DIR),
            ar_tool: DEFAULT_AR_TOOL.to_string(),
        }
    }

    /// Use a different archiver (e.g. a cross toolchain's `ar`)
    pub fn with_ar_tool(mut self, tool: impl Into<String>) -> Self {
        self.ar_tool = tool.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fingerprint of one library build configuration. Flag order does not
    /// matter.
    pub fn fingerprint(library: &str, version: &str, platform: &str, flags: &[String]) -> String {
        let mut sorted: Vec<&str> = flags.iter().map(String::as_str).collect();
        sorted.sort_unstable();

        let lower = library.to_lowercase();
        let mut components = vec![lower.as_str(), version, platform];
        components.extend(sorted);
        short_hash(&components.join("|"))
    }

    /// Where the archive for this configuration lives
    pub fn archive_path(
        &self,
        library: &str,
        version: &str,
        platform: &str,
        flags: &[String],
    ) -> TpoResult<PathBuf> {
        let platform = sanitize_name(platform, "platform")?;
        let fingerprint = Self::fingerprint(library, version, &platform, flags);
        let name = format!("{}-{}-{}.a", library.to_lowercase(), version, fingerprint);
        validate_name(&name, "library archive")?;
        Ok(self.root.join(platform).join(name))
    }

    /// Whether `archive` exists and is large enough to be an archive
    pub fn is_valid(archive: &Path) -> bool {
        match fs::metadata(archive) {
            Ok(meta) if meta.len() >= MIN_ARCHIVE_LEN => true,
            Ok(_) => {
                warn!(archive = %archive.display(), "Archive is too small, likely corrupted");
                false
            }
            Err(_) => false,
        }
    }

    /// Object files of `library` in a build directory
    /// (`<build_dir>/lib*/<library>/**/*.o`), sorted
    pub fn find_objects(build_dir: &Path, library: &str) -> Vec<PathBuf> {
        let lower = library.to_lowercase();
        let lib_dirs = fs::read_dir(build_dir)
            .map(|read| {
                read.filter_map(Result::ok)
                    .filter(|e| e.file_name().to_string_lossy().starts_with("lib"))
                    .map(|e| e.path().join(&lower))
                    .filter(|p| p.is_dir())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let mut objects: Vec<PathBuf> = lib_dirs
            .iter()
            .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(Result::ok))
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "o"))
            .collect();
        objects.sort();

        debug!(library, count = objects.len(), "Found library objects");
        objects
    }

    /// Pack `objects` into `archive` with `ar rcs`.
    ///
    /// The archive is built in a staging directory and renamed into place,
    /// replacing any previous archive. Returns the archive size.
    pub fn create_from_objects(&self, objects: &[PathBuf], archive: &Path) -> TpoResult<u64> {
        if objects.is_empty() {
            return Err(TpoError::ArchiveTool {
                tool: self.ar_tool.clone(),
                reason: "no object files to archive".to_string(),
            });
        }

        let dir = archive.parent().ok_or_else(|| {
            TpoError::Internal(format!("archive path {} has no parent", archive.display()))
        })?;
        fs::create_dir_all(dir)
            .map_err(|e| TpoError::io(format!("creating {}", dir.display()), e))?;

        let staging = tempfile::Builder::new()
            .prefix(".archive.")
            .tempdir_in(dir)
            .map_err(|e| TpoError::io(format!("creating staging dir in {}", dir.display()), e))?;
        let staged = staging.path().join("lib.a");

        debug!(tool = %self.ar_tool, count = objects.len(), "Creating archive");
        let output = Command::new(&self.ar_tool)
            .arg("rcs")
            .arg(&staged)
            .args(objects)
            .output()
            .map_err(|e| TpoError::ArchiveTool {
                tool: self.ar_tool.clone(),
                reason: if e.kind() == io::ErrorKind::NotFound {
                    "not found on PATH".to_string()
                } else {
                    e.to_string()
                },
            })?;

        if !output.status.success() {
            return Err(TpoError::ArchiveTool {
                tool: self.ar_tool.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        fs::rename(&staged, archive)
            .map_err(|e| TpoError::io(format!("moving archive into {}", archive.display()), e))?;
        let size = fs::metadata(archive)
            .map(|m| m.len())
            .map_err(|e| TpoError::io(format!("reading {}", archive.display()), e))?;

        info!(archive = %archive.display(), size, "Library archive created");
        Ok(size)
    }

    /// Copy `archive` into a build's library directory for linking
    pub fn install_into(archive: &Path, build_lib_dir: &Path) -> TpoResult<PathBuf> {
        let name = archive.file_name().ok_or_else(|| {
            TpoError::Internal(format!("archive path {} has no file name", archive.display()))
        })?;
        fs::create_dir_all(build_lib_dir)
            .map_err(|e| TpoError::io(format!("creating {}", build_lib_dir.display()), e))?;

        let target = build_lib_dir.join(name);
        fs::copy(archive, &target).map_err(|e| {
            TpoError::io(
                format!("copying {} to {}", archive.display(), target.display()),
                e,
            )
        })?;

        debug!(target = %target.display(), "Archive installed");
        Ok(target)
    }
}
