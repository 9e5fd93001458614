//! Global artifact cache: immutable framework and library archives
//!
//! Artifacts are addressed by repository and branch:
//!
//! ```text
//! <root>/<host>/<owner>/<repo>/<branch>-<hash8>.zip
//! <root>/<host>/<owner>/<repo>/<branch>-<hash8>.zip.lock
//! <root>/<host>/<owner>/<repo>/<branch>-<hash8>_dir/
//! <root>/<host>/<owner>/<repo>/<branch>-<hash8>_dir.lock
//! <root>/<host>/<owner>/<repo>/<branch>-<hash8>_dir.done
//! ```
//!
//! # Completion protocol
//!
//! An expanded directory is a hit only when its `.done` marker exists. The
//! archive is downloaded to a temp file and renamed into place; the directory
//! is extracted to a temp sibling and renamed into place; the marker is
//! written last. A process killed at any point leaves state that the next
//! lock holder discards and rebuilds.
//!
//! # Cache States
//!
//! | State | On disk | Lookup |
//! |-------|---------|--------|
//! | Missing | no directory | download and expand |
//! | Incomplete | directory without marker | discard and re-expand |
//! | Complete | directory and marker | returned without locking |

use crate::cache::archive::{expand_archive, EXTRACT_SUFFIX};
use crate::cache::fetch::{ArchiveFetcher, HttpFetcher};
use crate::cache::fingerprint::short_hash;
use crate::cache::lock::{self, FileLock};
use crate::cache::naming::sanitize_name;
use crate::cache::tree::{is_empty_dir, modified, remove_path, tree_size};
use crate::cache::CleanupReport;
use crate::constants::{
    CLEANUP_LOCK_TIMEOUT, DEFAULT_BRANCHES, GLOBAL_CACHE_DIR, GLOBAL_LOCK_TIMEOUT,
};
use crate::error::{TpoError, TpoResult};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Suffix of in-progress archive downloads
const PART_SUFFIX: &str = ".part";

const DIR_SUFFIX: &str = "_dir";
const DONE_SUFFIX: &str = ".done";
const LOCK_SUFFIX: &str = ".lock";

/// Pause before purge retries items that were busy on the first pass
const PURGE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A source repository URL split into its cache path components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoUrl {
    pub host: String,
    pub owner: String,
    pub repo: String,
    /// The URL as given, without trailing `/` or `.git`
    base: String,
}

impl RepoUrl {
    /// Parse `https://host/owner/repo[.git]`
    pub fn parse(url: &str) -> TpoResult<Self> {
        let invalid = |reason: &str| TpoError::InvalidSourceUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = url.trim().trim_end_matches('/');
        let base = trimmed.strip_suffix(".git").unwrap_or(trimmed);

        let (scheme, rest) = base
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme (expected https://host/owner/repo)"))?;
        if scheme != "https" && scheme != "http" {
            return Err(invalid("only http and https URLs are supported"));
        }

        let (host, path) = rest
            .split_once('/')
            .ok_or_else(|| invalid("missing owner and repository"))?;
        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let (Some(owner), Some(repo)) = (parts.next(), parts.next()) else {
            return Err(invalid("expected host/owner/repo"));
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(Self {
            host: sanitize_name(host, "host")?,
            owner: sanitize_name(owner, "owner")?,
            repo: sanitize_name(repo, "repository")?,
            base: base.to_string(),
        })
    }

    /// Branch archive download URL
    pub fn archive_url(&self, branch: &str) -> String {
        format!("{}/archive/refs/heads/{}.zip", self.base, branch)
    }

    /// Directory holding this repository's artifacts, relative to the root
    pub fn relative_dir(&self) -> PathBuf {
        [&self.host, &self.owner, &self.repo].iter().collect()
    }
}

impl fmt::Display for RepoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{}/{}/{}", self.host, self.owner, self.repo)
    }
}

/// Address of one artifact in the global cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalCacheKey {
    pub repo: RepoUrl,
    pub branch: String,
    /// Stands in for the commit: the first 8 hex chars of the archive URL's
    /// SHA256, so a branch that moves keeps the same key.
    pub hash: String,
}

impl GlobalCacheKey {
    pub fn new(repo: &RepoUrl, branch: &str) -> TpoResult<Self> {
        let branch = sanitize_name(branch, "branch")?;
        Ok(Self {
            hash: short_hash(&repo.archive_url(&branch)),
            repo: repo.clone(),
            branch,
        })
    }

    pub fn archive_url(&self) -> String {
        self.repo.archive_url(&self.branch)
    }

    /// `<branch>-<hash8>`
    pub fn stem(&self) -> String {
        format!("{}-{}", self.branch, self.hash)
    }
}

/// On-disk paths of one artifact
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub archive: PathBuf,
    pub archive_lock: PathBuf,
    pub dir: PathBuf,
    pub dir_lock: PathBuf,
    pub done: PathBuf,
}

impl ArtifactPaths {
    fn new(repo_dir: &Path, stem: &str) -> Self {
        Self {
            archive: repo_dir.join(format!("{stem}.zip")),
            archive_lock: repo_dir.join(format!("{stem}.zip{LOCK_SUFFIX}")),
            dir: repo_dir.join(format!("{stem}{DIR_SUFFIX}")),
            dir_lock: repo_dir.join(format!("{stem}{DIR_SUFFIX}{LOCK_SUFFIX}")),
            done: repo_dir.join(format!("{stem}{DIR_SUFFIX}{DONE_SUFFIX}")),
        }
    }

    /// Paths for an expanded directory found on disk
    fn from_dir(dir: &Path) -> Option<Self> {
        let name = dir.file_name()?.to_str()?;
        let stem = name.strip_suffix(DIR_SUFFIX)?;
        Some(Self::new(dir.parent()?, stem))
    }

    pub fn state(&self) -> ArtifactState {
        match (self.dir.is_dir(), self.done.is_file()) {
            (true, true) => ArtifactState::Complete,
            (true, false) => ArtifactState::Incomplete,
            _ => ArtifactState::Missing,
        }
    }
}

/// State of an expanded artifact directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Nothing expanded yet
    Missing,
    /// Directory present without its marker (crashed or in progress)
    Incomplete,
    /// Directory and marker present; immutable
    Complete,
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Incomplete => write!(f, "incomplete"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Shared, content-addressed cache of downloaded repositories
#[derive(Clone)]
pub struct GlobalCache {
    root: PathBuf,
    fetcher: Arc<dyn ArchiveFetcher>,
    lock_timeout: Duration,
    cleanup_timeout: Duration,
}

impl fmt::Debug for GlobalCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalCache")
            .field("root", &self.root)
            .field("lock_timeout", &self.lock_timeout)
            .field("cleanup_timeout", &self.cleanup_timeout)
            .finish_non_exhaustive()
    }
}

impl GlobalCache {
    /// Cache rooted at `root`, downloading over HTTP. The root is created
    /// on first download.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fetcher: Arc::new(HttpFetcher),
            lock_timeout: GLOBAL_LOCK_TIMEOUT,
            cleanup_timeout: CLEANUP_LOCK_TIMEOUT,
        }
    }

    /// `~/.tpo_global`
    pub fn default_root() -> TpoResult<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(GLOBAL_CACHE_DIR))
            .ok_or_else(|| TpoError::Internal("Could not determine home directory".to_string()))
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ArchiveFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Timeout for artifact locks during lookup
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Timeout for artifact locks during cleanup and purge
    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self, key: &GlobalCacheKey) -> ArtifactPaths {
        ArtifactPaths::new(&self.root.join(key.repo.relative_dir()), &key.stem())
    }

    /// Return the expanded directory for `url`, downloading it if needed.
    ///
    /// Branches are tried in order (the default list when empty) and the
    /// first that succeeds wins. Invalid names and lock timeouts stop the
    /// search immediately; download and archive failures move on to the
    /// next branch.
    pub fn get_or_download(&self, url: &str, branches: &[String]) -> TpoResult<PathBuf> {
        let repo = RepoUrl::parse(url)?;
        let branches: Vec<String> = if branches.is_empty() {
            DEFAULT_BRANCHES.iter().map(|b| b.to_string()).collect()
        } else {
            branches.to_vec()
        };

        let mut last_error = None;
        for branch in &branches {
            match self.get_or_download_branch(&repo, branch) {
                Ok(dir) => return Ok(dir),
                Err(e @ (TpoError::InvalidName { .. } | TpoError::LockTimeout { .. })) => {
                    return Err(e)
                }
                Err(e) => {
                    debug!(repo = %repo, branch, error = %e, "Branch unavailable");
                    last_error = Some(e);
                }
            }
        }

        Err(TpoError::DownloadExhausted {
            url: url.to_string(),
            tried: branches,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no branches to try".to_string()),
        })
    }

    fn get_or_download_branch(&self, repo: &RepoUrl, branch: &str) -> TpoResult<PathBuf> {
        let key = GlobalCacheKey::new(repo, branch)?;
        let paths = self.paths(&key);

        if paths.state() == ArtifactState::Complete {
            debug!(artifact = %paths.dir.display(), "Global cache hit");
            return Ok(paths.dir);
        }

        lock::with_lock(&paths.dir_lock, self.lock_timeout, || {
            // Another process may have finished while we waited
            match paths.state() {
                ArtifactState::Complete => return Ok(paths.dir.clone()),
                ArtifactState::Incomplete => {
                    warn!(
                        artifact = %paths.dir.display(),
                        "Discarding incomplete artifact directory"
                    );
                }
                ArtifactState::Missing => {}
            }

            if !paths.archive.is_file() {
                lock::with_lock(&paths.archive_lock, self.lock_timeout, || {
                    if paths.archive.is_file() {
                        return Ok(());
                    }
                    self.download(&key, &paths)
                })?;
            }

            self.expand(&paths)?;
            Ok(paths.dir.clone())
        })
    }

    fn download(&self, key: &GlobalCacheKey, paths: &ArtifactPaths) -> TpoResult<()> {
        let url = key.archive_url();
        let repo_dir = parent_of(&paths.archive)?;
        fs::create_dir_all(repo_dir)
            .map_err(|e| TpoError::io(format!("creating {}", repo_dir.display()), e))?;

        let mut temp = tempfile::Builder::new()
            .prefix(&format!("{}.zip.", key.stem()))
            .suffix(PART_SUFFIX)
            .tempfile_in(repo_dir)
            .map_err(|e| TpoError::io(format!("creating temp file in {}", repo_dir.display()), e))?;

        info!(url = %url, "Downloading archive");
        let bytes = self.fetcher.fetch(&url, &mut temp)?;
        temp.flush()
            .map_err(|e| TpoError::io(format!("writing {}", temp.path().display()), e))?;
        temp.persist(&paths.archive).map_err(|e| {
            TpoError::io(format!("moving archive into {}", paths.archive.display()), e.error)
        })?;

        debug!(archive = %paths.archive.display(), bytes, "Archive stored");
        Ok(())
    }

    /// Rebuild the expanded directory from the archive. Caller holds the
    /// directory lock.
    fn expand(&self, paths: &ArtifactPaths) -> TpoResult<()> {
        for stale in [&paths.done, &paths.dir] {
            remove_path(stale)
                .map_err(|e| TpoError::io(format!("removing stale {}", stale.display()), e))?;
        }

        if let Err(e) = expand_archive(&paths.archive, &paths.dir) {
            if matches!(e, TpoError::Archive(_) | TpoError::ArchiveLayout { .. }) {
                warn!(archive = %paths.archive.display(), "Removing unusable archive");
                let _guard = FileLock::acquire(&paths.archive_lock, self.lock_timeout)?;
                if let Err(rm) = remove_path(&paths.archive) {
                    warn!("Failed to remove {}: {}", paths.archive.display(), rm);
                }
            }
            return Err(e);
        }

        // Marker last: its presence means the directory is complete
        fs::write(
            &paths.done,
            format!("completed at {}", Utc::now().to_rfc3339()),
        )
        .map_err(|e| TpoError::io(format!("writing marker {}", paths.done.display()), e))?;

        info!(artifact = %paths.dir.display(), "Artifact ready");
        Ok(())
    }

    /// Complete artifact directories grouped by repository URL
    pub fn list(&self) -> TpoResult<BTreeMap<String, Vec<PathBuf>>> {
        let mut repos: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

        for (repo_dir, dirs) in self.artifact_dirs() {
            let complete: Vec<PathBuf> = dirs
                .into_iter()
                .filter(|d| {
                    ArtifactPaths::from_dir(d)
                        .is_some_and(|p| p.state() == ArtifactState::Complete)
                })
                .collect();
            if complete.is_empty() {
                continue;
            }
            if let Ok(relative) = repo_dir.strip_prefix(&self.root) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                repos.insert(format!("https://{}", parts.join("/")), complete);
            }
        }

        Ok(repos)
    }

    /// Keep the `keep_recent` newest artifacts of each repository and remove
    /// the rest. Artifacts locked by a running build are skipped.
    pub fn cleanup(&self, keep_recent: usize) -> TpoResult<CleanupReport> {
        let mut report = CleanupReport::default();

        for (repo_dir, mut dirs) in self.artifact_dirs() {
            if dirs.len() <= keep_recent {
                continue;
            }
            dirs.sort_by_key(|d| std::cmp::Reverse(artifact_mtime(d)));

            for dir in dirs.into_iter().skip(keep_recent) {
                let Some(paths) = ArtifactPaths::from_dir(&dir) else {
                    continue;
                };
                match FileLock::acquire(&paths.dir_lock, self.cleanup_timeout) {
                    Ok(_guard) => self.remove_artifact(&paths, &mut report),
                    Err(e) => {
                        info!(artifact = %dir.display(), "Skipping artifact in use: {}", e);
                        report.skipped.push(dir);
                    }
                }
            }
            debug!(repo = %repo_dir.display(), "Repository cleaned");
        }

        Ok(report)
    }

    /// Caller holds the directory lock
    fn remove_artifact(&self, paths: &ArtifactPaths, report: &mut CleanupReport) {
        // Marker first so a half-removed directory is never seen as complete
        for path in [&paths.done, &paths.dir] {
            if let Err(e) = remove_path(path) {
                warn!("Failed to remove {}: {}", path.display(), e);
                report.skipped.push(paths.dir.clone());
                return;
            }
        }
        report.removed.push(paths.dir.clone());

        if let Ok(Some(_guard)) = FileLock::try_acquire(&paths.archive_lock) {
            match remove_path(&paths.archive) {
                Ok(()) => report.removed.push(paths.archive.clone()),
                Err(e) => warn!("Failed to remove {}: {}", paths.archive.display(), e),
            }
        }
    }

    /// Remove everything in the cache.
    ///
    /// Pass one removes every unlocked artifact. Pass two waits up to the
    /// cleanup timeout for each leftover. Whatever is still held is reported
    /// as skipped; the root goes away only if nothing is left.
    pub fn purge(&self) -> TpoResult<CleanupReport> {
        let mut report = CleanupReport::default();
        if !self.root.exists() {
            return Ok(report);
        }

        let items = self.artifact_items();
        let leftovers = self.purge_pass(items, Duration::ZERO, &mut report.removed);
        if !leftovers.is_empty() {
            thread::sleep(PURGE_RETRY_DELAY);
            report.skipped = self.purge_pass(leftovers, self.cleanup_timeout, &mut report.removed);
        }

        prune_empty_dirs(&self.root);
        if is_empty_dir(&self.root) {
            if let Err(e) = fs::remove_dir(&self.root) {
                warn!("Failed to remove cache root {}: {}", self.root.display(), e);
            }
        }

        if !report.skipped.is_empty() {
            warn!(
                count = report.skipped.len(),
                "Some cache items are in use and were not removed"
            );
        }
        Ok(report)
    }

    /// One removal sweep; returns the items that could not be removed
    fn purge_pass(
        &self,
        items: Vec<PathBuf>,
        wait: Duration,
        removed: &mut Vec<PathBuf>,
    ) -> Vec<PathBuf> {
        let (locks, mut artifacts): (Vec<_>, Vec<_>) =
            items.into_iter().partition(|p| is_lock_file(p));
        // Markers before the trees they vouch for
        artifacts.sort_by_key(|p| !file_name(p).ends_with(DONE_SUFFIX));
        let mut failed = Vec::new();

        for path in artifacts {
            let outcome = match guard_lock(&path).filter(|g| g.exists()) {
                Some(guard) => self.remove_guarded(&path, &guard, wait),
                None => remove_path(&path).map_err(|e| e.to_string()),
            };
            settle(path, outcome, removed, &mut failed);
        }

        // Lock files go last, each deleted while held
        for path in locks {
            let outcome = self.remove_guarded(&path, &path, wait);
            settle(path, outcome, removed, &mut failed);
        }

        failed
    }

    fn remove_guarded(&self, path: &Path, guard: &Path, wait: Duration) -> Result<(), String> {
        let _lock = FileLock::acquire(guard, wait).map_err(|e| e.to_string())?;
        if file_name(path).ends_with(DIR_SUFFIX) {
            let marker = path.with_file_name(format!("{}{DONE_SUFFIX}", file_name(path)));
            remove_path(&marker).map_err(|e| e.to_string())?;
        }
        remove_path(path).map_err(|e| e.to_string())
    }

    /// Total size of all files in the cache
    pub fn size(&self) -> u64 {
        if self.root.exists() {
            tree_size(&self.root)
        } else {
            0
        }
    }

    /// Repository directories (`host/owner/repo`) under the root
    fn repo_dirs(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.root)
            .min_depth(3)
            .max_depth(3)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.into_path())
            .collect()
    }

    /// Expanded directories (complete or not) per repository
    fn artifact_dirs(&self) -> Vec<(PathBuf, Vec<PathBuf>)> {
        self.repo_dirs()
            .into_iter()
            .map(|repo_dir| {
                let dirs = read_children(&repo_dir)
                    .into_iter()
                    .filter(|p| p.is_dir() && file_name(p).ends_with(DIR_SUFFIX))
                    .collect();
                (repo_dir, dirs)
            })
            .collect()
    }

    /// Every file and directory stored directly in a repository directory
    fn artifact_items(&self) -> Vec<PathBuf> {
        self.repo_dirs()
            .iter()
            .flat_map(|repo_dir| read_children(repo_dir))
            .collect()
    }
}

fn settle(
    path: PathBuf,
    outcome: Result<(), String>,
    removed: &mut Vec<PathBuf>,
    failed: &mut Vec<PathBuf>,
) {
    match outcome {
        Ok(()) => removed.push(path),
        Err(reason) => {
            debug!(path = %path.display(), reason, "Could not remove");
            failed.push(path);
        }
    }
}

/// Newest of the directory and marker modification times
fn artifact_mtime(dir: &Path) -> SystemTime {
    let marker = ArtifactPaths::from_dir(dir)
        .map(|p| modified(&p.done))
        .unwrap_or(SystemTime::UNIX_EPOCH);
    modified(dir).max(marker)
}

fn is_lock_file(path: &Path) -> bool {
    file_name(path).ends_with(LOCK_SUFFIX)
}

/// The lock that guards an artifact item, if any
fn guard_lock(path: &Path) -> Option<PathBuf> {
    let name = file_name(path);

    let guard = if name.ends_with(LOCK_SUFFIX) {
        return None;
    } else if let Some(dir) = name.strip_suffix(DONE_SUFFIX) {
        format!("{dir}{LOCK_SUFFIX}")
    } else if let Some(temp) = name.strip_suffix(PART_SUFFIX) {
        // <stem>.zip.<random>.part
        format!("{}{LOCK_SUFFIX}", temp.rsplit_once('.')?.0)
    } else if let Some(temp) = name.strip_suffix(EXTRACT_SUFFIX) {
        // <stem>_dir.<random>.extract
        format!("{}{LOCK_SUFFIX}", temp.rsplit_once('.')?.0)
    } else if name.ends_with(DIR_SUFFIX) || name.ends_with(".zip") {
        format!("{name}{LOCK_SUFFIX}")
    } else {
        return None;
    };

    Some(path.with_file_name(guard))
}

fn prune_empty_dirs(root: &Path) {
    let dirs: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();

    for dir in dirs {
        if is_empty_dir(&dir) {
            let _ = fs::remove_dir(&dir);
        }
    }
}

fn read_children(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .map(|read| read.filter_map(Result::ok).map(|e| e.path()).collect())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parent_of(path: &Path) -> TpoResult<&Path> {
    path.parent()
        .ok_or_else(|| TpoError::Internal(format!("{} has no parent", path.display())))
}
