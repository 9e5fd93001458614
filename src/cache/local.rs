//! Local build cache: one working directory per build configuration
//!
//! Entries live under the project's cache root as `<platform>-<fingerprint>`
//! with a sibling `<platform>-<fingerprint>.lock` file and a JSON metadata
//! sidecar inside the directory. The metadata file is what makes a directory
//! an entry; directories without one are ignored by listing and removed by
//! [`LocalCache::migrate_legacy`].

use crate::cache::fingerprint::{content_hash, fingerprint_with_dependencies};
use crate::cache::lock::{self, FileLock};
use crate::cache::naming::{entry_dir_name, parse_entry_dir_name, sanitize_name, validate_name};
use crate::cache::tree::{is_empty_dir, remove_path};
use crate::cache::CleanupReport;
use crate::constants::{LEGACY_CACHE_DIR, LIB_ARCHIVE_DIR, METADATA_FILE};
use crate::error::{TpoError, TpoResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Metadata sidecar stored in every entry (`.cache_metadata.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub platform: String,
    pub fingerprint: String,
    pub source_path: String,
    /// Full SHA256 of the raw descriptor text
    #[serde(rename = "platformio_ini_hash")]
    pub content_hash: String,
    #[serde(rename = "turbo_dependencies", default)]
    pub dependencies: Vec<String>,
    /// Unix epoch seconds
    pub created_at: f64,
    /// Unix epoch seconds
    pub last_accessed: f64,
}

impl CacheMetadata {
    /// Creation time as a UTC timestamp
    pub fn created(&self) -> DateTime<Utc> {
        from_epoch(self.created_at)
    }

    /// Last access time as a UTC timestamp
    pub fn accessed(&self) -> DateTime<Utc> {
        from_epoch(self.last_accessed)
    }

    /// Check if this entry was created more than `days` days ago
    pub fn is_older_than_days(&self, days: u32) -> bool {
        self.created_at < epoch_now() - f64::from(days) * SECONDS_PER_DAY
    }
}

/// A local cache entry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// `<root>/<platform>-<fingerprint>`
    pub cache_dir: PathBuf,
    /// `<root>/<platform>-<fingerprint>.lock`, never inside `cache_dir`
    pub lock_file: PathBuf,
    /// `<cache_dir>/.cache_metadata.json`
    pub metadata_file: PathBuf,
    pub metadata: CacheMetadata,
    hit: bool,
}

impl CacheEntry {
    fn new(root: &Path, metadata: CacheMetadata, hit: bool) -> Self {
        let name = entry_dir_name(&metadata.platform, &metadata.fingerprint);
        let cache_dir = root.join(&name);
        Self {
            lock_file: root.join(format!("{name}.lock")),
            metadata_file: cache_dir.join(METADATA_FILE),
            cache_dir,
            metadata,
            hit,
        }
    }

    /// Directory name, `<platform>-<fingerprint>`
    pub fn name(&self) -> String {
        entry_dir_name(&self.metadata.platform, &self.metadata.fingerprint)
    }

    pub fn platform(&self) -> &str {
        &self.metadata.platform
    }

    pub fn fingerprint(&self) -> &str {
        &self.metadata.fingerprint
    }

    pub fn dependencies(&self) -> &[String] {
        &self.metadata.dependencies
    }

    /// Whether the lookup that produced this entry found it already cached
    pub fn is_hit(&self) -> bool {
        self.hit
    }

    /// Whether the entry directory and its metadata are on disk
    pub fn exists(&self) -> bool {
        self.cache_dir.is_dir() && self.metadata_file.is_file()
    }

    /// Re-read the metadata sidecar. `None` if missing or malformed.
    pub fn load_metadata(&self) -> Option<CacheMetadata> {
        read_metadata(&self.metadata_file)
    }

    /// Acquire the entry's exclusive lock
    pub fn lock(&self, timeout: Duration) -> TpoResult<FileLock> {
        FileLock::acquire(&self.lock_file, timeout)
    }

    /// Run `f` while holding the entry's lock.
    ///
    /// All changes to the entry's contents belong inside `f`.
    pub fn with_lock<T>(&self, timeout: Duration, f: impl FnOnce() -> TpoResult<T>) -> TpoResult<T> {
        lock::with_lock(&self.lock_file, timeout, f)
    }

    /// Whether every dependency has been materialized into `lib/<name>`
    pub fn dependencies_present(&self) -> bool {
        let lib = self.cache_dir.join("lib");
        self.metadata
            .dependencies
            .iter()
            .all(|dep| {
                validate_name(dep, "dependency").is_ok() && lib.join(dep.to_lowercase()).exists()
            })
    }
}

/// Fingerprinted cache of per-build working directories
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    /// Open (and create if needed) a cache rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> TpoResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| TpoError::io(format!("creating cache root {}", root.display()), e))?;
        Ok(Self { root })
    }

    /// Open a cache without creating its root (read-only commands)
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up the entry for a build configuration, creating it on a miss.
    ///
    /// A hit refreshes `last_accessed`. Malformed metadata is rewritten and
    /// reported as a miss. Two callers racing on the same key converge on
    /// the same directory; the last metadata write wins.
    pub fn get_or_create_entry(
        &self,
        source_path: &Path,
        platform: &str,
        config_text: &str,
        dependencies: &[String],
    ) -> TpoResult<CacheEntry> {
        let platform = sanitize_name(platform, "platform")?;
        for dep in dependencies {
            validate_name(dep, "dependency")?;
        }
        let fingerprint = fingerprint_with_dependencies(config_text, dependencies);
        let name = entry_dir_name(&platform, &fingerprint);
        let cache_dir = self.root.join(&name);
        let metadata_file = cache_dir.join(METADATA_FILE);
        let now = epoch_now();

        if let Some(mut metadata) = read_metadata(&metadata_file) {
            metadata.last_accessed = now;
            write_metadata(&metadata_file, &metadata)?;
            debug!(entry = %name, "Local cache hit");
            return Ok(CacheEntry::new(&self.root, metadata, true));
        }

        fs::create_dir_all(&cache_dir).map_err(|e| {
            TpoError::io(format!("creating cache entry {}", cache_dir.display()), e)
        })?;

        let mut sorted = dependencies.to_vec();
        sorted.sort();
        let metadata = CacheMetadata {
            platform,
            fingerprint,
            source_path: source_path.display().to_string(),
            content_hash: content_hash(config_text),
            dependencies: sorted,
            created_at: now,
            last_accessed: now,
        };
        write_metadata(&metadata_file, &metadata)?;
        info!(entry = %name, "Created local cache entry");

        Ok(CacheEntry::new(&self.root, metadata, false))
    }

    /// All entries with valid metadata, sorted by directory name
    pub fn list_entries(&self) -> TpoResult<Vec<CacheEntry>> {
        let mut entries = Vec::new();

        for path in self.child_dirs()? {
            let Some(metadata) = read_metadata(&path.join(METADATA_FILE)) else {
                debug!(dir = %path.display(), "Skipping directory without metadata");
                continue;
            };
            let entry = CacheEntry::new(&self.root, metadata, true);
            // Metadata copied from another entry would point elsewhere
            if entry.cache_dir != path {
                debug!(dir = %path.display(), "Skipping entry with mismatched metadata");
                continue;
            }
            entries.push(entry);
        }

        entries.sort_by(|a, b| a.cache_dir.cmp(&b.cache_dir));
        Ok(entries)
    }

    /// Remove entries created more than `max_age_days` ago, then the least
    /// recently accessed until at most `max_entries` remain.
    ///
    /// Entries whose lock is held by a running build are skipped, so the
    /// bound can be exceeded while builds are active.
    pub fn evict(&self, max_entries: usize, max_age_days: u32) -> TpoResult<CleanupReport> {
        let mut report = CleanupReport::default();

        let (expired, mut remaining): (Vec<_>, Vec<_>) = self
            .list_entries()?
            .into_iter()
            .partition(|e| e.metadata.is_older_than_days(max_age_days));

        for entry in &expired {
            debug!(entry = %entry.name(), "Evicting expired entry");
            self.remove_entry(entry, &mut report);
        }

        if remaining.len() > max_entries {
            remaining.sort_by(|a, b| {
                b.metadata
                    .last_accessed
                    .total_cmp(&a.metadata.last_accessed)
            });
            for entry in &remaining[max_entries..] {
                debug!(entry = %entry.name(), "Evicting least recently used entry");
                self.remove_entry(entry, &mut report);
            }
        }

        if !report.is_empty() {
            info!(
                removed = report.removed.len(),
                skipped = report.skipped.len(),
                "Local cache eviction finished"
            );
        }
        Ok(report)
    }

    /// Remove everything under the cache root, then the root itself.
    ///
    /// Entries locked by a running build are left in place and reported.
    pub fn purge_all(&self) -> TpoResult<CleanupReport> {
        let mut report = CleanupReport::default();
        if !self.root.exists() {
            return Ok(report);
        }

        let (locks, items): (Vec<_>, Vec<_>) = self
            .children()?
            .into_iter()
            .partition(|p| p.extension().is_some_and(|ext| ext == "lock"));

        for path in items {
            let guard_path = path.with_file_name(format!("{}.lock", file_name(&path)));
            if !guard_path.exists() {
                record_removal(&path, remove_path(&path), &mut report);
                continue;
            }
            match FileLock::try_acquire(&guard_path) {
                Ok(Some(_guard)) => record_removal(&path, remove_path(&path), &mut report),
                Ok(None) => {
                    info!(path = %path.display(), "Entry is locked, skipping");
                    report.skipped.push(path);
                }
                Err(e) => {
                    warn!("Could not check lock {}: {}", guard_path.display(), e);
                    report.skipped.push(path);
                }
            }
        }

        for path in locks {
            match FileLock::try_acquire(&path) {
                Ok(Some(_guard)) => record_removal(&path, remove_path(&path), &mut report),
                _ => report.skipped.push(path),
            }
        }

        if is_empty_dir(&self.root) {
            if let Err(e) = fs::remove_dir(&self.root) {
                warn!("Failed to remove cache root {}: {}", self.root.display(), e);
            }
        }

        Ok(report)
    }

    /// Delete caches left behind by older layouts.
    ///
    /// Removes a sibling legacy cache directory and every directory under
    /// the root that neither carries metadata nor follows the
    /// `<platform>-<fingerprint>` naming pattern.
    pub fn migrate_legacy(&self) -> TpoResult<Vec<PathBuf>> {
        let mut removed = Vec::new();

        if let Some(parent) = self.root.parent() {
            let legacy = parent.join(LEGACY_CACHE_DIR);
            if legacy.is_dir() {
                remove_path(&legacy).map_err(|e| {
                    TpoError::io(format!("removing legacy cache {}", legacy.display()), e)
                })?;
                info!(path = %legacy.display(), "Removed legacy cache directory");
                removed.push(legacy);
            }
        }

        if !self.root.exists() {
            return Ok(removed);
        }

        for path in self.child_dirs()? {
            let name = file_name(&path);
            if name == LIB_ARCHIVE_DIR
                || path.join(METADATA_FILE).is_file()
                || parse_entry_dir_name(&name).is_some()
            {
                continue;
            }

            match remove_path(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "Removed legacy cache entry");
                    removed.push(path);
                }
                Err(e) => warn!("Failed to remove legacy entry {}: {}", path.display(), e),
            }
        }

        Ok(removed)
    }

    fn remove_entry(&self, entry: &CacheEntry, report: &mut CleanupReport) {
        match FileLock::try_acquire(&entry.lock_file) {
            Ok(Some(_guard)) => {
                record_removal(&entry.cache_dir, remove_path(&entry.cache_dir), report)
            }
            Ok(None) => {
                info!(entry = %entry.name(), "Entry is in use, skipping");
                report.skipped.push(entry.cache_dir.clone());
            }
            Err(e) => {
                warn!("Could not lock {}: {}", entry.name(), e);
                report.skipped.push(entry.cache_dir.clone());
            }
        }
    }

    fn children(&self) -> TpoResult<Vec<PathBuf>> {
        let read = fs::read_dir(&self.root)
            .map_err(|e| TpoError::io(format!("reading cache root {}", self.root.display()), e))?;
        Ok(read.filter_map(Result::ok).map(|e| e.path()).collect())
    }

    fn child_dirs(&self) -> TpoResult<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        Ok(self
            .children()?
            .into_iter()
            .filter(|p| p.is_dir())
            .collect())
    }
}

fn record_removal(path: &Path, result: std::io::Result<()>, report: &mut CleanupReport) {
    match result {
        Ok(()) => report.removed.push(path.to_path_buf()),
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            report.skipped.push(path.to_path_buf());
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_metadata(path: &Path) -> Option<CacheMetadata> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Unreadable cache metadata {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            warn!(
                "Malformed cache metadata {}, treating entry as a miss: {}",
                path.display(),
                e
            );
            None
        }
    }
}

/// Write metadata through a temp file in the same directory and rename it
/// into place, so readers never see a partial document.
fn write_metadata(path: &Path, metadata: &CacheMetadata) -> TpoResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| TpoError::Internal(format!("metadata path {} has no parent", path.display())))?;

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| TpoError::io(format!("creating temp file in {}", dir.display()), e))?;
    serde_json::to_writer_pretty(&mut temp, metadata)?;
    temp.flush()
        .map_err(|e| TpoError::io(format!("writing {}", path.display()), e))?;
    temp.persist(path)
        .map_err(|e| TpoError::io(format!("writing {}", path.display()), e.error))?;
    Ok(())
}

fn epoch_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn from_epoch(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros((secs * 1_000_000.0) as i64).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fingerprint::fingerprint;
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;
    use std::time::Instant;
    use tempfile::TempDir;

    const INI: &str = "[env:native]\nplatform = native\n";

    fn cache(temp: &TempDir) -> LocalCache {
        LocalCache::new(temp.path().join(".tpo")).unwrap()
    }

    fn create(cache: &LocalCache, platform: &str, text: &str) -> CacheEntry {
        cache
            .get_or_create_entry(Path::new("/src/blink.ino"), platform, text, &[])
            .unwrap()
    }

    fn set_times(entry: &CacheEntry, created_at: f64, last_accessed: f64) {
        let mut metadata = entry.load_metadata().unwrap();
        metadata.created_at = created_at;
        metadata.last_accessed = last_accessed;
        write_metadata(&entry.metadata_file, &metadata).unwrap();
    }

    #[test]
    fn first_lookup_misses_second_hits() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);

        let first = create(&cache, "native", INI);
        assert!(!first.is_hit());
        assert!(first.exists());

        let second = create(&cache, "native", INI);
        assert!(second.is_hit());
        assert_eq!(first.cache_dir, second.cache_dir);
        assert_eq!(second.metadata.created_at, first.metadata.created_at);
        assert!(second.metadata.last_accessed >= first.metadata.last_accessed);
    }

    #[test]
    fn layout_matches_on_disk_format() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let entry = create(&cache, "native", INI);

        let name = format!("native-{}", fingerprint(INI));
        assert_eq!(entry.cache_dir, cache.root().join(&name));
        assert_eq!(entry.lock_file, cache.root().join(format!("{name}.lock")));
        assert!(!entry.lock_file.starts_with(&entry.cache_dir));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&entry.metadata_file).unwrap()).unwrap();
        for key in [
            "platform",
            "fingerprint",
            "source_path",
            "platformio_ini_hash",
            "turbo_dependencies",
            "created_at",
            "last_accessed",
        ] {
            assert!(raw.get(key).is_some(), "missing {key}");
        }
        assert!(raw["created_at"].is_f64());
        assert_eq!(raw["platformio_ini_hash"], content_hash(INI));
    }

    #[test]
    fn comments_and_blank_lines_share_an_entry() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);

        let a = create(
            &cache,
            "native",
            "[env:native]\nplatform = foo ; comment\n\n\nboard=uno",
        );
        let b = create(&cache, "native", "[env:native]\nplatform = foo\n\nboard=uno");

        assert_eq!(a.cache_dir, b.cache_dir);
        assert!(b.is_hit());
        let expected = format!("native-{}", a.fingerprint());
        assert_eq!(a.cache_dir.file_name().unwrap().to_str().unwrap(), expected);
    }

    #[test]
    fn keys_are_independent() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let src = Path::new("/src");

        let native = create(&cache, "native", INI);
        let uno = create(&cache, "uno", INI);
        let with_dep = cache
            .get_or_create_entry(src, "native", INI, &["FastLED".to_string()])
            .unwrap();

        assert_ne!(native.cache_dir, uno.cache_dir);
        assert_ne!(native.cache_dir, with_dep.cache_dir);
        assert!(!with_dep.is_hit());
    }

    #[test]
    fn invalid_platform_is_rejected() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);

        let err = cache
            .get_or_create_entry(Path::new("/src"), "COM1", INI, &[])
            .unwrap_err();
        assert!(matches!(err, TpoError::InvalidName { .. }));
        assert!(cache.list_entries().unwrap().is_empty());
    }

    #[test]
    fn dependency_names_must_be_single_components() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);

        let err = cache
            .get_or_create_entry(Path::new("/src"), "uno", INI, &["../outside".to_string()])
            .unwrap_err();
        assert!(matches!(err, TpoError::InvalidName { .. }));
        assert!(cache.list_entries().unwrap().is_empty());
    }

    #[test]
    fn malformed_metadata_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let entry = create(&cache, "native", INI);

        fs::write(&entry.metadata_file, "{ not json").unwrap();
        assert!(entry.load_metadata().is_none());

        let again = create(&cache, "native", INI);
        assert!(!again.is_hit());
        assert!(again.load_metadata().is_some());
    }

    #[test]
    fn listing_ignores_foreign_directories() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        create(&cache, "native", INI);
        create(&cache, "uno", INI);
        fs::create_dir_all(cache.root().join("Blink-native")).unwrap();
        fs::create_dir_all(cache.root().join(LIB_ARCHIVE_DIR)).unwrap();

        let entries = cache.list_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(cache.root().join("Blink-native").exists());
    }

    #[test]
    fn evict_keeps_most_recently_accessed() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let now = epoch_now();

        let entries: Vec<_> = (0..5)
            .map(|i| create(&cache, "native", &format!("[env:e{i}]")))
            .collect();
        for (i, entry) in entries.iter().enumerate() {
            set_times(entry, now, now - 100.0 * (5 - i) as f64);
        }

        let report = cache.evict(2, 30).unwrap();
        assert_eq!(report.removed.len(), 3);
        assert!(report.skipped.is_empty());

        let kept: Vec<_> = cache
            .list_entries()
            .unwrap()
            .into_iter()
            .map(|e| e.cache_dir)
            .collect();
        assert_eq!(kept.len(), 2);
        assert!(kept.contains(&entries[3].cache_dir));
        assert!(kept.contains(&entries[4].cache_dir));
    }

    #[test]
    fn evict_removes_expired_first() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let now = epoch_now();

        let old = create(&cache, "native", "[env:old]");
        let fresh = create(&cache, "native", "[env:fresh]");
        // Old but recently used: age wins over recency
        set_times(&old, now - 40.0 * SECONDS_PER_DAY, now);
        set_times(&fresh, now, now - 1000.0);

        let report = cache.evict(10, 30).unwrap();
        assert_eq!(report.removed, vec![old.cache_dir.clone()]);
        assert!(!old.cache_dir.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn evict_skips_locked_entries() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let now = epoch_now();

        let busy = create(&cache, "native", "[env:busy]");
        let idle = create(&cache, "native", "[env:idle]");
        set_times(&busy, now - 40.0 * SECONDS_PER_DAY, now);
        set_times(&idle, now - 40.0 * SECONDS_PER_DAY, now);

        let _held = busy.lock(Duration::from_secs(1)).unwrap();
        let report = cache.evict(10, 30).unwrap();

        assert_eq!(report.removed, vec![idle.cache_dir.clone()]);
        assert_eq!(report.skipped, vec![busy.cache_dir.clone()]);
        assert!(busy.exists());
    }

    #[test]
    fn purge_all_removes_root() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let entry = create(&cache, "native", INI);
        entry.with_lock(Duration::from_secs(1), || Ok(())).unwrap();
        fs::create_dir_all(cache.root().join(LIB_ARCHIVE_DIR).join("native")).unwrap();

        let report = cache.purge_all().unwrap();
        assert!(report.skipped.is_empty());
        assert!(!cache.root().exists());
    }

    #[test]
    fn purge_all_leaves_locked_entry() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let busy = create(&cache, "native", "[env:busy]");
        let idle = create(&cache, "uno", "[env:idle]");
        idle.with_lock(Duration::from_secs(1), || Ok(())).unwrap();

        let _held = busy.lock(Duration::from_secs(1)).unwrap();
        let report = cache.purge_all().unwrap();

        assert!(busy.exists());
        assert!(!idle.cache_dir.exists());
        assert!(!idle.lock_file.exists());
        assert!(report.skipped.contains(&busy.cache_dir));
        assert!(report.skipped.contains(&busy.lock_file));
    }

    #[test]
    fn migrate_removes_legacy_layouts() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let entry = create(&cache, "native", INI);
        let legacy_root = temp.path().join(LEGACY_CACHE_DIR);
        fs::create_dir_all(legacy_root.join("Blink-native")).unwrap();
        fs::create_dir_all(cache.root().join("Blink-native")).unwrap();
        fs::create_dir_all(cache.root().join(LIB_ARCHIVE_DIR)).unwrap();
        // Mid-creation by another process: valid name, no metadata yet
        fs::create_dir_all(cache.root().join("uno-0123abcd")).unwrap();

        let removed = cache.migrate_legacy().unwrap();

        assert_eq!(removed.len(), 2);
        assert!(!legacy_root.exists());
        assert!(!cache.root().join("Blink-native").exists());
        assert!(cache.root().join(LIB_ARCHIVE_DIR).exists());
        assert!(cache.root().join("uno-0123abcd").exists());
        assert!(entry.exists());
    }

    #[test]
    fn dependencies_present_checks_lib_dirs() {
        let temp = TempDir::new().unwrap();
        let cache = cache(&temp);
        let deps = vec!["FastLED".to_string(), "ArduinoJson".to_string()];
        let entry = cache
            .get_or_create_entry(Path::new("/src"), "dev", INI, &deps)
            .unwrap();

        assert!(!entry.dependencies_present());
        fs::create_dir_all(entry.cache_dir.join("lib/fastled")).unwrap();
        assert!(!entry.dependencies_present());
        fs::create_dir_all(entry.cache_dir.join("lib/arduinojson")).unwrap();
        assert!(entry.dependencies_present());
    }

    #[test]
    fn concurrent_builds_never_overlap() {
        const WORKERS: usize = 12;

        let temp = TempDir::new().unwrap();
        let root = temp.path().join(".tpo");
        let barrier = Arc::new(Barrier::new(WORKERS));
        let windows = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                let root = root.clone();
                let barrier = Arc::clone(&barrier);
                let windows = Arc::clone(&windows);
                thread::spawn(move || {
                    let cache = LocalCache::new(root).unwrap();
                    barrier.wait();
                    let entry = cache
                        .get_or_create_entry(Path::new("/src"), "native", INI, &[])
                        .unwrap();
                    entry
                        .with_lock(Duration::from_secs(30), || {
                            let acquired = Instant::now();
                            fs::write(entry.cache_dir.join("build.log"), "building").unwrap();
                            thread::sleep(Duration::from_millis(5));
                            let released = Instant::now();
                            windows.lock().unwrap().push((acquired, released));
                            Ok(entry.cache_dir.clone())
                        })
                        .unwrap()
                })
            })
            .collect();

        let dirs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(dirs.windows(2).all(|w| w[0] == w[1]));

        let mut windows = windows.lock().unwrap().clone();
        assert_eq!(windows.len(), WORKERS);
        windows.sort_by_key(|(acquired, _)| *acquired);
        for pair in windows.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "critical sections overlapped");
        }

        let cache = LocalCache::new(root).unwrap();
        assert_eq!(cache.list_entries().unwrap().len(), 1);
    }
}
