//! Timeouts, retry parameters and on-disk names shared across modules.

use std::time::Duration;

/// Default timeout for acquiring a local cache entry lock (30 seconds).
pub const LOCAL_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for acquiring a global artifact lock (60 seconds).
///
/// Long enough for another process to finish downloading and expanding
/// a framework archive.
pub const GLOBAL_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout used by cleanup and purge when probing an artifact lock.
///
/// Kept short so maintenance never stalls behind an active build.
pub const CLEANUP_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Starting delay for exponential backoff while polling a lock (10ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Maximum backoff delay while polling a lock (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Local cache directory name inside a project
pub const LOCAL_CACHE_DIR: &str = ".tpo";

/// Pre-fingerprint cache directory name, removed by migration
pub const LEGACY_CACHE_DIR: &str = ".tpo_fast_cache";

/// Global cache directory name inside the home directory
pub const GLOBAL_CACHE_DIR: &str = ".tpo_global";

/// Metadata sidecar stored inside each local entry
pub const METADATA_FILE: &str = ".cache_metadata.json";

/// Library archive directory inside the local cache root
pub const LIB_ARCHIVE_DIR: &str = "lib_archives";

/// Branches tried, in order, when no explicit branch is requested
pub const DEFAULT_BRANCHES: &[&str] = &["main", "master", "develop"];
