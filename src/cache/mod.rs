//! Two-tier build cache
//!
//! - **Local tier** ([`LocalCache`]): one working directory per build
//!   configuration inside the project, keyed by platform and a fingerprint
//!   of the normalized build descriptor.
//! - **Global tier** ([`GlobalCache`]): downloaded framework and library
//!   repositories shared by every project of the user, immutable once
//!   marked complete.
//!
//! # Concurrency Model
//!
//! Many build processes may use both tiers at once. Every entry and artifact
//! has its own lock file; changing an entry's contents requires holding its
//! lock, and unrelated keys never contend. There is no lock over a whole
//! cache root.
//!
//! Locks are OS advisory locks held through an open handle, so a crashed
//! process releases them. Crashes mid-write leave only temp files or
//! directories without a completion marker, which lookups treat as misses.

pub mod archive;
pub mod fetch;
pub mod fingerprint;
pub mod global;
pub mod lib_archive;
pub mod local;
pub mod lock;
pub mod naming;
pub mod tree;

pub use fetch::{ArchiveFetcher, HttpFetcher};
pub use fingerprint::{fingerprint, fingerprint_with_dependencies};
pub use global::{ArtifactPaths, ArtifactState, GlobalCache, GlobalCacheKey, RepoUrl};
pub use lib_archive::LibArchiveStore;
pub use local::{CacheEntry, CacheMetadata, LocalCache};
pub use lock::{with_lock, FileLock};

use serde::Serialize;
use std::path::PathBuf;

/// Outcome of a batch removal (eviction, cleanup, purge)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Paths that were deleted
    pub removed: Vec<PathBuf>,
    /// Paths left in place because they were locked or could not be deleted
    pub skipped: Vec<PathBuf>,
}

impl CleanupReport {
    /// Whether nothing was removed or skipped
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.skipped.is_empty()
    }
}
