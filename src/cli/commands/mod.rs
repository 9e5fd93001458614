//! CLI command implementations
//!
//! The cache layer is synchronous; commands run it on the blocking pool.

pub mod cache;
pub mod completions;
pub mod config;
pub mod deps;
pub mod entry;
pub mod fingerprint;
pub mod global;
pub mod purge;

pub use cache::execute as cache;
pub use completions::execute as completions;
pub use config::execute as config;
pub use deps::execute as deps;
pub use entry::execute as entry;
pub use fingerprint::execute as fingerprint;
pub use global::execute as global;
pub use purge::execute as purge;

use crate::error::{TpoError, TpoResult};

/// Run blocking cache work off the async runtime
pub(crate) async fn blocking<T, F>(f: F) -> TpoResult<T>
where
    F: FnOnce() -> TpoResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TpoError::Internal(format!("cache task failed: {}", e)))?
}
