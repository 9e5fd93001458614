//! Fingerprint command - print the cache key of a build configuration

use crate::cache::fingerprint_with_dependencies;
use crate::cli::args::FingerprintArgs;
use crate::error::{TpoError, TpoResult};
use std::path::Path;
use tokio::fs;

/// Execute the fingerprint command
pub async fn execute(args: FingerprintArgs, project_dir: &Path) -> TpoResult<()> {
    let path = project_dir.join(&args.file);
    let text = fs::read_to_string(&path)
        .await
        .map_err(|e| TpoError::io(format!("reading {}", path.display()), e))?;

    println!("{}", fingerprint_with_dependencies(&text, &args.deps));
    Ok(())
}
