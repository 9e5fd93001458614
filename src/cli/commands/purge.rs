//! Purge command - remove both cache tiers

use super::blocking;
use crate::cache::LocalCache;
use crate::config::Config;
use crate::error::TpoResult;
use crate::ui::{self, Tier, UiContext};
use std::path::Path;

/// Execute the purge command.
///
/// Both tiers are purged concurrently. Items held by running builds are
/// skipped and reported.
pub async fn execute(yes: bool, config: &Config, project_dir: &Path) -> TpoResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);
    let local = LocalCache::open(config.local_root(project_dir));
    let global = config.global_cache()?;

    if !ui::confirm_removal(&ctx, &[local.root(), global.root()]).await? {
        println!("Aborted.");
        return Ok(());
    }

    let (local_report, global_report) = tokio::join!(
        blocking(move || local.purge_all()),
        blocking(move || global.purge()),
    );

    ui::cleanup(&ctx, Tier::Local, &local_report?);
    ui::cleanup(&ctx, Tier::Global, &global_report?);

    Ok(())
}
