//! Global command - manage the per-user artifact cache

use super::blocking;
use crate::cache::tree::format_bytes;
use crate::cache::GlobalCache;
use crate::cli::args::{GlobalAction, GlobalArgs, OutputFormat};
use crate::config::Config;
use crate::error::TpoResult;
use crate::ui::{self, ArtifactSpinner, Tier, UiContext};
use console::style;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Execute the global command
pub async fn execute(args: GlobalArgs, config: &Config) -> TpoResult<()> {
    let cache = config.global_cache()?;

    match args.action {
        GlobalAction::List { format } => list_artifacts(cache, format).await,
        GlobalAction::Fetch { url, branches } => {
            let branches = if branches.is_empty() {
                config.global.branches.clone()
            } else {
                branches
            };
            fetch(cache, url, branches).await
        }
        GlobalAction::Clean { keep } => {
            let keep = keep.unwrap_or(config.global.keep_recent);
            clean(cache, keep).await
        }
        GlobalAction::Purge { yes } => purge(cache, yes).await,
        GlobalAction::Size => show_size(cache).await,
    }
}

/// List complete artifacts grouped by repository
async fn list_artifacts(cache: GlobalCache, format: OutputFormat) -> TpoResult<()> {
    let repos = blocking(move || cache.list()).await?;

    if repos.is_empty() && !matches!(format, OutputFormat::Json) {
        println!("No cached artifacts found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_artifact_table(&repos),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&repos)?),
        OutputFormat::Plain => {
            for dir in repos.values().flatten() {
                println!("{}", dir.display());
            }
        }
    }

    Ok(())
}

fn print_artifact_table(repos: &BTreeMap<String, Vec<PathBuf>>) {
    let mut total = 0;

    for (url, dirs) in repos {
        println!("{}", style(url).bold());
        for dir in dirs {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!("  {} {}", Tier::Global.color().apply_to("•"), name);
        }
        total += dirs.len();
    }

    println!();
    println!(
        "Total: {} artifact(s) from {} repositories",
        total,
        repos.len()
    );
}

/// Download and expand a repository archive
async fn fetch(cache: GlobalCache, url: String, branches: Vec<String>) -> TpoResult<()> {
    let ctx = UiContext::detect();
    let spinner = ArtifactSpinner::start(&ctx, &url);

    let shown = url.clone();
    let result = blocking(move || cache.get_or_download(&url, &branches)).await;
    match result {
        Ok(dir) => {
            spinner.ready();
            println!("{}", dir.display());
            Ok(())
        }
        Err(e) => {
            spinner.failed(&shown);
            Err(e)
        }
    }
}

/// Trim each repository to its newest artifacts
async fn clean(cache: GlobalCache, keep: usize) -> TpoResult<()> {
    let ctx = UiContext::detect();

    let report = blocking(move || cache.cleanup(keep)).await?;
    ui::cleanup(&ctx, Tier::Global, &report);

    Ok(())
}

/// Remove the whole global cache
async fn purge(cache: GlobalCache, skip_confirm: bool) -> TpoResult<()> {
    let ctx = UiContext::detect().with_auto_yes(skip_confirm);

    if !cache.root().exists() {
        println!("No global cache to purge.");
        return Ok(());
    }

    if !ui::confirm_removal(&ctx, &[cache.root()]).await? {
        println!("Aborted.");
        return Ok(());
    }

    let report = blocking(move || cache.purge()).await?;
    ui::cleanup(&ctx, Tier::Global, &report);

    Ok(())
}

async fn show_size(cache: GlobalCache) -> TpoResult<()> {
    let ctx = UiContext::detect();
    let root = cache.root().to_path_buf();

    let size = blocking(move || Ok(cache.size())).await?;
    ui::field(&ctx, "Root", &root.display().to_string());
    ui::field(&ctx, "Size", &format_bytes(size));

    Ok(())
}
