//! Cache command - manage the project-local cache

use super::blocking;
use crate::cache::tree::format_bytes;
use crate::cache::{CacheEntry, LibArchiveStore, LocalCache};
use crate::cli::args::{ArchiveArgs, CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::{TpoError, TpoResult};
use crate::ui::{self, Status, Tier, UiContext};
use console::style;
use std::path::{Path, PathBuf};

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config, project_dir: &Path) -> TpoResult<()> {
    let root = config.local_root(project_dir);

    match args.action {
        CacheAction::List { format } => list_entries(root, format).await,
        CacheAction::Gc {
            max_entries,
            max_age_days,
        } => {
            let max_entries = max_entries.unwrap_or(config.local.max_entries);
            let max_age_days = max_age_days.unwrap_or(config.local.max_age_days);
            gc_entries(root, max_entries, max_age_days).await
        }
        CacheAction::Migrate => migrate(root).await,
        CacheAction::Clear { yes } => clear_entries(root, yes).await,
        CacheAction::Archive(args) => archive_library(root, args).await,
    }
}

/// List local cache entries
async fn list_entries(root: PathBuf, format: OutputFormat) -> TpoResult<()> {
    let entries = blocking(move || LocalCache::open(root).list_entries()).await?;

    if entries.is_empty() && !matches!(format, OutputFormat::Json) {
        println!("No cache entries found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_entry_table(&entries),
        OutputFormat::Json => print_entry_json(&entries)?,
        OutputFormat::Plain => print_entry_plain(&entries),
    }

    Ok(())
}

fn print_entry_table(entries: &[CacheEntry]) {
    println!(
        "{:<28} {:<14} {:<8} {:<17} {:<17}",
        "ENTRY", "PLATFORM", "DEPS", "CREATED", "LAST USED"
    );
    println!("{}", "-".repeat(86));

    for entry in entries {
        let meta = &entry.metadata;
        let deps = if entry.dependencies().is_empty() {
            style("-".to_string()).dim().to_string()
        } else {
            entry.dependencies().len().to_string()
        };

        println!(
            "{:<28} {:<14} {:<8} {:<17} {:<17}",
            entry.name(),
            entry.platform(),
            deps,
            meta.created().format("%Y-%m-%d %H:%M").to_string(),
            meta.accessed().format("%Y-%m-%d %H:%M").to_string(),
        );
    }

    println!();
    println!("Total: {} entries", entries.len());
}

fn print_entry_json(entries: &[CacheEntry]) -> TpoResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson<'a> {
        name: String,
        cache_dir: &'a Path,
        platform: &'a str,
        fingerprint: &'a str,
        dependencies: &'a [String],
        source_path: &'a str,
        created_at: String,
        last_accessed: String,
    }

    let json: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            name: e.name(),
            cache_dir: &e.cache_dir,
            platform: e.platform(),
            fingerprint: e.fingerprint(),
            dependencies: e.dependencies(),
            source_path: &e.metadata.source_path,
            created_at: e.metadata.created().to_rfc3339(),
            last_accessed: e.metadata.accessed().to_rfc3339(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn print_entry_plain(entries: &[CacheEntry]) {
    for entry in entries {
        println!("{}", entry.name());
    }
}

/// Evict expired and least recently used entries
async fn gc_entries(root: PathBuf, max_entries: usize, max_age_days: u32) -> TpoResult<()> {
    let ctx = UiContext::detect();

    let report = blocking(move || LocalCache::open(root).evict(max_entries, max_age_days)).await?;
    ui::cleanup(&ctx, Tier::Local, &report);

    Ok(())
}

/// Remove directories left by older cache layouts
async fn migrate(root: PathBuf) -> TpoResult<()> {
    let ctx = UiContext::detect();

    let removed = blocking(move || LocalCache::open(root).migrate_legacy()).await?;
    if removed.is_empty() {
        ui::emit(&ctx, Status::Note, "nothing to migrate");
        return Ok(());
    }

    ui::emit(
        &ctx,
        Status::Done,
        &format!("{}: removed {} legacy item(s)", Tier::Local.tag(), removed.len()),
    );
    ui::paths(&ctx, &removed);

    Ok(())
}

/// Remove every local entry
async fn clear_entries(root: PathBuf, skip_confirm: bool) -> TpoResult<()> {
    let ctx = UiContext::detect().with_auto_yes(skip_confirm);

    if !root.exists() {
        println!("No local cache to clear.");
        return Ok(());
    }

    if !ui::confirm_removal(&ctx, &[root.as_path()]).await? {
        println!("Aborted.");
        return Ok(());
    }

    let report = blocking(move || LocalCache::open(root).purge_all()).await?;
    ui::cleanup(&ctx, Tier::Local, &report);

    Ok(())
}

/// Reuse a valid library archive or build one from compiled objects
async fn archive_library(root: PathBuf, args: ArchiveArgs) -> TpoResult<()> {
    let ctx = UiContext::detect();

    let (archive, created) = blocking(move || {
        let store = LibArchiveStore::new(&root).with_ar_tool(args.ar);
        let archive = store.archive_path(&args.library, &args.version, &args.platform, &args.flags)?;

        let created = if LibArchiveStore::is_valid(&archive) {
            None
        } else {
            let objects = LibArchiveStore::find_objects(&args.build_dir, &args.library);
            if objects.is_empty() {
                return Err(TpoError::User(format!(
                    "No object files for '{}' under {}",
                    args.library,
                    args.build_dir.display()
                )));
            }
            Some(store.create_from_objects(&objects, &archive)?)
        };

        if let Some(dir) = &args.install {
            LibArchiveStore::install_into(&archive, dir)?;
        }
        Ok((archive, created))
    })
    .await?;

    match created {
        Some(size) => ui::emit(
            &ctx,
            Status::Done,
            &format!("archive created ({})", format_bytes(size)),
        ),
        None => ui::emit(&ctx, Status::Done, "archive reused"),
    }
    ui::field(&ctx, "Path", &archive.display().to_string());

    Ok(())
}
