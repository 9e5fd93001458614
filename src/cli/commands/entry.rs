//! Entry command - get or create the local cache entry for a build

use super::blocking;
use crate::cache::{CacheEntry, LocalCache};
use crate::cli::args::{EntryArgs, OutputFormat};
use crate::config::Config;
use crate::deps::MaterializeReport;
use crate::error::{TpoError, TpoResult};
use crate::ui::{self, UiContext};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Serialize)]
struct EntryJson {
    name: String,
    cache_dir: PathBuf,
    platform: String,
    fingerprint: String,
    hit: bool,
    dependencies: Vec<String>,
    materialized: Vec<PathBuf>,
}

/// Execute the entry command
pub async fn execute(args: EntryArgs, config: &Config, project_dir: &Path) -> TpoResult<()> {
    let ini = project_dir.join(&args.ini);
    let text = fs::read_to_string(&ini)
        .await
        .map_err(|e| TpoError::io(format!("reading {}", ini.display()), e))?;

    let root = config.local_root(project_dir);
    let source = args.source.unwrap_or_else(|| project_dir.to_path_buf());
    let timeout = config.local.lock_timeout();
    let materializer = config.materializer()?;
    let platform = args.platform;
    let deps = args.deps;

    let (entry, report) = blocking(move || {
        let cache = LocalCache::new(root)?;
        let entry = cache.get_or_create_entry(&source, &platform, &text, &deps)?;

        let report = if entry.dependencies_present() {
            MaterializeReport::default()
        } else {
            entry.with_lock(timeout, || {
                Ok(materializer.materialize(entry.dependencies(), &entry.cache_dir))
            })?
        };
        Ok((entry, report))
    })
    .await?;

    match args.format {
        OutputFormat::Table => print_entry_table(&entry, &report),
        OutputFormat::Json => print_entry_json(&entry, &report)?,
        OutputFormat::Plain => println!("{}", entry.cache_dir.display()),
    }

    if report.is_success() {
        Ok(())
    } else {
        let names: Vec<&str> = report.failed.iter().map(|f| f.name.as_str()).collect();
        Err(TpoError::User(format!(
            "Failed to materialize: {}",
            names.join(", ")
        )))
    }
}

fn print_entry_table(entry: &CacheEntry, report: &MaterializeReport) {
    let ctx = UiContext::detect();

    ui::lookup(&ctx, entry.is_hit(), &entry.name());
    ui::field(&ctx, "Directory", &entry.cache_dir.display().to_string());
    ui::field(&ctx, "Platform", entry.platform());
    ui::field(&ctx, "Fingerprint", entry.fingerprint());
    ui::materialized(&ctx, report);
}

fn print_entry_json(entry: &CacheEntry, report: &MaterializeReport) -> TpoResult<()> {
    let json = EntryJson {
        name: entry.name(),
        cache_dir: entry.cache_dir.clone(),
        platform: entry.platform().to_string(),
        fingerprint: entry.fingerprint().to_string(),
        hit: entry.is_hit(),
        dependencies: entry.dependencies().to_vec(),
        materialized: report.materialized.clone(),
    };

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
