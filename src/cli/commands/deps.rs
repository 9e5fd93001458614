//! Deps command - resolve and materialize dependencies

use super::blocking;
use crate::cli::args::{DepsAction, DepsArgs};
use crate::config::Config;
use crate::deps::{MaterializeReport, Resolution};
use crate::error::{TpoError, TpoResult};
use crate::ui::{self, FetchProgress, UiContext};
use console::style;
use std::path::{Path, PathBuf};

/// Execute the deps command
pub async fn execute(args: DepsArgs, config: &Config, project_dir: &Path) -> TpoResult<()> {
    match args.action {
        DepsAction::Resolve { names } => resolve(config, &names),
        DepsAction::Fetch {
            names,
            into,
            platform,
        } => {
            let target = into.unwrap_or_else(|| project_dir.to_path_buf());
            fetch(config, names, target, platform).await
        }
    }
}

/// Print the repository each name resolves to
fn resolve(config: &Config, names: &[String]) -> TpoResult<()> {
    let registry = config.registry();

    for name in names {
        let (url, resolution) = registry.resolve(name)?;
        match resolution {
            Resolution::Known => println!("{:<24} {}", name, url),
            Resolution::Guessed => {
                println!("{:<24} {} {}", name, url, style("(guessed)").yellow())
            }
        }
    }

    Ok(())
}

/// Copy dependencies into `<target>/lib` or `<target>/platforms`
async fn fetch(config: &Config, names: Vec<String>, target: PathBuf, platforms: bool) -> TpoResult<()> {
    let ctx = UiContext::detect();
    let materializer = config.materializer()?;
    let label = if platforms { "platforms" } else { "libraries" };
    let progress = FetchProgress::new(&ctx, label, names.len() as u64);

    let report = blocking(move || {
        let mut report = MaterializeReport::default();
        for name in names {
            progress.start_item(&name);
            let batch = [name];
            let one = if platforms {
                materializer.materialize_platforms(&batch, &target)
            } else {
                materializer.materialize(&batch, &target)
            };
            report.merge(one);
            progress.finish_item();
        }
        progress.finish();
        Ok(report)
    })
    .await?;

    ui::materialized(&ctx, &report);

    if report.is_success() {
        Ok(())
    } else {
        Err(TpoError::User(format!(
            "{} of {} {} could not be fetched",
            report.failed.len(),
            report.failed.len() + report.materialized.len() + report.reused.len(),
            label
        )))
    }
}
