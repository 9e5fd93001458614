//! Status lines for cache operations
//!
//! Every line goes through [`emit`]: a cliclack log call in a terminal, a
//! bracketed tag otherwise. The helpers render cache results on top of it.

use super::context::UiContext;
use super::theme::Tier;
use crate::cache::CleanupReport;
use crate::deps::MaterializeReport;
use console::style;
use std::path::Path;

/// Kind of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Note,
    Warn,
    Fail,
}

impl Status {
    /// Prefix used when output is not a terminal
    fn tag(self) -> String {
        match self {
            Status::Done => style("[ok]").green(),
            Status::Note => style("[--]").dim(),
            Status::Warn => style("[warn]").yellow(),
            Status::Fail => style("[fail]").red(),
        }
        .to_string()
    }
}

/// Print one status line
pub fn emit(ctx: &UiContext, status: Status, message: &str) {
    if !ctx.use_fancy_output() {
        println!("  {} {}", status.tag(), message);
        return;
    }

    let _ = match status {
        Status::Done => cliclack::log::success(message),
        Status::Note => cliclack::log::info(message),
        Status::Warn => cliclack::log::warning(message),
        Status::Fail => cliclack::log::error(message),
    };
}

/// Aligned `key: value` line under the previous status
pub fn field(ctx: &UiContext, key: &str, value: &str) {
    let key = format!("{key}:");
    if ctx.use_fancy_output() {
        println!("  {} {}", style(format!("{key:<12}")).dim(), value);
    } else {
        println!("  {key:<12} {value}");
    }
}

/// One indented path per line
pub fn paths<P: AsRef<Path>>(ctx: &UiContext, items: &[P]) {
    for path in items {
        let shown = path.as_ref().display().to_string();
        if ctx.use_fancy_output() {
            let _ = cliclack::log::remark(style(shown).dim());
        } else {
            println!("      {shown}");
        }
    }
}

/// Result of a local entry lookup
pub fn lookup(ctx: &UiContext, hit: bool, entry: &str) {
    if hit {
        emit(ctx, Status::Done, &format!("hit   {entry}"));
    } else {
        emit(ctx, Status::Note, &format!("miss  {entry} (created)"));
    }
}

/// Removed and skipped counts of a cleanup, with the skipped paths
pub fn cleanup(ctx: &UiContext, tier: Tier, report: &CleanupReport) {
    let tag = tier.tag();
    if report.is_empty() {
        emit(ctx, Status::Note, &format!("{tag}: nothing to remove"));
        return;
    }

    emit(
        ctx,
        Status::Done,
        &format!("{tag}: removed {}", plural(report.removed.len(), "item")),
    );
    if !report.skipped.is_empty() {
        emit(
            ctx,
            Status::Warn,
            &format!(
                "{tag}: {} in use, re-run once active builds finish",
                plural(report.skipped.len(), "item")
            ),
        );
        paths(ctx, &report.skipped);
    }
}

/// Copied, reused and failed dependencies, plus a retry hint when it helps
pub fn materialized(ctx: &UiContext, report: &MaterializeReport) {
    for path in &report.materialized {
        emit(ctx, Status::Done, &format!("copied  {}", path.display()));
    }
    for path in &report.reused {
        emit(ctx, Status::Note, &format!("present {}", path.display()));
    }
    for failure in &report.failed {
        emit(
            ctx,
            Status::Fail,
            &format!("{}: {}", failure.name, style(&failure.error).red()),
        );
    }

    if report.failed.iter().any(|f| f.retryable) {
        emit(
            ctx,
            Status::Warn,
            "some failures look temporary; run the same command again to retry",
        );
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
