//! Progress indicators with CI fallback

use super::context::UiContext;
use super::theme::{Tier, BAR_CELLS, SPINNER_FRAMES};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner shown while one repository lands in the global cache.
///
/// In CI the start and the outcome are one line each.
pub struct ArtifactSpinner {
    spinner: Option<cliclack::ProgressBar>,
}

impl ArtifactSpinner {
    pub fn start(ctx: &UiContext, url: &str) -> Self {
        let message = format!("{} fetching {}", Tier::Global.tag(), url);
        if !ctx.use_fancy_output() {
            println!("  {} {}", style("[..]").dim(), message);
            return Self { spinner: None };
        }

        let spinner = cliclack::spinner();
        spinner.start(message);
        Self {
            spinner: Some(spinner),
        }
    }

    /// The artifact directory is complete
    pub fn ready(self) {
        let message = format!("{} artifact ready", Tier::Global.tag());
        match self.spinner {
            Some(spinner) => spinner.stop(message),
            None => println!("  {} {}", style("[ok]").green(), message),
        }
    }

    /// Every candidate branch failed
    pub fn failed(self, url: &str) {
        let message = format!("{} could not fetch {}", Tier::Global.tag(), url);
        match self.spinner {
            Some(spinner) => spinner.error(message),
            None => println!("  {} {}", style("[fail]").red(), message),
        }
    }
}

const FETCH_TEMPLATE: &str =
    "  {spinner:.blue} fetching {prefix}  {bar:20.blue/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}";

/// Progress bar for dependency fetches.
///
/// Shows an indicatif bar in interactive mode, one line per item in CI.
pub struct FetchProgress {
    bar: Option<ProgressBar>,
}

impl FetchProgress {
    /// Create a progress indicator over `total` items
    pub fn new(ctx: &UiContext, label: &str, total: u64) -> Self {
        let bar = if ctx.use_fancy_output() {
            let style = ProgressStyle::with_template(FETCH_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_chars(&format!("{SPINNER_FRAMES} "))
                .progress_chars(BAR_CELLS);
            let bar = ProgressBar::new(total);
            bar.set_style(style);
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            println!("  {} fetching {} {}", Tier::Global.tag(), total, label);
            None
        };
        Self { bar }
    }

    /// Mark `name` as the item in flight
    pub fn start_item(&self, name: &str) {
        match self.bar {
            Some(ref bar) => bar.set_message(name.to_string()),
            None => println!("  {} {}", style("[..]").dim(), name),
        }
    }

    /// Count the item in flight as done
    pub fn finish_item(&self) {
        if let Some(ref bar) = self.bar {
            bar.inc(1);
        }
    }

    /// Finish and clear the progress bar.
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}
