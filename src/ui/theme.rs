//! Colors and glyphs for tpo's terminal output
//!
//! Each cache tier owns a color: magenta for the project-local cache, blue
//! for the per-user global cache. Prompts and the bar on the left follow the
//! local color since most questions are about the current project.

use cliclack::ThemeState;
use console::{style, Style};

/// Spinner frames shared by cliclack spinners and the fetch bar
pub(crate) const SPINNER_FRAMES: &str = "▖▘▝▗";

/// Filled and empty cells of a progress bar
pub(crate) const BAR_CELLS: &str = "█░";

/// Which cache a line of output talks about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Local,
    Global,
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Tier::Local => "local",
            Tier::Global => "global",
        }
    }

    pub fn color(self) -> Style {
        match self {
            Tier::Local => Style::new().magenta(),
            Tier::Global => Style::new().blue(),
        }
    }

    /// `local` or `global` in the tier's color
    pub fn tag(self) -> String {
        self.color().apply_to(self.label()).to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TpoTheme;

impl cliclack::Theme for TpoTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Tier::Local.color(),
            ThemeState::Submit => Style::new().dim(),
            ThemeState::Cancel => Style::new().yellow(),
            ThemeState::Error(_) => Style::new().red(),
        }
    }

    // Hits and finished work are filled dots, misses and notes hollow ones
    fn active_symbol(&self) -> String {
        style("●").green().to_string()
    }

    fn info_symbol(&self) -> String {
        style("○").dim().to_string()
    }

    fn spinner_chars(&self) -> String {
        SPINNER_FRAMES.to_string()
    }

    fn progress_chars(&self) -> String {
        BAR_CELLS.to_string()
    }
}

pub fn init_theme() {
    cliclack::set_theme(TpoTheme);
}
