//! Terminal output for the CLI
//!
//! Uses `cliclack` for styled steps, spinners and prompts in a terminal, and
//! falls back to plain tagged lines in CI or when output is piped. Lines
//! about one cache tier carry that tier's name in its color.
//!
//! # Example
//!
//! ```rust,ignore
//! use tpo::ui::{self, ArtifactSpinner, Tier, UiContext};
//!
//! let ctx = UiContext::detect().with_auto_yes(args.yes);
//!
//! let spinner = ArtifactSpinner::start(&ctx, "https://github.com/fastled/fastled");
//! // ... download ...
//! spinner.ready();
//!
//! if ui::confirm_removal(&ctx, &[cache.root()]).await? {
//!     ui::cleanup(&ctx, Tier::Global, &cache.purge()?);
//! }
//! ```

mod context;
mod progress;
mod prompts;
mod status;
mod theme;

pub use context::UiContext;
pub use progress::{ArtifactSpinner, FetchProgress};
pub use prompts::confirm_removal;
pub use status::{cleanup, emit, field, lookup, materialized, paths, Status};
pub use theme::{init_theme, Tier, TpoTheme};
