//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// tpo - Two-tier build cache for embedded toolchains
///
/// Keeps a fingerprinted per-project cache of build directories and a
/// per-user cache of downloaded library and platform sources.
#[derive(Parser, Debug)]
#[command(name = "tpo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "TPO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project directory (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    pub project_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the fingerprint of a build configuration file
    Fingerprint(FingerprintArgs),

    /// Get or create the local cache entry for a build
    Entry(EntryArgs),

    /// Manage the project-local cache
    Cache(CacheArgs),

    /// Manage the per-user artifact cache
    Global(GlobalArgs),

    /// Resolve and materialize dependencies
    Deps(DepsArgs),

    /// Remove both caches, skipping anything in use
    Purge {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Arguments for the fingerprint command
#[derive(Parser, Debug)]
pub struct FingerprintArgs {
    /// Build configuration file (e.g. platformio.ini)
    pub file: PathBuf,

    /// Dependency folded into the fingerprint (repeatable)
    #[arg(short, long = "dep")]
    pub deps: Vec<String>,
}

/// Arguments for the entry command
#[derive(Parser, Debug)]
pub struct EntryArgs {
    /// Target platform name
    pub platform: String,

    /// Build configuration file, relative to the project directory
    #[arg(long, default_value = "platformio.ini")]
    pub ini: PathBuf,

    /// Dependency materialized into the entry (repeatable)
    #[arg(short, long = "dep")]
    pub deps: Vec<String>,

    /// Source path recorded in the entry metadata (defaults to the project directory)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Local cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cache entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Evict expired and least recently used entries
    Gc {
        /// Entries to keep (default: from config)
        #[arg(long)]
        max_entries: Option<usize>,

        /// Remove entries older than N days (default: from config)
        #[arg(long)]
        max_age_days: Option<u32>,
    },

    /// Remove directories left by older cache layouts
    Migrate,

    /// Remove every entry
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Reuse or create a prebuilt library archive
    Archive(ArchiveArgs),
}

/// Arguments for `cache archive`
#[derive(Parser, Debug)]
pub struct ArchiveArgs {
    /// Library name
    pub library: String,

    /// Library version
    #[arg(long = "lib-version", id = "lib_version", value_name = "VERSION")]
    pub version: String,

    /// Target platform name
    #[arg(long)]
    pub platform: String,

    /// Build directory holding the compiled objects
    #[arg(long)]
    pub build_dir: PathBuf,

    /// Compiler flag folded into the archive fingerprint (repeatable)
    #[arg(long = "flag", allow_hyphen_values = true)]
    pub flags: Vec<String>,

    /// Copy the archive into this directory
    #[arg(long)]
    pub install: Option<PathBuf>,

    /// Archiver to run
    #[arg(long, default_value = "ar")]
    pub ar: String,
}

/// Arguments for the global command
#[derive(Parser, Debug)]
pub struct GlobalArgs {
    /// Subcommand for global
    #[command(subcommand)]
    pub action: GlobalAction,
}

/// Global cache subcommands
#[derive(Subcommand, Debug)]
pub enum GlobalAction {
    /// List cached artifacts by repository
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Download and expand a repository archive
    Fetch {
        /// Repository URL (https://host/owner/repo)
        url: String,

        /// Branch to try, in order (repeatable; default: from config)
        #[arg(short, long = "branch")]
        branches: Vec<String>,
    },

    /// Keep the newest artifacts of each repository
    Clean {
        /// Artifacts kept per repository (default: from config)
        #[arg(long)]
        keep: Option<usize>,
    },

    /// Remove the whole global cache
    Purge {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the total size of the global cache
    Size,
}

/// Arguments for the deps command
#[derive(Parser, Debug)]
pub struct DepsArgs {
    /// Subcommand for deps
    #[command(subcommand)]
    pub action: DepsAction,
}

/// Dependency subcommands
#[derive(Subcommand, Debug)]
pub enum DepsAction {
    /// Show the repository each name resolves to
    Resolve {
        /// Library or platform names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Copy dependencies into a project
    Fetch {
        /// Library or platform names
        #[arg(required = true)]
        names: Vec<String>,

        /// Target directory (defaults to the project directory)
        #[arg(long)]
        into: Option<PathBuf>,

        /// Treat names as platforms
        #[arg(long)]
        platform: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
