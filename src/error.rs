//! Error types for tpo
//!
//! All modules use `TpoResult<T>` as their return type.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for tpo operations
pub type TpoResult<T> = Result<T, TpoError>;

/// All errors that can occur in tpo
#[derive(Error, Debug)]
pub enum TpoError {
    // Cache key errors
    #[error("Invalid {kind} '{name}': {reason}")]
    InvalidName {
        kind: String,
        name: String,
        reason: String,
    },

    #[error("Timed out after {timeout:?} waiting for lock {path}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    // Global cache errors
    #[error("Invalid source repository URL '{url}': {reason}")]
    InvalidSourceUrl { url: String, reason: String },

    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Failed to fetch {url} (tried branches: {}). Last error: {last_error}", tried.join(", "))]
    DownloadExhausted {
        url: String,
        tried: Vec<String>,
        last_error: String,
    },

    #[error("Unexpected archive layout in {path}: {reason}")]
    ArchiveLayout { path: PathBuf, reason: String },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Archive tool '{tool}' failed: {reason}")]
    ArchiveTool { tool: String, reason: String },

    // Dependency errors
    #[error("Unknown {kind} '{name}'. Known: {}", known.join(", "))]
    UnknownDependency {
        kind: String,
        name: String,
        known: Vec<String>,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl TpoError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid name error
    pub fn invalid_name(
        kind: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidName {
            kind: kind.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a download error
    pub fn download(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. } | Self::Download { .. } | Self::DownloadExhausted { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::LockTimeout { .. } => {
                Some("Another build is using this cache entry. Retry once it finishes.")
            }
            Self::DownloadExhausted { .. } => {
                Some("Check network access, or pass the right branch with --branch")
            }
            Self::InvalidName { .. } => Some("Use letters, digits, '-' and '_' in names"),
            Self::ArchiveTool { .. } => Some("Install binutils so that `ar` is on PATH"),
            _ => None,
        }
    }
}
