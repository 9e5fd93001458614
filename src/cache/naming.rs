//! Filesystem-safe naming for cache key components
//!
//! Names end up as directory and file names on every supported OS, so they
//! are held to the strictest rules (Windows). A handful of common separators
//! are rewritten to `_`; anything else that is unsafe is rejected rather
//! than silently altered.

use crate::cache::fingerprint::is_fingerprint;
use crate::error::{TpoError, TpoResult};

/// Longest accepted name component
pub const MAX_NAME_LEN: usize = 100;

/// Characters that are never valid in a name
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Characters rewritten to `_` before validation
const REPLACED_CHARS: &[char] = &['/', '\\', ':', ' '];

/// Device names reserved by Windows regardless of extension
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Sanitize and validate a name component.
///
/// `kind` describes the name in error messages (e.g. "platform").
pub fn sanitize_name(name: &str, kind: &str) -> TpoResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TpoError::invalid_name(
            kind,
            name,
            "cannot be empty or only whitespace",
        ));
    }

    let sanitized: String = trimmed
        .chars()
        .map(|c| if REPLACED_CHARS.contains(&c) { '_' } else { c })
        .collect();

    validate_name(&sanitized, kind)?;
    Ok(sanitized)
}

/// Validate a name component without rewriting it.
///
/// The result is always a single path component: separators are rejected,
/// and so are `.` and `..` through the trailing-dot rule.
pub fn validate_name(name: &str, kind: &str) -> TpoResult<()> {
    if name.trim().is_empty() {
        return Err(TpoError::invalid_name(
            kind,
            name,
            "cannot be empty or only whitespace",
        ));
    }

    if name.contains(['/', '\\']) {
        return Err(TpoError::invalid_name(
            kind,
            name,
            "cannot contain path separators",
        ));
    }

    let mut found: Vec<char> = name
        .chars()
        .filter(|c| INVALID_CHARS.contains(c) || c.is_control())
        .collect();
    if !found.is_empty() {
        found.dedup();
        return Err(TpoError::invalid_name(
            kind,
            name,
            format!("contains invalid characters: {found:?}. Names must be filesystem-safe"),
        ));
    }

    let upper = name.to_ascii_uppercase();
    let stem = upper.split('.').next().unwrap_or_default();
    if RESERVED_NAMES.contains(&stem) {
        return Err(TpoError::invalid_name(
            kind,
            name,
            "is a reserved name on Windows",
        ));
    }

    if name.ends_with('.') || name.ends_with(' ') {
        return Err(TpoError::invalid_name(
            kind,
            name,
            "cannot end with dots or spaces",
        ));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(TpoError::invalid_name(
            kind,
            name,
            format!("is too long (max {MAX_NAME_LEN} characters)"),
        ));
    }

    Ok(())
}

/// Local entry directory name for a sanitized platform and fingerprint
pub fn entry_dir_name(platform: &str, fingerprint: &str) -> String {
    format!("{platform}-{fingerprint}")
}

/// Split an entry directory name into `(platform, fingerprint)`.
///
/// Returns `None` for names that do not follow `<platform>-<8 hex>`.
pub fn parse_entry_dir_name(name: &str) -> Option<(&str, &str)> {
    let (platform, fingerprint) = name.rsplit_once('-')?;
    if platform.is_empty() || !is_fingerprint(fingerprint) {
        return None;
    }
    Some((platform, fingerprint))
}
