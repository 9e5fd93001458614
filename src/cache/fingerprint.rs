//! Configuration fingerprinting for local cache keys
//!
//! A build descriptor is normalized (comments stripped, lines trimmed,
//! blank-line runs collapsed) and hashed with SHA256. The first 8 hex
//! characters name the cache entry. Same semantic config = same entry.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest
pub const FINGERPRINT_LEN: usize = 8;

/// Comment delimiter in build descriptors
const COMMENT_CHAR: char = ';';

/// Every character that ends a line, besides the `\r\n` pair
const LINE_BREAKS: &[char] = &[
    '\n', '\r', '\x0b', '\x0c', '\x1c', '\x1d', '\x1e', '\u{85}', '\u{2028}', '\u{2029}',
];

/// Tag prefixed to each extra dependency appended to the fingerprinted text
const DEPENDENCY_TAG: &str = "turbo_dep:";

/// Normalize descriptor text for fingerprinting.
///
/// Each line is cut at the first `;` and trimmed, runs of empty lines
/// collapse to one, and the joined result is trimmed.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n");
    let mut lines: Vec<&str> = Vec::new();
    let mut prev_empty = false;

    for raw in unified.split(LINE_BREAKS) {
        let line = match raw.find(COMMENT_CHAR) {
            Some(pos) => &raw[..pos],
            None => raw,
        }
        .trim();

        // A single pass reaches the fixpoint: every empty line following
        // another empty line is dropped, whatever produced it.
        let empty = line.is_empty();
        if empty && prev_empty {
            continue;
        }
        lines.push(line);
        prev_empty = empty;
    }

    lines.join("\n").trim().to_string()
}

/// Append the sorted dependency set to the descriptor text.
///
/// The text is returned unchanged when there are no dependencies so that
/// plain entries keep their historical fingerprint.
pub fn with_dependencies(text: &str, dependencies: &[String]) -> String {
    if dependencies.is_empty() {
        return text.to_string();
    }

    let mut sorted: Vec<&str> = dependencies.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let deps = sorted
        .iter()
        .map(|dep| format!("{DEPENDENCY_TAG}{dep}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{text}\n{deps}")
}

/// Short SHA256 hex digest of arbitrary text
pub fn short_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(&digest[..FINGERPRINT_LEN / 2])
}

/// Full SHA256 hex digest of the raw descriptor (stored in entry metadata)
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Fingerprint a descriptor: 8 hex chars of SHA256 over the normalized text
pub fn fingerprint(text: &str) -> String {
    short_hash(&normalize(text))
}

/// Fingerprint a descriptor together with its extra dependency set
pub fn fingerprint_with_dependencies(text: &str, dependencies: &[String]) -> String {
    fingerprint(&with_dependencies(text, dependencies))
}

/// Whether `s` looks like a fingerprint (8 lowercase-insensitive hex chars)
pub fn is_fingerprint(s: &str) -> bool {
    s.len() == FINGERPRINT_LEN && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments_and_whitespace() {
        let text = "  [env:native] ; main env\nplatform = native   ;trailing\n";
        assert_eq!(normalize(text), "[env:native]\nplatform = native");
    }

    #[test]
    fn collapses_blank_runs() {
        let text = "a\n\n\n\nb\n\n;only a comment\n\nc";
        assert_eq!(normalize(text), "a\n\nb\n\nc");
    }

    #[test]
    fn comment_only_lines_cascade_into_one_blank() {
        let text = "a\n; one\n\n; two\n   \nb";
        assert_eq!(normalize(text), "a\n\nb");
    }

    #[test]
    fn handles_crlf() {
        assert_eq!(normalize("a\r\nb ; c\r\n"), normalize("a\nb\n"));
    }

    #[test]
    fn splits_on_every_line_terminator() {
        assert_eq!(normalize("a\x0cb"), "a\nb");
        assert_eq!(normalize("a ; x\x0bb\u{2028}\u{2028}\u{85}c"), "a\nb\n\nc");
        assert_eq!(fingerprint("a\x1eb"), fingerprint("a\nb"));
    }

    #[test]
    fn fingerprint_is_eight_hex_chars() {
        let fp = fingerprint("[env:uno]\nboard = uno");
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert!(is_fingerprint(&fp));
    }

    #[test]
    fn fingerprint_of_empty_text_is_sha256_of_empty() {
        // sha256("") = e3b0c442...
        assert_eq!(fingerprint(""), "e3b0c442");
        assert_eq!(fingerprint("; nothing but a comment\n\n"), "e3b0c442");
    }

    #[test]
    fn comments_and_blank_runs_do_not_change_fingerprint() {
        let a = "[env:native]\nplatform = foo ; comment\n\n\nboard=uno";
        let b = "[env:native]\nplatform = foo\n\nboard=uno";
        assert_eq!(fingerprint(a), fingerprint(b));
    }

    #[test]
    fn semantic_change_changes_fingerprint() {
        let a = "[env:native]\nplatform = foo";
        let b = "[env:native]\nplatform = bar";
        assert_ne!(fingerprint(a), fingerprint(b));
    }

    #[test]
    fn dependency_order_is_irrelevant() {
        let text = "[env:dev]";
        let one = vec!["FastLED".to_string(), "ArduinoJson".to_string()];
        let two = vec!["ArduinoJson".to_string(), "FastLED".to_string()];
        assert_eq!(
            fingerprint_with_dependencies(text, &one),
            fingerprint_with_dependencies(text, &two)
        );
    }

    #[test]
    fn dependencies_change_fingerprint() {
        let text = "[env:dev]";
        let deps = vec!["FastLED".to_string()];
        assert_ne!(fingerprint(text), fingerprint_with_dependencies(text, &deps));
        assert_eq!(fingerprint(text), fingerprint_with_dependencies(text, &[]));
    }

    #[test]
    fn dependency_block_format() {
        let deps = vec!["b".to_string(), "a".to_string()];
        assert_eq!(with_dependencies("x", &deps), "x\nturbo_dep:a\nturbo_dep:b");
    }

    #[test]
    fn content_hash_is_full_digest() {
        assert_eq!(content_hash("").len(), 64);
        assert_ne!(content_hash("a ; x"), content_hash("a"));
    }
}
