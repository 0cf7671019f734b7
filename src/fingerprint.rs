//! Content fingerprints: normalized line hashes and the three-line window
//! used to relocate a line when no symbol covers it.

use sha2::{Digest as _, Sha256};

use crate::document::DocumentAccessor;

/// Stand-in text for blank lines so they are still hashable and comparable.
pub const BLANK_LINE_PLACEHOLDER: &str = "[blank line]";

/// Default number of lines searched on each side of the last known line.
pub const DEFAULT_SEARCH_RADIUS: u32 = 10;

/// Hex digits kept from the SHA-256 digest.
const HASH_LEN: usize = 16;

/// Trimmed text of a line and its immediate neighbors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Normalized text of the tracked line.
    pub line_text: String,
    /// Normalized text of the following line; empty at the document end.
    pub next_line_text: String,
    /// Normalized text of the preceding line; empty at the document start.
    pub prev_line_text: String,
}

impl Fingerprint {
    /// Capture the window around `line`, or `None` if the line is out of range.
    pub fn capture(document: &dyn DocumentAccessor, line: u32) -> Option<Self> {
        let text = document.line_text(line)?;
        return Some(Self {
            line_text: normalized_text(text),
            next_line_text: neighbor_text(document, line.checked_add(1)),
            prev_line_text: neighbor_text(document, line.checked_sub(1)),
        });
    }
}

/// Where a fingerprint search found the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintMatch {
    /// The line and both neighbors match.
    Full(u32),
    /// Only the line itself matches.
    Partial(u32),
}

/// A truncated SHA-256 line hash: 16 lowercase hex chars.
/// Newtype prevents mixing with arbitrary strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct LineHash(
    /// The hex-encoded digest prefix.
    pub String,
);

/// Search `anchor_line ± radius` (clamped to the document) for the
/// fingerprinted line. The first full three-line match wins; otherwise the
/// first line whose own text matches.
pub fn find_line_by_fingerprint(
    document: &dyn DocumentAccessor,
    fingerprint: &Fingerprint,
    anchor_line: u32,
    radius: u32,
) -> Option<FingerprintMatch> {
    let first = anchor_line.saturating_sub(radius).max(1);
    let last = anchor_line.saturating_add(radius).min(document.line_count());
    if first > last {
        return None;
    }

    let mut partial = None;
    for line in first..=last {
        let Some(candidate) = Fingerprint::capture(document, line) else {
            continue;
        };
        if candidate.line_text != fingerprint.line_text {
            continue;
        }
        if candidate.prev_line_text == fingerprint.prev_line_text
            && candidate.next_line_text == fingerprint.next_line_text
        {
            return Some(FingerprintMatch::Full(line));
        }
        if partial.is_none() {
            partial = Some(FingerprintMatch::Partial(line));
        }
    }
    return partial;
}

/// Hash a single line. Normalization strips the line terminator and trailing
/// whitespace; blank lines hash as [`BLANK_LINE_PLACEHOLDER`]. Leading
/// whitespace is kept so re-indentation is visible as a hash change.
pub fn hash_line(text: &str) -> LineHash {
    return digest(hash_normalized(text).as_bytes());
}

/// Hash consecutive lines, each normalized like [`hash_line`], joined by `\n`.
pub fn hash_range(lines: &[&str]) -> LineHash {
    let combined = lines.iter().map(|l| return hash_normalized(l)).collect::<Vec<_>>().join("\n");
    return digest(combined.as_bytes());
}

/// Normalization applied before hashing.
fn hash_normalized(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.trim_start().is_empty() {
        return BLANK_LINE_PLACEHOLDER.to_string();
    }
    return trimmed.to_string();
}

/// SHA-256, hex-encoded, truncated to [`HASH_LEN`].
fn digest(bytes: &[u8]) -> LineHash {
    let hex = format!("{:x}", Sha256::digest(bytes));
    return LineHash(hex.chars().take(HASH_LEN).collect());
}

/// Normalized text of a neighbor line; empty when it does not exist.
fn neighbor_text(document: &dyn DocumentAccessor, line: Option<u32>) -> String {
    return line
        .and_then(|l| return document.line_text(l))
        .map(|t| return t.trim().to_string())
        .unwrap_or_default();
}

/// Fully trimmed text, or [`BLANK_LINE_PLACEHOLDER`] for blank lines.
pub fn normalized_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return BLANK_LINE_PLACEHOLDER.to_string();
    }
    return trimmed.to_string();
}

/// How many of the three window lines around `line` still match: the line
/// itself by hash, its neighbors by trimmed text. Out-of-range lines never match.
pub fn window_agreement(
    document: &dyn DocumentAccessor,
    line: u32,
    fingerprint: &Fingerprint,
    line_hash: &LineHash,
) -> u8 {
    let mut matches = 0_u8;
    if document.line_text(line).is_some_and(|t| return hash_line(t) == *line_hash) {
        matches = matches.saturating_add(1);
    }
    let Some(current) = Fingerprint::capture(document, line) else {
        return matches;
    };
    if line > 1 && current.prev_line_text == fingerprint.prev_line_text {
        matches = matches.saturating_add(1);
    }
    if line < document.line_count() && current.next_line_text == fingerprint.next_line_text {
        matches = matches.saturating_add(1);
    }
    return matches;
}
