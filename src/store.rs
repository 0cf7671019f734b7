//! Marker store persistence: parsing, serialization, and ordering enforcement.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::fingerprint::LineHash;
use crate::types::{Anchor, Anchoring, AnnotationId, FallbackReason, Marker, MarkerId, MarkerState};

/// Store file name, written next to the tracked sources.
pub const STORE_FILE: &str = ".driftmark.lock";

/// A single persisted marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredMarker {
    /// Semantic anchor, absent for fingerprint-only markers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
    /// Annotation ids bound to the marker, sorted.
    pub annotations: Vec<AnnotationId>,
    /// Last line of a range marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    /// Why the marker has no anchor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackReason>,
    /// Tracked file, relative to the store.
    pub file: PathBuf,
    /// Marker id, unique across the store.
    pub id: u64,
    /// Hash of the tracked line.
    pub line_hash: LineHash,
    /// Trimmed text of the tracked line.
    pub line_text: String,
    /// Trimmed text of the following line.
    pub next_line_text: String,
    /// Trimmed text of the preceding line.
    pub prev_line_text: String,
    /// Tracked line.
    pub start_line: u32,
}

impl StoredMarker {
    /// Snapshot a live marker for `file`.
    pub fn from_marker(file: &Path, marker: &Marker) -> Self {
        let (anchor, fallback) = match &marker.anchoring {
            Anchoring::Fingerprint(reason) => (None, Some(*reason)),
            Anchoring::Semantic(anchor) => (Some(anchor.clone()), None),
        };
        return Self {
            anchor,
            annotations: marker.annotation_ids.iter().cloned().collect(),
            end_line: marker.end_line,
            fallback,
            file: file.to_path_buf(),
            id: marker.id.0,
            line_hash: marker.line_hash.clone(),
            line_text: marker.line_text.clone(),
            next_line_text: marker.next_line_text.clone(),
            prev_line_text: marker.prev_line_text.clone(),
            start_line: marker.start_line,
        };
    }

    /// Rebuild an unverified live marker.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyAnnotations` if the entry has no annotations.
    pub fn to_marker(&self) -> Result<Marker, Error> {
        if self.annotations.is_empty() {
            return Err(Error::EmptyAnnotations { line: self.start_line });
        }
        let anchoring = match &self.anchor {
            Some(anchor) => Anchoring::Semantic(anchor.clone()),
            None => Anchoring::Fingerprint(self.fallback.unwrap_or(FallbackReason::NoProvider)),
        };
        return Ok(Marker {
            annotation_ids: self.annotations.iter().cloned().collect(),
            anchoring,
            end_line: self.end_line,
            id: MarkerId(self.id),
            last_verified: SystemTime::now(),
            line_hash: self.line_hash.clone(),
            line_text: self.line_text.clone(),
            next_line_text: self.next_line_text.clone(),
            prev_line_text: self.prev_line_text.clone(),
            start_line: self.start_line,
            state: MarkerState::Unverified,
        });
    }
}

impl Ord for StoredMarker {
    /// Compare entries by (file, start line, id) for deterministic ordering.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        return (&self.file, self.start_line, self.id).cmp(&(&other.file, other.start_line, other.id));
    }
}

impl PartialOrd for StoredMarker {
    /// Delegate to `Ord` implementation.
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        return Some(self.cmp(other));
    }
}

/// The store as a whole. Entries are sorted by (file, start line, id).
/// Constructed only via `MarkerStore::new()` or `MarkerStore::parse()`, both
/// of which enforce sorting and uniqueness.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MarkerStore {
    /// The ordered list of persisted markers.
    #[serde(default, rename = "marker")]
    pub entries: Vec<StoredMarker>,
}

impl MarkerStore {
    /// Entries tracking `file`.
    pub fn entries_for<'s>(&'s self, file: &'s Path) -> impl Iterator<Item = &'s StoredMarker> + 's {
        return self.entries.iter().filter(move |e| return e.file == file);
    }

    /// Tracked files, sorted.
    pub fn files(&self) -> BTreeSet<PathBuf> {
        return self.entries.iter().map(|e| return e.file.clone()).collect();
    }

    /// Next unused marker id.
    pub fn next_id(&self) -> u64 {
        return self.entries.iter().map(|e| return e.id).max().map_or(1, |m| return m.saturating_add(1));
    }

    /// Create a store from unsorted entries. Sorts and deduplicates.
    pub fn new(mut entries: Vec<StoredMarker>) -> Self {
        entries.sort();
        entries.dedup();
        return Self { entries };
    }

    /// Parse a store from TOML content.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the content is not valid TOML,
    /// or `Error::StoreCorrupt` if entries are not sorted or ids repeat.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let store: Self = toml::from_str(content)?;
        enforce_entry_ordering(&store.entries)?;
        enforce_unique_ids(&store.entries)?;
        return Ok(store);
    }

    /// Read and parse a store from disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreNotFound` if the file doesn't exist,
    /// `Error::Io` for other read failures,
    /// `Error::TomlDe` if the content is invalid TOML,
    /// or `Error::StoreCorrupt` if entries are not sorted.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::StoreNotFound { path: path.to_path_buf() });
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::parse(&content);
    }

    /// Replace every entry of `file` with snapshots of `markers`.
    pub fn replace_file(&mut self, file: &Path, markers: &[Marker]) {
        let mut entries: Vec<StoredMarker> = self.entries.drain(..).filter(|e| return e.file != file).collect();
        entries.extend(markers.iter().map(|m| return StoredMarker::from_marker(file, m)));
        *self = Self::new(entries);
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` if serialization fails.
    pub fn serialize(&self) -> Result<String, Error> {
        return Ok(toml::to_string_pretty(self)?);
    }

    /// Write the store to disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` if serialization fails,
    /// or `Error::Io` if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), Error> {
        let content = self.serialize()?;
        std::fs::write(path, content)?;
        return Ok(());
    }
}

/// Validate that entries are strictly sorted.
///
/// # Errors
///
/// Returns `Error::StoreCorrupt` if any adjacent pair is out of order.
fn enforce_entry_ordering(entries: &[StoredMarker]) -> Result<(), Error> {
    for pair in entries.windows(2) {
        let (Some(first), Some(second)) = (pair.first(), pair.get(1)) else {
            continue;
        };
        if first >= second {
            return Err(Error::StoreCorrupt {
                reason: format!(
                    "entries not sorted: {}:{} m{} >= {}:{} m{}",
                    first.file.display(),
                    first.start_line,
                    first.id,
                    second.file.display(),
                    second.start_line,
                    second.id,
                ),
            });
        }
    }
    return Ok(());
}

/// Validate that no marker id appears twice.
///
/// # Errors
///
/// Returns `Error::StoreCorrupt` naming the first repeated id.
fn enforce_unique_ids(entries: &[StoredMarker]) -> Result<(), Error> {
    let mut seen = BTreeSet::new();
    for entry in entries {
        if !seen.insert(entry.id) {
            return Err(Error::StoreCorrupt { reason: format!("duplicate marker id m{}", entry.id) });
        }
    }
    return Ok(());
}
