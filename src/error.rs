/// Crate-level error types for driftmark diagnostics.
use std::path::PathBuf;

use crate::types::{AnnotationId, DocumentId, MarkerId};

/// Errors carry enough context to produce a useful diagnostic without a
/// debugger. Steady-state drift is never an error: it is reported through
/// reconciliation and orphan statuses. Only caller bugs and I/O land here.
#[allow(clippy::error_impl_error, reason = "crate-wide error type")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A marker must be bound to at least one annotation.
    #[error("marker at line {line} has no annotation ids")]
    EmptyAnnotations {
        /// Line the marker was requested at.
        line: u32,
    },

    /// A tracked source file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Source file exceeds the outliner size limit.
    #[error("file too large ({size_bytes} bytes, max {max_bytes}): {}", file.display())]
    FileTooLarge {
        /// File that exceeded the size limit.
        file: PathBuf,
        /// Maximum allowed file size in bytes.
        max_bytes: u64,
        /// Actual file size in bytes.
        size_bytes: u64,
    },

    /// A marker id given on the command line is not `m<N>` or `<N>`.
    #[error("invalid marker id `{text}`")]
    InvalidMarkerId {
        /// Text that failed to parse.
        text: String,
    },

    /// A range marker's end line is not after its start or past the document end.
    #[error("invalid range {start_line}-{end_line} (document has {line_count} lines)")]
    InvalidRange {
        /// Requested end line.
        end_line: u32,
        /// Number of lines in the document.
        line_count: u32,
        /// Requested start line.
        start_line: u32,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// A line or edit position lies outside the document.
    #[error("line {line} out of bounds (document has {line_count} lines)")]
    LineOutOfBounds {
        /// Offending 1-based line.
        line: u32,
        /// Number of lines in the document.
        line_count: u32,
    },

    /// Tree-sitter failed to parse a source file.
    #[error("parse failed: {}: {reason}", file.display())]
    ParseFailed {
        /// File that failed to parse.
        file: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// The symbol provider could not produce an outline.
    #[error("symbol provider failed: {reason}")]
    ProviderFailed {
        /// Description of the provider failure.
        reason: String,
    },

    /// Marker store exists but cannot be used.
    #[error("marker store corrupt: {reason}")]
    StoreCorrupt {
        /// Description of the corruption.
        reason: String,
    },

    /// Expected marker store does not exist on disk.
    #[error("marker store not found: {}", path.display())]
    StoreNotFound {
        /// Path to the missing store.
        path: PathBuf,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// TOML serialization failed.
    #[error("toml serialize: {0}")]
    TomlSer(
        /// The wrapped TOML serialization error.
        #[from]
        toml::ser::Error,
    ),

    /// No marker in the document carries this annotation.
    #[error("unknown annotation: `{id}`")]
    UnknownAnnotation {
        /// Annotation id that was not found.
        id: AnnotationId,
    },

    /// The document session was never opened or is already closed.
    #[error("unknown document: {id}")]
    UnknownDocument {
        /// Session id that was not found.
        id: DocumentId,
    },

    /// No marker with this id exists in the document.
    #[error("unknown marker: {id}")]
    UnknownMarker {
        /// Marker id that was not found.
        id: MarkerId,
    },

    /// No tree-sitter grammar registered for this file extension.
    #[error("no grammar for extension: .{ext}")]
    UnsupportedLanguage {
        /// File extension without the leading dot.
        ext: String,
    },

    /// The filesystem watcher could not be set up.
    #[error("watch failed: {reason}")]
    WatchFailed {
        /// Description of the watcher failure.
        reason: String,
    },
}
