/// Core domain types for anchors, markers, symbols, and verification outcomes.
use std::collections::BTreeSet;
use std::fmt;
use std::time::SystemTime;

use crate::fingerprint::LineHash;

/// A semantic, symbol-path description of a code location.
/// `symbol_path` is never empty: an absent anchor is modelled as
/// `Anchoring::Fingerprint` rather than an empty path.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Anchor {
    /// Name of the innermost symbol's direct container, if any.
    pub container_name: Option<String>,
    /// Lines between the innermost symbol's start and the tracked line.
    pub offset: u32,
    /// Kind of the innermost symbol.
    pub symbol_kind: SymbolKind,
    /// Symbol names from the outermost scope down to the innermost symbol.
    pub symbol_path: Vec<String>,
}

impl Anchor {
    /// Dot-joined symbol path, e.g. `Config.validate`.
    pub fn display_path(&self) -> String {
        return self.symbol_path.join(".");
    }
}

/// How a marker is anchored. Explicit variant instead of a nullable anchor so
/// the reason for falling back to fingerprints travels with the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchoring {
    /// No semantic anchor; the content fingerprint is the only locator.
    Fingerprint(FallbackReason),
    /// Symbol-path anchor resolved against the document outline.
    Semantic(Anchor),
}

impl Anchoring {
    /// The semantic anchor, if the marker has one.
    pub const fn anchor(&self) -> Option<&Anchor> {
        return match self {
            Self::Fingerprint(_) => None,
            Self::Semantic(anchor) => Some(anchor),
        };
    }
}

/// Identifier of an annotation bound to a marker. Annotation content lives
/// with the consuming layer; the engine only tracks ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct AnnotationId(
    /// The raw identifier.
    pub String,
);

impl From<&str> for AnnotationId {
    fn from(value: &str) -> Self {
        return Self(value.to_string());
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.0);
    }
}

/// Certainty of a semantic resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Several symbols share the path; the first in traversal order was used.
    Ambiguous,
    /// Exactly one symbol matches the path.
    Exact,
    /// Symbol found elsewhere with lower certainty.
    Moved,
    /// No symbol matches.
    NotFound,
}

/// Opaque handle for a document session owned by the marker manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(
    /// Session counter value.
    pub u64,
);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "doc#{}", self.0);
    }
}

/// One document mutation in line terms: lines `start_line..=end_line` (the
/// lines touched by the edited range) were replaced by `replacement_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditEvent {
    /// Last line touched by the edited range.
    pub end_line: u32,
    /// Text inserted in place of the edited range.
    pub replacement_text: String,
    /// First line touched by the edited range.
    pub start_line: u32,
}

impl EditEvent {
    /// Number of lines the replacement text spans.
    pub fn lines_added(&self) -> u32 {
        let count = self.replacement_text.split('\n').count();
        return u32::try_from(count).unwrap_or(u32::MAX);
    }

    /// Number of lines the edited range spanned.
    pub const fn lines_removed(&self) -> u32 {
        return self.end_line.saturating_sub(self.start_line).saturating_add(1);
    }

    /// Net change in document line count.
    pub fn line_delta(&self) -> i64 {
        return i64::from(self.lines_added()).saturating_sub(i64::from(self.lines_removed()));
    }
}

/// Why a marker has no semantic anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackReason {
    /// No symbol encloses the line (blank line, comment, top-level statement).
    NoEnclosingSymbol,
    /// The document has no symbol provider.
    NoProvider,
    /// The provider returned no symbols or failed.
    NoSymbols,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoEnclosingSymbol => "no enclosing symbol",
            Self::NoProvider => "no symbol provider",
            Self::NoSymbols => "no symbols available",
        };
        return f.write_str(text);
    }
}

/// Inclusive 1-based line range of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    /// Last line of the symbol.
    pub end: u32,
    /// First line of the symbol.
    pub start: u32,
}

impl LineRange {
    /// Whether `line` falls inside the range.
    pub const fn contains(&self, line: u32) -> bool {
        return line >= self.start && line <= self.end;
    }
}

/// The durable tracking unit binding annotations to a location.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Annotations bound to this marker. Never empty while the marker exists.
    pub annotation_ids: BTreeSet<AnnotationId>,
    /// Semantic anchor or the reason there is none.
    pub anchoring: Anchoring,
    /// Last line of a range marker; always greater than `start_line`.
    pub end_line: Option<u32>,
    /// Unique id within the manager.
    pub id: MarkerId,
    /// Time of the last successful verification.
    pub last_verified: SystemTime,
    /// Hash of the tracked line.
    pub line_hash: LineHash,
    /// Trimmed text of the tracked line.
    pub line_text: String,
    /// Trimmed text of the line after the tracked line.
    pub next_line_text: String,
    /// Trimmed text of the line before the tracked line.
    pub prev_line_text: String,
    /// Tracked line.
    pub start_line: u32,
    /// Result of the last verification pass.
    pub state: MarkerState,
}

impl Marker {
    /// The semantic anchor, if any.
    pub const fn anchor(&self) -> Option<&Anchor> {
        return self.anchoring.anchor();
    }

    /// Whether `line` falls on this marker (inside the range for range markers).
    pub fn covers(&self, line: u32) -> bool {
        return match self.end_line {
            None => self.start_line == line,
            Some(end) => line >= self.start_line && line <= end,
        };
    }

    /// Whether the marker is bound to `annotation`.
    pub fn has_annotation(&self, annotation: &AnnotationId) -> bool {
        return self.annotation_ids.contains(annotation);
    }
}

/// Identifier of a marker, unique within one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(
    /// Allocation counter value.
    pub u64,
);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "m{}", self.0);
    }
}

/// Per-marker verification state machine. `Unverified` is only the entry
/// state; every verification pass moves the marker to one of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    /// Last pass corrected the marker silently.
    AutoFixed,
    /// Last pass found no candidate location.
    NeedsManualFix,
    /// Last pass found a plausible but uncertain candidate.
    NeedsReview,
    /// Created or restored, not yet verified.
    Unverified,
    /// Last pass confirmed the marker in place.
    Valid,
}

impl From<Status> for MarkerState {
    fn from(status: Status) -> Self {
        return match status {
            Status::AutoFixed => Self::AutoFixed,
            Status::NeedsManualFix => Self::NeedsManualFix,
            Status::NeedsReview => Self::NeedsReview,
            Status::Valid => Self::Valid,
        };
    }
}

/// Machine-readable reason attached to a reconciliation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    /// Lower-certainty semantic relocation.
    AstAmbiguousMove,
    /// Symbol still at the recorded line, content refreshed.
    AstContentUpdated,
    /// Symbol and content unchanged.
    AstExactMatch,
    /// Several symbols share the anchor's path.
    AstMultipleMatches,
    /// Symbol moved; marker followed it.
    AstSymbolMoved,
    /// Three-line fingerprint found nearby.
    FoundDrift,
    /// Line hash unchanged.
    HashMatch,
    /// Marker line lies outside the document.
    LineOutOfBounds,
    /// Nothing resembling the line was found.
    NoMatchFound,
    /// Only the line itself matched, not its neighbors.
    PartialMatch,
    /// Only whitespace changed on the line.
    WhitespaceChange,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AstAmbiguousMove => "ast-ambiguous-move",
            Self::AstContentUpdated => "ast-content-updated",
            Self::AstExactMatch => "ast-exact-match",
            Self::AstMultipleMatches => "ast-multiple-matches",
            Self::AstSymbolMoved => "ast-symbol-moved",
            Self::FoundDrift => "found-drift",
            Self::HashMatch => "hash-match",
            Self::LineOutOfBounds => "line-out-of-bounds",
            Self::NoMatchFound => "no-match-found",
            Self::PartialMatch => "partial-match",
            Self::WhitespaceChange => "whitespace-change",
        };
        return f.write_str(text);
    }
}

/// Output of full marker verification.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReconciliationOutcome {
    /// Marker this outcome describes.
    #[serde(serialize_with = "serialize_marker_id")]
    pub marker_id: MarkerId,
    /// Line after an automatic fix.
    pub new_line: Option<u32>,
    /// Line before an automatic fix.
    pub old_line: Option<u32>,
    /// Why the status was chosen.
    pub reason: Reason,
    /// Verification verdict.
    pub status: Status,
    /// Candidate line for markers that need review.
    pub suggested_line: Option<u32>,
}

impl ReconciliationOutcome {
    /// Outcome without line changes or suggestions.
    pub const fn plain(marker_id: MarkerId, status: Status, reason: Reason) -> Self {
        return Self {
            marker_id,
            new_line: None,
            old_line: None,
            reason,
            status,
            suggested_line: None,
        };
    }

    /// Marker was moved from `old_line` to `new_line`.
    pub const fn moved(marker_id: MarkerId, reason: Reason, old_line: u32, new_line: u32) -> Self {
        return Self {
            marker_id,
            new_line: Some(new_line),
            old_line: Some(old_line),
            reason,
            status: Status::AutoFixed,
            suggested_line: None,
        };
    }

    /// Marker needs review; `suggested_line` is the best candidate.
    pub const fn review(marker_id: MarkerId, reason: Reason, suggested_line: u32) -> Self {
        return Self {
            marker_id,
            new_line: None,
            old_line: None,
            reason,
            status: Status::NeedsReview,
            suggested_line: Some(suggested_line),
        };
    }
}

/// Output of semantic resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// How certain the resolution is.
    pub confidence: Confidence,
    /// Resolved line, absent when not found.
    pub line: Option<u32>,
    /// Human-readable explanation.
    pub message: String,
}

impl Resolution {
    /// A `not_found` resolution with an explanation.
    pub fn not_found(message: impl Into<String>) -> Self {
        return Self {
            confidence: Confidence::NotFound,
            line: None,
            message: message.into(),
        };
    }
}

/// Verdict of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// Engine silently corrected the marker.
    AutoFixed,
    /// No candidate found; the user must re-anchor.
    NeedsManualFix,
    /// Plausible but uncertain candidate found.
    NeedsReview,
    /// Marker confirmed in place.
    Valid,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AutoFixed => "auto-fixed",
            Self::NeedsManualFix => "needs-manual-fix",
            Self::NeedsReview => "needs-review",
            Self::Valid => "valid",
        };
        return f.write_str(text);
    }
}

/// Enumerated symbol category, a subset of the LSP symbol kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    /// Class declaration.
    Class,
    /// Constant or static item.
    Constant,
    /// Enum declaration.
    Enum,
    /// Enum variant.
    EnumMember,
    /// Struct or class field.
    Field,
    /// Free function.
    Function,
    /// Rust `impl` block.
    Impl,
    /// Interface declaration.
    Interface,
    /// Method or associated function.
    Method,
    /// Module.
    Module,
    /// Namespace.
    Namespace,
    /// Markdown heading section.
    Section,
    /// Struct declaration.
    Struct,
    /// Trait declaration.
    Trait,
    /// Type alias.
    TypeAlias,
    /// Variable binding.
    Variable,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Class => "class",
            Self::Constant => "constant",
            Self::Enum => "enum",
            Self::EnumMember => "enum-member",
            Self::Field => "field",
            Self::Function => "function",
            Self::Impl => "impl",
            Self::Interface => "interface",
            Self::Method => "method",
            Self::Module => "module",
            Self::Namespace => "namespace",
            Self::Section => "section",
            Self::Struct => "struct",
            Self::Trait => "trait",
            Self::TypeAlias => "type-alias",
            Self::Variable => "variable",
        };
        return f.write_str(text);
    }
}

/// One symbol in a document outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolNode {
    /// Nested symbols, in document order.
    pub children: Vec<SymbolNode>,
    /// Symbol category.
    pub kind: SymbolKind,
    /// Declared name.
    pub name: String,
    /// Lines the symbol spans.
    pub range: LineRange,
}

impl SymbolNode {
    /// Leaf symbol spanning `start..=end`.
    pub fn new(name: impl Into<String>, kind: SymbolKind, start: u32, end: u32) -> Self {
        return Self {
            children: Vec::new(),
            kind,
            name: name.into(),
            range: LineRange { end, start },
        };
    }

    /// Builder-style helper to attach children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children = children;
        return self;
    }
}

/// A document's hierarchical symbol outline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTree {
    /// Top-level symbols, in document order.
    pub symbols: Vec<SymbolNode>,
}

impl SymbolTree {
    /// Whether the outline has no symbols at all.
    pub const fn is_empty(&self) -> bool {
        return self.symbols.is_empty();
    }

    /// Total number of symbols at every depth.
    pub fn len(&self) -> usize {
        fn count(nodes: &[SymbolNode]) -> usize {
            return nodes.iter().map(|n| return count(&n.children).saturating_add(1)).sum();
        }
        return count(&self.symbols);
    }
}

/// Serialize a marker id through its display form (`m<n>`).
fn serialize_marker_id<S: serde::Serializer>(id: &MarkerId, serializer: S) -> Result<S::Ok, S::Error> {
    return serializer.collect_str(id);
}
