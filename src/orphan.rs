//! Orphan classification: decides whether a marker's annotation has lost its
//! code, and suggests where it might belong now.

use std::fmt;

use crate::anchor::{locate_relaxed, resolve_anchor};
use crate::document::DocumentAccessor;
use crate::error::Error;
use crate::fingerprint::{Fingerprint, hash_line, window_agreement};
use crate::types::{AnnotationId, Confidence, Marker, MarkerId, SymbolTree};

/// Orphans below this confidence are not reported.
pub const REPORT_MIN_CONFIDENCE: u8 = 70;

/// An orphaned annotation, as listed in reports.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OrphanedAnnotation {
    /// The annotation that lost its code.
    pub annotation_id: AnnotationId,
    /// Marker the annotation is bound to.
    #[serde(serialize_with = "serialize_display")]
    pub marker_id: MarkerId,
    /// Marker line at classification time.
    pub line: u32,
    /// Classification.
    pub status: OrphanStatus,
}

/// Why a marker is, or is not, orphaned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrphanReason {
    /// The code at the marker line changed beyond a formatting tweak.
    ContentChanged,
    /// The marker is correctly anchored.
    NotOrphaned,
    /// The anchored symbol no longer exists in the document.
    SymbolDeleted,
    /// The anchored symbol exists under a different path.
    SymbolMoved,
}

impl fmt::Display for OrphanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ContentChanged => "content-changed",
            Self::NotOrphaned => "not-orphaned",
            Self::SymbolDeleted => "symbol-deleted",
            Self::SymbolMoved => "symbol-moved",
        };
        return f.write_str(text);
    }
}

/// Classification of one marker.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OrphanStatus {
    /// 0-100; 0 means the classification itself failed.
    pub confidence: u8,
    /// Whether the marker has lost its code.
    pub is_orphaned: bool,
    /// Why.
    pub reason: OrphanReason,
    /// Where the code might be now.
    pub suggested_location: Option<SuggestedLocation>,
}

impl OrphanStatus {
    /// Anchored with full confidence.
    const fn anchored() -> Self {
        return Self {
            confidence: 100,
            is_orphaned: false,
            reason: OrphanReason::NotOrphaned,
            suggested_location: None,
        };
    }

    /// One-line human description.
    pub fn description(&self) -> String {
        return match self.reason {
            OrphanReason::ContentChanged => "Code at this line has changed significantly".to_string(),
            OrphanReason::NotOrphaned => "Annotation is correctly anchored".to_string(),
            OrphanReason::SymbolDeleted => "Symbol not found in file (likely deleted)".to_string(),
            OrphanReason::SymbolMoved => match &self.suggested_location {
                Some(location) => format!("Symbol moved to line {}", location.line),
                None => "Symbol moved to an unknown location".to_string(),
            },
        };
    }

    /// Classification could not be completed; treat as anchored.
    const fn inconclusive() -> Self {
        return Self {
            confidence: 0,
            is_orphaned: false,
            reason: OrphanReason::NotOrphaned,
            suggested_location: None,
        };
    }

    /// Ordered list of things the user can do about this marker.
    pub fn recovery_suggestions(&self) -> Vec<String> {
        let mut suggestions = Vec::new();
        match self.reason {
            OrphanReason::ContentChanged => {
                suggestions.push("Re-anchor to the current line if the annotation still applies".to_string());
                suggestions.push("Update the annotation to match the new code".to_string());
                suggestions.push("Delete the annotation if it is no longer relevant".to_string());
            },
            OrphanReason::NotOrphaned => {},
            OrphanReason::SymbolDeleted => {
                suggestions.push("Search the file for similar code".to_string());
                suggestions.push("Delete the annotation (code appears to be gone)".to_string());
                suggestions.push("Move to a different file if the code was refactored".to_string());
            },
            OrphanReason::SymbolMoved => {
                if let Some(location) = &self.suggested_location {
                    suggestions.push(format!("Re-anchor to line {} (symbol found there)", location.line));
                }
                suggestions.push("Search for the symbol manually and re-anchor".to_string());
                suggestions.push("Delete the annotation if the code is gone".to_string());
            },
        }
        return suggestions;
    }
}

/// A candidate location for an orphaned marker.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SuggestedLocation {
    /// Candidate line.
    pub line: u32,
    /// Dot-joined symbol path that was found there.
    pub symbol: String,
}

/// Classify `marker` against the document's current contents.
///
/// `tree` is the current outline; a missing or empty outline skips the
/// symbol step. Classification errors are logged and reported as not
/// orphaned with confidence 0, so a failure never produces a false alarm.
pub fn detect_orphan(marker: &Marker, document: &dyn DocumentAccessor, tree: Option<&SymbolTree>) -> OrphanStatus {
    return match classify(marker, document, tree) {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(marker = %marker.id, error = %e, "orphan classification failed");
            OrphanStatus::inconclusive()
        },
    };
}

/// Symbol step, then the content step.
fn classify(marker: &Marker, document: &dyn DocumentAccessor, tree: Option<&SymbolTree>) -> Result<OrphanStatus, Error> {
    if let Some(outline) = tree.filter(|t| return !t.is_empty())
        && let Some(anchor) = marker.anchor()
        && resolve_anchor(outline, anchor).confidence == Confidence::NotFound
    {
        tracing::debug!(marker = %marker.id, path = %anchor.display_path(), "anchor failed, searching by name");
        let Some(found) = locate_relaxed(outline, anchor).and_then(|r| return r.line) else {
            return Ok(OrphanStatus {
                confidence: 95,
                is_orphaned: true,
                reason: OrphanReason::SymbolDeleted,
                suggested_location: None,
            });
        };
        return Ok(OrphanStatus {
            confidence: 90,
            is_orphaned: true,
            reason: OrphanReason::SymbolMoved,
            suggested_location: Some(SuggestedLocation { line: found, symbol: anchor.display_path() }),
        });
    }

    let line_count = document.line_count();
    let current = document
        .line_text(marker.start_line)
        .ok_or(Error::LineOutOfBounds { line: marker.start_line, line_count })?;
    if hash_line(current) == marker.line_hash {
        return Ok(OrphanStatus::anchored());
    }

    let stored = Fingerprint {
        line_text: marker.line_text.clone(),
        next_line_text: marker.next_line_text.clone(),
        prev_line_text: marker.prev_line_text.clone(),
    };
    if window_agreement(document, marker.start_line, &stored, &marker.line_hash) >= 2 {
        tracing::debug!(marker = %marker.id, "surrounding lines still match, not orphaned");
        return Ok(OrphanStatus::anchored());
    }
    return Ok(OrphanStatus {
        confidence: 80,
        is_orphaned: true,
        reason: OrphanReason::ContentChanged,
        suggested_location: None,
    });
}

/// Serialize through `Display`.
fn serialize_display<S: serde::Serializer>(value: &MarkerId, serializer: S) -> Result<S::Ok, S::Error> {
    return serializer.collect_str(value);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::SystemTime;

    use super::{OrphanReason, detect_orphan};
    use crate::anchor::create_anchor;
    use crate::document::{DocumentAccessor as _, TextDocument};
    use crate::fingerprint::{Fingerprint, hash_line};
    use crate::types::{
        AnnotationId, Anchoring, FallbackReason, Marker, MarkerId, MarkerState, SymbolKind, SymbolNode, SymbolTree,
    };

    fn marker(doc: &TextDocument, line: u32, anchoring: Anchoring) -> Marker {
        let window = Fingerprint::capture(doc, line).unwrap();
        let text = doc.text();
        let raw = text.split('\n').nth((line - 1) as usize).unwrap();
        return Marker {
            annotation_ids: BTreeSet::from([AnnotationId::from("note")]),
            anchoring,
            end_line: None,
            id: MarkerId(7),
            last_verified: SystemTime::UNIX_EPOCH,
            line_hash: hash_line(raw),
            line_text: window.line_text,
            next_line_text: window.next_line_text,
            prev_line_text: window.prev_line_text,
            start_line: line,
            state: MarkerState::Unverified,
        };
    }

    fn outline() -> SymbolTree {
        return SymbolTree {
            symbols: vec![SymbolNode::new("Config", SymbolKind::Class, 1, 4)
                .with_children(vec![SymbolNode::new("validate", SymbolKind::Method, 2, 3)])],
        };
    }

    const SOURCE: &str = "class Config {\n  validate() {\n  }\n}";

    #[test]
    fn unchanged_marker_is_not_orphaned() {
        let doc = TextDocument::new(SOURCE);
        let outline = outline();
        let anchor = create_anchor(&outline, 2).unwrap();
        let status = detect_orphan(&marker(&doc, 2, Anchoring::Semantic(anchor)), &doc, Some(&outline));
        assert!(!status.is_orphaned);
        assert_eq!((status.reason, status.confidence), (OrphanReason::NotOrphaned, 100));
        assert!(status.recovery_suggestions().is_empty());
    }

    #[test]
    fn symbol_under_renamed_container_is_moved() {
        let doc = TextDocument::new(SOURCE);
        let anchor = create_anchor(&outline(), 2).unwrap();
        let m = marker(&doc, 2, Anchoring::Semantic(anchor));
        let renamed = SymbolTree {
            symbols: vec![SymbolNode::new("Settings", SymbolKind::Class, 5, 9)
                .with_children(vec![SymbolNode::new("validate", SymbolKind::Method, 6, 8)])],
        };
        let status = detect_orphan(&m, &doc, Some(&renamed));
        assert!(status.is_orphaned);
        assert_eq!((status.reason, status.confidence), (OrphanReason::SymbolMoved, 90));
        let location = status.suggested_location.clone().unwrap();
        assert_eq!(location.line, 6);
        assert_eq!(location.symbol, "Config.validate");
        assert_eq!(status.description(), "Symbol moved to line 6");
        assert!(status.recovery_suggestions()[0].contains("line 6"));
    }

    #[test]
    fn vanished_symbol_is_deleted() {
        let doc = TextDocument::new(SOURCE);
        let anchor = create_anchor(&outline(), 2).unwrap();
        let m = marker(&doc, 2, Anchoring::Semantic(anchor));
        let other = SymbolTree { symbols: vec![SymbolNode::new("Other", SymbolKind::Class, 1, 4)] };
        let status = detect_orphan(&m, &doc, Some(&other));
        assert_eq!((status.reason, status.confidence), (OrphanReason::SymbolDeleted, 95));
        assert!(status.suggested_location.is_none());
    }

    #[test]
    fn empty_outline_skips_the_symbol_step() {
        let doc = TextDocument::new(SOURCE);
        let anchor = create_anchor(&outline(), 2).unwrap();
        let m = marker(&doc, 2, Anchoring::Semantic(anchor));
        let status = detect_orphan(&m, &doc, Some(&SymbolTree::default()));
        assert_eq!(status.reason, OrphanReason::NotOrphaned);
    }

    #[test]
    fn rewritten_line_with_new_neighbors_is_content_changed() {
        let doc = TextDocument::new("a\nb\nc");
        let m = marker(&doc, 2, Anchoring::Fingerprint(FallbackReason::NoProvider));
        let edited = TextDocument::new("x\ny\nz");
        let status = detect_orphan(&m, &edited, None);
        assert_eq!((status.reason, status.confidence), (OrphanReason::ContentChanged, 80));
    }

    #[test]
    fn rewritten_line_with_same_neighbors_is_not_orphaned() {
        let doc = TextDocument::new("a\nb\nc");
        let m = marker(&doc, 2, Anchoring::Fingerprint(FallbackReason::NoProvider));
        let edited = TextDocument::new("a\nchanged\nc");
        let status = detect_orphan(&m, &edited, None);
        assert!(!status.is_orphaned);
        assert_eq!(status.confidence, 100);
    }

    #[test]
    fn line_past_the_end_is_inconclusive() {
        let doc = TextDocument::new("a\nb\nc");
        let m = marker(&doc, 3, Anchoring::Fingerprint(FallbackReason::NoProvider));
        let status = detect_orphan(&m, &TextDocument::new("a"), None);
        assert!(!status.is_orphaned);
        assert_eq!(status.confidence, 0);
    }
}
