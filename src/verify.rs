//! Full marker verification: semantic resolution first, content fingerprint
//! second. Produces a [`ReconciliationOutcome`] and applies any automatic
//! fix to the marker in place.

use std::time::SystemTime;

use crate::anchor::resolve_anchor;
use crate::document::DocumentAccessor;
use crate::fingerprint::{Fingerprint, FingerprintMatch, find_line_by_fingerprint, hash_line};
use crate::types::{Confidence, Marker, ReconciliationOutcome, Reason, Status, SymbolTree};

/// Verify `marker` against the document's current contents, mutate it to
/// reflect the verdict, and return the outcome.
///
/// `tree` is the document's current outline, or `None` when no provider is
/// attached. `radius` bounds the fingerprint search.
pub fn reconcile_marker(
    marker: &mut Marker,
    document: &dyn DocumentAccessor,
    tree: Option<&SymbolTree>,
    radius: u32,
) -> ReconciliationOutcome {
    let outcome = verify_marker(marker, document, tree, radius);
    marker.state = outcome.status.into();
    if matches!(outcome.status, Status::Valid | Status::AutoFixed) {
        marker.last_verified = SystemTime::now();
    }
    tracing::debug!(
        marker = %marker.id,
        line = marker.start_line,
        status = %outcome.status,
        reason = %outcome.reason,
        "verified marker"
    );
    return outcome;
}

/// Compute the verdict for `marker` and apply automatic fixes (line moves,
/// fingerprint refresh). Does not touch `state` or `last_verified`.
pub fn verify_marker(
    marker: &mut Marker,
    document: &dyn DocumentAccessor,
    tree: Option<&SymbolTree>,
    radius: u32,
) -> ReconciliationOutcome {
    clamp_range_end(marker, document);
    if let Some(outline) = tree
        && let Some(outcome) = verify_semantic(marker, document, outline)
    {
        return outcome;
    }
    return verify_fingerprint(marker, document, radius);
}

/// Pull a range end back inside the document, dropping it when the range
/// collapses to one line.
fn clamp_range_end(marker: &mut Marker, document: &dyn DocumentAccessor) {
    let start = marker.start_line;
    let last = document.line_count();
    marker.end_line = marker.end_line.map(|end| return end.min(last)).filter(|end| return *end > start);
}

/// Semantic step. Returns `None` when the anchor cannot decide and the
/// fingerprint step should run.
fn verify_semantic(
    marker: &mut Marker,
    document: &dyn DocumentAccessor,
    tree: &SymbolTree,
) -> Option<ReconciliationOutcome> {
    let anchor = marker.anchor()?;
    let resolution = resolve_anchor(tree, anchor);
    let line = resolution.line?;
    let current = document.line_text(line)?;
    let id = marker.id;

    return match resolution.confidence {
        Confidence::Exact if line == marker.start_line => {
            if hash_line(current) == marker.line_hash {
                return Some(ReconciliationOutcome::plain(id, Status::Valid, Reason::AstExactMatch));
            }
            refresh_fingerprint(marker, document);
            Some(ReconciliationOutcome::plain(id, Status::AutoFixed, Reason::AstContentUpdated))
        },
        Confidence::Exact => {
            let old = marker.start_line;
            move_marker(marker, document, line);
            Some(ReconciliationOutcome::moved(id, Reason::AstSymbolMoved, old, line))
        },
        Confidence::Ambiguous => Some(ReconciliationOutcome::review(id, Reason::AstMultipleMatches, line)),
        Confidence::Moved => Some(ReconciliationOutcome::review(id, Reason::AstAmbiguousMove, line)),
        Confidence::NotFound => None,
    };
}

/// Fingerprint step: hash, whitespace, then a windowed search.
fn verify_fingerprint(marker: &mut Marker, document: &dyn DocumentAccessor, radius: u32) -> ReconciliationOutcome {
    let id = marker.id;
    let Some(current) = document.line_text(marker.start_line) else {
        return ReconciliationOutcome::plain(id, Status::NeedsManualFix, Reason::LineOutOfBounds);
    };

    if hash_line(current) == marker.line_hash {
        return ReconciliationOutcome::plain(id, Status::Valid, Reason::HashMatch);
    }
    if current.trim() == marker.line_text {
        refresh_fingerprint(marker, document);
        return ReconciliationOutcome::plain(id, Status::AutoFixed, Reason::WhitespaceChange);
    }

    let wanted = Fingerprint {
        line_text: marker.line_text.clone(),
        next_line_text: marker.next_line_text.clone(),
        prev_line_text: marker.prev_line_text.clone(),
    };
    return match find_line_by_fingerprint(document, &wanted, marker.start_line, radius) {
        Some(FingerprintMatch::Full(line)) => {
            let old = marker.start_line;
            move_marker(marker, document, line);
            ReconciliationOutcome::moved(id, Reason::FoundDrift, old, line)
        },
        Some(FingerprintMatch::Partial(line)) => ReconciliationOutcome::review(id, Reason::PartialMatch, line),
        None => ReconciliationOutcome::plain(id, Status::NeedsManualFix, Reason::NoMatchFound),
    };
}

/// Move the marker to `line`, shifting a range end by the same amount, and
/// refresh its fingerprint there.
pub fn move_marker(marker: &mut Marker, document: &dyn DocumentAccessor, line: u32) {
    let delta = i64::from(line).saturating_sub(i64::from(marker.start_line));
    marker.end_line = marker.end_line.and_then(|end| {
        let shifted = i64::from(end).saturating_add(delta).min(i64::from(document.line_count()));
        return u32::try_from(shifted).ok().filter(|e| return *e > line);
    });
    marker.start_line = line;
    refresh_fingerprint(marker, document);
}

/// Re-capture hash and window text at the marker's current line.
pub fn refresh_fingerprint(marker: &mut Marker, document: &dyn DocumentAccessor) {
    let Some(text) = document.line_text(marker.start_line) else {
        return;
    };
    marker.line_hash = hash_line(text);
    if let Some(window) = Fingerprint::capture(document, marker.start_line) {
        marker.line_text = window.line_text;
        marker.next_line_text = window.next_line_text;
        marker.prev_line_text = window.prev_line_text;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::SystemTime;

    use super::{reconcile_marker, verify_marker};
    use crate::anchor::create_anchor;
    use crate::document::{DocumentAccessor as _, TextDocument};
    use crate::fingerprint::{Fingerprint, hash_line};
    use crate::types::{
        AnnotationId, Anchoring, FallbackReason, Marker, MarkerId, MarkerState, Reason, Status, SymbolKind,
        SymbolNode, SymbolTree,
    };

    fn marker_at(doc: &TextDocument, line: u32, anchoring: Anchoring) -> Marker {
        let window = Fingerprint::capture(doc, line).unwrap();
        return Marker {
            annotation_ids: BTreeSet::from([AnnotationId::from("note")]),
            anchoring,
            end_line: None,
            id: MarkerId(1),
            last_verified: SystemTime::UNIX_EPOCH,
            line_hash: hash_line(doc.text().split('\n').nth((line - 1) as usize).unwrap()),
            line_text: window.line_text,
            next_line_text: window.next_line_text,
            prev_line_text: window.prev_line_text,
            start_line: line,
            state: MarkerState::Unverified,
        };
    }

    fn fingerprint_only(doc: &TextDocument, line: u32) -> Marker {
        return marker_at(doc, line, Anchoring::Fingerprint(FallbackReason::NoProvider));
    }

    #[test]
    fn unchanged_line_is_valid() {
        let doc = TextDocument::new("a\nb\nc");
        let mut marker = fingerprint_only(&doc, 2);
        let outcome = reconcile_marker(&mut marker, &doc, None, 10);
        assert_eq!((outcome.status, outcome.reason), (Status::Valid, Reason::HashMatch));
        assert_eq!(marker.state, MarkerState::Valid);
        assert!(marker.last_verified > SystemTime::UNIX_EPOCH);
    }

    #[test]
    fn reindented_line_is_auto_fixed_as_whitespace() {
        let doc = TextDocument::new("a\nfoo();\nc");
        let mut marker = fingerprint_only(&doc, 2);
        let edited = TextDocument::new("a\n    foo();\nc");
        let outcome = verify_marker(&mut marker, &edited, None, 10);
        assert_eq!((outcome.status, outcome.reason), (Status::AutoFixed, Reason::WhitespaceChange));
        assert_eq!(marker.line_hash, hash_line("    foo();"));
        assert_eq!(marker.start_line, 2);
    }

    #[test]
    fn drifted_line_is_found_nearby() {
        let doc = TextDocument::new("a\ntarget\nc");
        let mut marker = fingerprint_only(&doc, 2);
        let edited = TextDocument::new("x\ny\na\ntarget\nc");
        let outcome = verify_marker(&mut marker, &edited, None, 10);
        assert_eq!((outcome.status, outcome.reason), (Status::AutoFixed, Reason::FoundDrift));
        assert_eq!((outcome.old_line, outcome.new_line), (Some(2), Some(4)));
        assert_eq!(marker.start_line, 4);
    }

    #[test]
    fn line_with_changed_neighbors_needs_review() {
        let doc = TextDocument::new("a\ntarget\nc");
        let mut marker = fingerprint_only(&doc, 2);
        let edited = TextDocument::new("changed\nq\nr\ntarget\nz");
        let outcome = verify_marker(&mut marker, &edited, None, 10);
        assert_eq!((outcome.status, outcome.reason), (Status::NeedsReview, Reason::PartialMatch));
        assert_eq!(outcome.suggested_line, Some(4));
        assert_eq!(marker.start_line, 2, "review never moves the marker");
    }

    #[test]
    fn vanished_line_needs_manual_fix() {
        let doc = TextDocument::new("a\ntarget\nc");
        let mut marker = fingerprint_only(&doc, 2);
        let edited = TextDocument::new("a\nc");
        let outcome = reconcile_marker(&mut marker, &edited, None, 10);
        assert_eq!((outcome.status, outcome.reason), (Status::NeedsManualFix, Reason::NoMatchFound));
        assert_eq!(marker.state, MarkerState::NeedsManualFix);
        assert_eq!(marker.last_verified, SystemTime::UNIX_EPOCH);
    }

    #[test]
    fn line_past_the_end_is_out_of_bounds() {
        let doc = TextDocument::new("a\nb\nc");
        let mut marker = fingerprint_only(&doc, 3);
        let outcome = verify_marker(&mut marker, &TextDocument::new("a"), None, 10);
        assert_eq!((outcome.status, outcome.reason), (Status::NeedsManualFix, Reason::LineOutOfBounds));
    }

    fn outline_with_main_at(start: u32, end: u32) -> SymbolTree {
        return SymbolTree { symbols: vec![SymbolNode::new("main", SymbolKind::Function, start, end)] };
    }

    #[test]
    fn semantic_exact_match() {
        let doc = TextDocument::new("fn main() {\n    run();\n}");
        let outline = outline_with_main_at(1, 3);
        let anchor = create_anchor(&outline, 2).unwrap();
        let mut marker = marker_at(&doc, 2, Anchoring::Semantic(anchor));
        let outcome = verify_marker(&mut marker, &doc, Some(&outline), 10);
        assert_eq!((outcome.status, outcome.reason), (Status::Valid, Reason::AstExactMatch));
    }

    #[test]
    fn semantic_content_update_refreshes_hash() {
        let doc = TextDocument::new("fn main() {\n    run();\n}");
        let outline = outline_with_main_at(1, 3);
        let anchor = create_anchor(&outline, 2).unwrap();
        let mut marker = marker_at(&doc, 2, Anchoring::Semantic(anchor));
        let edited = TextDocument::new("fn main() {\n    run_fast();\n}");
        let outcome = verify_marker(&mut marker, &edited, Some(&outline), 10);
        assert_eq!((outcome.status, outcome.reason), (Status::AutoFixed, Reason::AstContentUpdated));
        assert_eq!(marker.line_text, "run_fast();");
    }

    #[test]
    fn semantic_move_shifts_range_end() {
        let doc = TextDocument::new("fn main() {\n    run();\n    stop();\n}");
        let outline = outline_with_main_at(1, 4);
        let anchor = create_anchor(&outline, 2).unwrap();
        let mut marker = marker_at(&doc, 2, Anchoring::Semantic(anchor));
        marker.end_line = Some(3);
        let edited = TextDocument::new("\n\nfn main() {\n    run();\n    stop();\n}");
        let outcome = verify_marker(&mut marker, &edited, Some(&outline_with_main_at(3, 6)), 10);
        assert_eq!((outcome.status, outcome.reason), (Status::AutoFixed, Reason::AstSymbolMoved));
        assert_eq!((marker.start_line, marker.end_line), (4, Some(5)));
    }

    #[test]
    fn semantic_ambiguity_needs_review() {
        let doc = TextDocument::new("fn main() {}\nfn main() {}");
        let outline = SymbolTree {
            symbols: vec![
                SymbolNode::new("main", SymbolKind::Function, 1, 1),
                SymbolNode::new("main", SymbolKind::Function, 2, 2),
            ],
        };
        let anchor = create_anchor(&outline, 2).unwrap();
        let mut marker = marker_at(&doc, 2, Anchoring::Semantic(anchor));
        let outcome = verify_marker(&mut marker, &doc, Some(&outline), 10);
        assert_eq!((outcome.status, outcome.reason), (Status::NeedsReview, Reason::AstMultipleMatches));
        assert_eq!(outcome.suggested_line, Some(1));
    }

    #[test]
    fn missing_symbol_falls_back_to_fingerprint() {
        let doc = TextDocument::new("fn main() {\n    run();\n}");
        let outline = outline_with_main_at(1, 3);
        let anchor = create_anchor(&outline, 2).unwrap();
        let mut marker = marker_at(&doc, 2, Anchoring::Semantic(anchor));
        let renamed = SymbolTree { symbols: vec![SymbolNode::new("start", SymbolKind::Function, 1, 3)] };
        let outcome = verify_marker(&mut marker, &doc, Some(&renamed), 10);
        assert_eq!((outcome.status, outcome.reason), (Status::Valid, Reason::HashMatch));
    }

    #[test]
    fn range_end_past_the_document_is_clamped() {
        let doc = TextDocument::new("a\nb\nc\nd\ne");
        let mut marker = fingerprint_only(&doc, 2);
        marker.end_line = Some(5);
        let shrunk = TextDocument::new("a\nb\nc");
        let outcome = reconcile_marker(&mut marker, &shrunk, None, 10);
        assert_eq!((outcome.status, outcome.reason), (Status::Valid, Reason::HashMatch));
        assert_eq!(marker.end_line, Some(3));

        let single = TextDocument::new("a\nb");
        reconcile_marker(&mut marker, &single, None, 10);
        assert_eq!(marker.end_line, None, "a range reduced to its start line is a single-line marker");
    }

    #[test]
    fn trailing_whitespace_alone_keeps_the_hash() {
        let doc = TextDocument::new("a\nfoo();\nc");
        let mut marker = fingerprint_only(&doc, 2);
        let edited = TextDocument::new("a\nfoo();   \t\nc");
        let outcome = reconcile_marker(&mut marker, &edited, None, 10);
        assert_eq!((outcome.status, outcome.reason), (Status::Valid, Reason::HashMatch));
        assert_eq!(marker.line_hash, hash_line("foo();"));
    }
}
