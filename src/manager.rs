//! Marker lifecycle: document sessions, marker creation, synchronous position
//! shifting on edits, copy/paste duplication, debounced verification, and
//! orphan queries.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::{Instant, SystemTime};

use crate::anchor::create_anchor;
use crate::cache::{CacheConfig, CacheStats, SymbolTreeCache};
use crate::config::{Config, TrackingConfig};
use crate::document::{DocumentAccessor, TextDocument, TextEdit};
use crate::error::Error;
use crate::fingerprint::{Fingerprint, hash_line};
use crate::orphan::{self, OrphanStatus, OrphanedAnnotation};
use crate::provider::SymbolProvider;
use crate::schedule::{PendingVerification, VerificationSchedule};
use crate::types::{
    Anchoring, AnnotationId, DocumentId, EditEvent, FallbackReason, Marker, MarkerId, MarkerState,
    ReconciliationOutcome, SymbolTree,
};
use crate::verify::reconcile_marker;

/// One open document and everything tracked against it.
struct DocumentSession {
    /// Current contents.
    document: TextDocument,
    /// Host-supplied name, usually the file path.
    label: String,
    /// Markers in creation order.
    markers: Vec<Marker>,
    /// Outline source; `None` means fingerprint tracking only.
    provider: Option<Box<dyn SymbolProvider>>,
    /// Pending verification pass.
    schedule: VerificationSchedule,
}

/// Owns document sessions and their markers. Single-threaded; the host
/// supplies the clock to edit and polling calls.
pub struct MarkerManager {
    /// Outline cache shared by all sessions.
    cache: SymbolTreeCache,
    /// Tracking thresholds and delays.
    config: TrackingConfig,
    /// Next session id.
    next_document: u64,
    /// Next marker id.
    next_marker: u64,
    /// Open sessions, ordered by id.
    sessions: BTreeMap<DocumentId, DocumentSession>,
}

impl Default for MarkerManager {
    fn default() -> Self {
        return Self::new(Config::default());
    }
}

impl std::fmt::Debug for MarkerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("MarkerManager")
            .field("config", &self.config)
            .field("documents", &self.sessions.len())
            .finish_non_exhaustive();
    }
}

impl MarkerManager {
    /// Allocate a fresh marker id.
    fn allocate_marker_id(&mut self) -> MarkerId {
        let id = MarkerId(self.next_marker);
        self.next_marker = self.next_marker.saturating_add(1);
        return id;
    }

    /// Apply one edit to a document: mutate it, shift markers, duplicate
    /// pasted markers, then reschedule verification.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument` for a closed session, or the
    /// document's error if the edit lies outside it.
    pub fn apply_edit(&mut self, document: DocumentId, edit: &TextEdit, now: Instant) -> Result<EditEvent, Error> {
        let mut events = self.apply_edits(document, std::slice::from_ref(edit), now)?;
        return events.pop().ok_or(Error::UnknownDocument { id: document });
    }

    /// Apply edits in order, as a single change. Verification is rescheduled
    /// once, with the priority delay if any edit touched a marker line.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument` for a closed session, or the
    /// document's error for the first edit that lies outside it. Edits
    /// before the failing one stay applied and are scheduled for
    /// verification.
    pub fn apply_edits(&mut self, document: DocumentId, edits: &[TextEdit], now: Instant) -> Result<Vec<EditEvent>, Error> {
        let mut events = Vec::with_capacity(edits.len());
        let mut priority = false;
        let mut failure = None;
        for edit in edits {
            let session = self.sessions.get_mut(&document).ok_or(Error::UnknownDocument { id: document })?;
            let event = match session.document.apply(edit) {
                Ok(event) => event,
                Err(e) => {
                    failure = Some(e);
                    break;
                },
            };
            priority |= shift_markers(&mut session.markers, &event);
            tracing::debug!(
                %document,
                start = event.start_line,
                end = event.end_line,
                delta = event.line_delta(),
                "applied edit"
            );

            if event.line_delta() > 0 && event.replacement_text.trim().chars().count() > self.config.paste_min_chars {
                self.duplicate_pasted_markers(document, &event, now);
            }
            events.push(event);
        }

        if !events.is_empty() {
            let session = self.sessions.get_mut(&document).ok_or(Error::UnknownDocument { id: document })?;
            let delay = if priority { self.config.priority_delay } else { self.config.verify_delay };
            let pass = session.schedule.schedule(now, delay, priority);
            tracing::debug!(%document, priority, generation = pass.generation, ?delay, "scheduled verification");
        }
        return match failure {
            Some(e) => Err(e),
            None => Ok(events),
        };
    }

    /// Aggregate cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        return self.cache.stats();
    }

    /// End a session. Returns its markers; the cache entry and any pending
    /// verification are dropped.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument` for a closed session.
    pub fn close_document(&mut self, document: DocumentId) -> Result<Vec<Marker>, Error> {
        let session = self.sessions.remove(&document).ok_or(Error::UnknownDocument { id: document })?;
        self.cache.invalidate(document);
        tracing::debug!(%document, markers = session.markers.len(), "closed document");
        return Ok(session.markers);
    }

    /// Create a marker at `line` (or the range `line..=end_line`) bound to
    /// `annotation_ids`. A marker already at exactly that line and range
    /// absorbs the ids instead.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument`, `Error::LineOutOfBounds`,
    /// `Error::InvalidRange` if `end_line` precedes `line` or passes the
    /// document end, or `Error::EmptyAnnotations`.
    pub fn create_marker(
        &mut self,
        document: DocumentId,
        line: u32,
        annotation_ids: &[AnnotationId],
        end_line: Option<u32>,
    ) -> Result<Marker, Error> {
        let session = self.sessions.get(&document).ok_or(Error::UnknownDocument { id: document })?;
        let end_line = validate_span(&session.document, line, end_line)?;
        if annotation_ids.is_empty() {
            return Err(Error::EmptyAnnotations { line });
        }

        let session = self.sessions.get_mut(&document).ok_or(Error::UnknownDocument { id: document })?;
        if let Some(existing) = session
            .markers
            .iter_mut()
            .find(|m| return m.start_line == line && m.end_line == end_line)
        {
            existing.annotation_ids.extend(annotation_ids.iter().cloned());
            tracing::debug!(%document, marker = %existing.id, line, "added annotations to existing marker");
            return Ok(existing.clone());
        }

        let anchoring = self.anchoring_at(document, line, Instant::now())?;
        let id = self.allocate_marker_id();
        let session = self.sessions.get(&document).ok_or(Error::UnknownDocument { id: document })?;
        let mut marker = fresh_marker(&session.document, id, line, anchoring)?;
        marker.annotation_ids = annotation_ids.iter().cloned().collect();
        marker.end_line = end_line;

        tracing::debug!(
            %document,
            marker = %marker.id,
            line,
            anchor = ?marker.anchor().map(crate::types::Anchor::display_path),
            "created marker"
        );
        let session = self.sessions.get_mut(&document).ok_or(Error::UnknownDocument { id: document })?;
        session.markers.push(marker.clone());
        return Ok(marker);
    }

    /// Look up anchoring for a fresh marker at `line`.
    fn anchoring_at(&mut self, document: DocumentId, line: u32, now: Instant) -> Result<Anchoring, Error> {
        let session = self.sessions.get(&document).ok_or(Error::UnknownDocument { id: document })?;
        let Some(tree) = outline_for(&mut self.cache, document, session, now) else {
            return Ok(Anchoring::Fingerprint(FallbackReason::NoProvider));
        };
        if tree.is_empty() {
            return Ok(Anchoring::Fingerprint(FallbackReason::NoSymbols));
        }
        return Ok(create_anchor(&tree, line)
            .map_or(Anchoring::Fingerprint(FallbackReason::NoEnclosingSymbol), Anchoring::Semantic));
    }

    /// Classify the marker carrying `annotation`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument`, or `Error::UnknownAnnotation` if no
    /// marker in the document carries the annotation.
    pub fn detect_orphan(&mut self, document: DocumentId, annotation: &AnnotationId) -> Result<OrphanStatus, Error> {
        let session = self.sessions.get(&document).ok_or(Error::UnknownDocument { id: document })?;
        let marker = session
            .markers
            .iter()
            .find(|m| return m.has_annotation(annotation))
            .ok_or_else(|| return Error::UnknownAnnotation { id: annotation.clone() })?;
        let tree = outline_for(&mut self.cache, document, session, Instant::now());
        return Ok(orphan::detect_orphan(marker, &session.document, tree.as_deref()));
    }

    /// Current contents of a document.
    pub fn document(&self, document: DocumentId) -> Option<&TextDocument> {
        return self.sessions.get(&document).map(|s| return &s.document);
    }

    /// Open sessions in id order.
    pub fn documents(&self) -> Vec<DocumentId> {
        return self.sessions.keys().copied().collect();
    }

    /// Create markers for pasted lines that repeat a tracked line elsewhere.
    /// The copy shares the original's annotation ids; the original is left
    /// alone. Each copy is anchored at its own line.
    fn duplicate_pasted_markers(&mut self, document: DocumentId, event: &EditEvent, now: Instant) {
        let Some(session) = self.sessions.get(&document) else {
            return;
        };
        let existing_lines: BTreeSet<u32> = session.markers.iter().map(|m| return m.start_line).collect();

        let mut copies: BTreeMap<u32, BTreeSet<AnnotationId>> = BTreeMap::new();
        for (segment, line) in event.replacement_text.split('\n').zip(event.start_line..) {
            if segment.trim().is_empty() || existing_lines.contains(&line) {
                continue;
            }
            let hash = hash_line(segment);
            for original in session.markers.iter().filter(|m| return m.line_hash == hash && m.start_line != line) {
                tracing::debug!(%document, marker = %original.id, from = original.start_line, to = line, "pasted line matches marker");
                copies.entry(line).or_default().extend(original.annotation_ids.iter().cloned());
            }
        }

        for (line, annotation_ids) in copies {
            let anchoring = match self.anchoring_at(document, line, now) {
                Ok(anchoring) => anchoring,
                Err(e) => {
                    tracing::debug!(%document, line, error = %e, "cannot anchor pasted marker");
                    continue;
                },
            };
            let id = self.allocate_marker_id();
            let Some(session) = self.sessions.get_mut(&document) else {
                return;
            };
            let Ok(mut marker) = fresh_marker(&session.document, id, line, anchoring) else {
                continue;
            };
            marker.annotation_ids = annotation_ids;
            tracing::info!(%document, marker = %marker.id, line, annotations = marker.annotation_ids.len(), "duplicated marker for pasted code");
            session.markers.push(marker);
        }
    }

    /// Classify every marker and list the orphaned annotations at or above
    /// `min_confidence`, one entry per annotation id.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument` for a closed session.
    pub fn find_orphans(&mut self, document: DocumentId, min_confidence: u8) -> Result<Vec<OrphanedAnnotation>, Error> {
        let session = self.sessions.get(&document).ok_or(Error::UnknownDocument { id: document })?;
        let tree = outline_for(&mut self.cache, document, session, Instant::now());
        let mut orphans = Vec::new();
        for marker in &session.markers {
            let status = orphan::detect_orphan(marker, &session.document, tree.as_deref());
            if !status.is_orphaned || status.confidence < min_confidence {
                continue;
            }
            for annotation_id in &marker.annotation_ids {
                orphans.push(OrphanedAnnotation {
                    annotation_id: annotation_id.clone(),
                    line: marker.start_line,
                    marker_id: marker.id,
                    status: status.clone(),
                });
            }
        }
        tracing::debug!(%document, orphans = orphans.len(), "orphan scan finished");
        return Ok(orphans);
    }

    /// Host-supplied label of a document.
    pub fn label(&self, document: DocumentId) -> Option<&str> {
        return self.sessions.get(&document).map(|s| return s.label.as_str());
    }

    /// The marker with `id`.
    pub fn marker(&self, document: DocumentId, id: MarkerId) -> Option<&Marker> {
        return self.sessions.get(&document)?.markers.iter().find(|m| return m.id == id);
    }

    /// The marker on `line`: one starting there first, else a range marker
    /// covering it.
    pub fn marker_at(&self, document: DocumentId, line: u32) -> Option<&Marker> {
        let markers = &self.sessions.get(&document)?.markers;
        return markers
            .iter()
            .find(|m| return m.start_line == line)
            .or_else(|| return markers.iter().find(|m| return m.covers(line)));
    }

    /// All markers of a document, in creation order.
    pub fn markers(&self, document: DocumentId) -> &[Marker] {
        return self.sessions.get(&document).map(|s| return s.markers.as_slice()).unwrap_or_default();
    }

    /// Manager with the given configuration.
    pub fn new(config: Config) -> Self {
        return Self {
            cache: SymbolTreeCache::new(config.cache),
            config: config.tracking,
            next_document: 1,
            next_marker: 1,
            sessions: BTreeMap::new(),
        };
    }

    /// Earliest pending verification deadline across all documents.
    pub fn next_deadline(&self) -> Option<Instant> {
        return self
            .sessions
            .values()
            .filter_map(|s| return s.schedule.pending().map(|p| return p.due))
            .min();
    }

    /// Start tracking a document. `provider` supplies outlines for semantic
    /// anchoring; without one, markers track by fingerprint only.
    pub fn open_document(
        &mut self,
        label: impl Into<String>,
        document: TextDocument,
        provider: Option<Box<dyn SymbolProvider>>,
    ) -> DocumentId {
        let id = DocumentId(self.next_document);
        self.next_document = self.next_document.saturating_add(1);
        let label = label.into();
        tracing::debug!(document = %id, %label, semantic = provider.is_some(), "opened document");
        self.sessions.insert(id, DocumentSession {
            document,
            label,
            markers: Vec::new(),
            provider,
            schedule: VerificationSchedule::new(),
        });
        return id;
    }

    /// Current outline of a document, or `None` without a provider.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument` for a closed session.
    pub fn outline(&mut self, document: DocumentId) -> Result<Option<Rc<SymbolTree>>, Error> {
        let session = self.sessions.get(&document).ok_or(Error::UnknownDocument { id: document })?;
        return Ok(outline_for(&mut self.cache, document, session, Instant::now()));
    }

    /// The pending verification pass of a document.
    pub fn pending(&self, document: DocumentId) -> Option<&PendingVerification> {
        return self.sessions.get(&document)?.schedule.pending();
    }

    /// Move a marker to `line` (or `line..=end_line`) on the user's word,
    /// re-anchoring and re-fingerprinting it there.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument`, `Error::UnknownMarker`,
    /// `Error::LineOutOfBounds`, or `Error::InvalidRange`.
    pub fn reanchor_marker(
        &mut self,
        document: DocumentId,
        id: MarkerId,
        line: u32,
        end_line: Option<u32>,
    ) -> Result<Marker, Error> {
        let session = self.sessions.get(&document).ok_or(Error::UnknownDocument { id: document })?;
        if !session.markers.iter().any(|m| return m.id == id) {
            return Err(Error::UnknownMarker { id });
        }
        let end_line = validate_span(&session.document, line, end_line)?;

        let anchoring = self.anchoring_at(document, line, Instant::now())?;
        let session = self.sessions.get_mut(&document).ok_or(Error::UnknownDocument { id: document })?;
        let mut relocated = fresh_marker(&session.document, id, line, anchoring)?;
        relocated.end_line = end_line;
        relocated.state = MarkerState::Valid;
        relocated.last_verified = SystemTime::now();

        let marker = session.markers.iter_mut().find(|m| return m.id == id).ok_or(Error::UnknownMarker { id })?;
        let old_line = marker.start_line;
        relocated.annotation_ids = std::mem::take(&mut marker.annotation_ids);
        *marker = relocated;
        tracing::debug!(%document, marker = %id, from = old_line, to = line, "re-anchored marker");
        return Ok(marker.clone());
    }

    /// Remove `annotation` from every marker carrying it, deleting markers
    /// left without annotations. Returns the ids of deleted markers.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument`, or `Error::UnknownAnnotation` if no
    /// marker carries it.
    pub fn remove_annotation(&mut self, document: DocumentId, annotation: &AnnotationId) -> Result<Vec<MarkerId>, Error> {
        let session = self.sessions.get_mut(&document).ok_or(Error::UnknownDocument { id: document })?;
        let mut found = false;
        for marker in &mut session.markers {
            found |= marker.annotation_ids.remove(annotation);
        }
        if !found {
            return Err(Error::UnknownAnnotation { id: annotation.clone() });
        }
        let deleted: Vec<MarkerId> = session
            .markers
            .iter()
            .filter(|m| return m.annotation_ids.is_empty())
            .map(|m| return m.id)
            .collect();
        session.markers.retain(|m| return !m.annotation_ids.is_empty());
        tracing::debug!(%document, %annotation, deleted = deleted.len(), "removed annotation");
        return Ok(deleted);
    }

    /// Delete a marker outright.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument` or `Error::UnknownMarker`.
    pub fn remove_marker(&mut self, document: DocumentId, id: MarkerId) -> Result<Marker, Error> {
        let session = self.sessions.get_mut(&document).ok_or(Error::UnknownDocument { id: document })?;
        let index = session.markers.iter().position(|m| return m.id == id).ok_or(Error::UnknownMarker { id })?;
        return Ok(session.markers.remove(index));
    }

    /// Never allocate a marker id below `next`. Used when ids are also held
    /// by markers this manager has not loaded.
    pub fn reserve_marker_ids(&mut self, next: u64) {
        self.next_marker = self.next_marker.max(next);
    }

    /// Re-attach a previously persisted marker. Returns `false`, leaving the
    /// session unchanged, when a marker with the same id is already tracked.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument`, or `Error::EmptyAnnotations` for a
    /// marker without annotations.
    pub fn restore_marker(&mut self, document: DocumentId, marker: Marker) -> Result<bool, Error> {
        let session = self.sessions.get_mut(&document).ok_or(Error::UnknownDocument { id: document })?;
        if marker.annotation_ids.is_empty() {
            return Err(Error::EmptyAnnotations { line: marker.start_line });
        }
        if session.markers.iter().any(|m| return m.id == marker.id) {
            tracing::warn!(%document, marker = %marker.id, line = marker.start_line, "skipping duplicate marker");
            return Ok(false);
        }
        self.next_marker = self.next_marker.max(marker.id.0.saturating_add(1));
        session.markers.push(marker);
        return Ok(true);
    }

    /// Run every verification pass due at `now`, in document order.
    pub fn run_due(&mut self, now: Instant) -> Vec<(DocumentId, Vec<ReconciliationOutcome>)> {
        let mut results = Vec::new();
        for (&document, session) in &mut self.sessions {
            let Some(pass) = session.schedule.take_due(now) else {
                continue;
            };
            tracing::debug!(%document, generation = pass.generation, priority = pass.priority, "running verification");
            results.push((document, verify_session(&mut self.cache, document, session, self.config.search_radius, now)));
        }
        return results;
    }

    /// Verify one marker now.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument` or `Error::UnknownMarker`.
    pub fn verify_marker(&mut self, document: DocumentId, id: MarkerId) -> Result<ReconciliationOutcome, Error> {
        let session = self.sessions.get_mut(&document).ok_or(Error::UnknownDocument { id: document })?;
        let tree = outline_for(&mut self.cache, document, session, Instant::now());
        let marker = session.markers.iter_mut().find(|m| return m.id == id).ok_or(Error::UnknownMarker { id })?;
        return Ok(reconcile_marker(marker, &session.document, tree.as_deref(), self.config.search_radius));
    }

    /// Verify every marker of a document now, cancelling its pending pass.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDocument` for a closed session.
    pub fn verify_all(&mut self, document: DocumentId) -> Result<Vec<ReconciliationOutcome>, Error> {
        let session = self.sessions.get_mut(&document).ok_or(Error::UnknownDocument { id: document })?;
        session.schedule.cancel();
        return Ok(verify_session(&mut self.cache, document, session, self.config.search_radius, Instant::now()));
    }

    /// Manager with default thresholds and the given cache sizing.
    pub fn with_cache(tracking: TrackingConfig, cache: CacheConfig) -> Self {
        return Self::new(Config { cache, tracking });
    }
}

/// A new unverified marker at `line` with a fingerprint captured from the
/// document and no annotations yet.
fn fresh_marker(document: &TextDocument, id: MarkerId, line: u32, anchoring: Anchoring) -> Result<Marker, Error> {
    let line_count = document.line_count();
    let text = document.line_text(line).ok_or(Error::LineOutOfBounds { line, line_count })?;
    let window = Fingerprint::capture(document, line).ok_or(Error::LineOutOfBounds { line, line_count })?;
    return Ok(Marker {
        annotation_ids: BTreeSet::new(),
        anchoring,
        end_line: None,
        id,
        last_verified: SystemTime::now(),
        line_hash: hash_line(text),
        line_text: window.line_text,
        next_line_text: window.next_line_text,
        prev_line_text: window.prev_line_text,
        start_line: line,
        state: MarkerState::Unverified,
    });
}

/// Outline of a session through the cache, or `None` without a provider.
fn outline_for(
    cache: &mut SymbolTreeCache,
    id: DocumentId,
    session: &DocumentSession,
    now: Instant,
) -> Option<Rc<SymbolTree>> {
    let provider = session.provider.as_deref()?;
    let document = &session.document;
    return Some(cache.get_symbol_tree(id, document.version(), document.line_count(), now, || {
        return provider.document_symbols(document);
    }));
}

/// Shift markers for one edit. Markers strictly after the edited lines move
/// by the line delta; range markers enclosing the edit stretch; a range end
/// inside the edited lines is pulled back to the last replacement line;
/// markers starting inside the edited lines stay put. Returns whether any marker
/// overlaps the edited lines and so needs prompt verification.
fn shift_markers(markers: &mut [Marker], event: &EditEvent) -> bool {
    let delta = event.line_delta();
    let mut touched = false;
    for marker in markers {
        if marker.start_line > event.end_line {
            marker.start_line = shift(marker.start_line, delta);
            marker.end_line = marker.end_line.map(|end| return shift(end, delta));
            continue;
        }

        let overlaps = match marker.end_line {
            None => marker.start_line >= event.start_line,
            Some(end) => end >= event.start_line,
        };
        touched |= overlaps;
        let Some(end) = marker.end_line else {
            continue;
        };
        let moved_end = if end > event.end_line {
            shift(end, delta)
        } else if end >= event.start_line {
            end.min(event.start_line.saturating_add(event.lines_added()).saturating_sub(1))
        } else {
            end
        };
        marker.end_line = (moved_end > marker.start_line).then_some(moved_end);
    }
    return touched;
}

/// `line + delta`, kept at or above line 1.
fn shift(line: u32, delta: i64) -> u32 {
    let moved = i64::from(line).saturating_add(delta).max(1);
    return u32::try_from(moved).unwrap_or(u32::MAX);
}

/// Check a requested marker span and normalize `end_line == line` to a
/// single-line marker.
fn validate_span(document: &TextDocument, line: u32, end_line: Option<u32>) -> Result<Option<u32>, Error> {
    let line_count = document.line_count();
    if line < 1 || line > line_count {
        return Err(Error::LineOutOfBounds { line, line_count });
    }
    return match end_line {
        None => Ok(None),
        Some(end) if end == line => Ok(None),
        Some(end) if end < line || end > line_count => Err(Error::InvalidRange {
            end_line: end,
            line_count,
            start_line: line,
        }),
        Some(end) => Ok(Some(end)),
    };
}

/// Reconcile every marker of a session against its current contents.
fn verify_session(
    cache: &mut SymbolTreeCache,
    id: DocumentId,
    session: &mut DocumentSession,
    radius: u32,
    now: Instant,
) -> Vec<ReconciliationOutcome> {
    let tree = outline_for(cache, id, session, now);
    let document = &session.document;
    return session
        .markers
        .iter_mut()
        .map(|marker| return reconcile_marker(marker, document, tree.as_deref(), radius))
        .collect();
}
