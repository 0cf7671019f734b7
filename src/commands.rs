//! CLI commands: mark, unmark, reanchor, check, orphans, outline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use driftmark::anchor::render_tree;
use driftmark::config::Config;
use driftmark::diagnostics::{self, MarkerReport, OrphanReport};
use driftmark::error::Error;
use driftmark::manager::MarkerManager;
use driftmark::outline::Outliner;
use driftmark::provider::SymbolProvider;
use driftmark::store::{MarkerStore, STORE_FILE};
use driftmark::types::{AnnotationId, DocumentId, MarkerId, ReconciliationOutcome, Status, SymbolTree};
use driftmark::TextDocument;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Pretty-printed JSON.
    Json,
    /// Markdown for terminals.
    Text,
}

/// Tracked files opened in one manager, backed by the marker store.
pub struct Workspace {
    /// Open sessions by file path, as written in the store.
    pub files: BTreeMap<PathBuf, DocumentId>,
    /// Engine instance.
    pub manager: MarkerManager,
    /// Store files that could not be read.
    pub missing: Vec<PathBuf>,
    /// Project root.
    pub root: PathBuf,
    /// Persisted markers.
    pub store: MarkerStore,
}

impl Workspace {
    /// Open the session for `file`, or reuse the existing one.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if the file cannot be read, or
    /// `Error::EmptyAnnotations` for a stored marker without annotations.
    pub fn load_file(&mut self, file: &Path) -> Result<DocumentId, Error> {
        if let Some(&id) = self.files.get(file) {
            return Ok(id);
        }
        let path = self.root.join(file);
        let text = std::fs::read_to_string(&path).map_err(|_| return Error::FileNotFound { path: path.clone() })?;

        let provider = match Outliner::for_path(file) {
            Ok(outliner) => Some(Box::new(outliner) as Box<dyn SymbolProvider>),
            Err(e) => {
                tracing::debug!(file = %file.display(), error = %e, "no outliner, tracking by fingerprint");
                None
            },
        };
        let id = self.manager.open_document(file.display().to_string(), TextDocument::new(&text), provider);
        let stored: Vec<_> = self.store.entries_for(file).map(|e| return e.to_marker()).collect::<Result<_, _>>()?;
        for marker in stored {
            self.manager.restore_marker(id, marker)?;
        }
        self.files.insert(file.to_path_buf(), id);
        return Ok(id);
    }

    /// Load config and store from `root` and open every tracked file.
    /// Unreadable files are recorded in `missing`.
    ///
    /// # Errors
    ///
    /// Returns config or store errors. A missing store is an error only when
    /// `require_store` is set.
    pub fn open(root: &Path, require_store: bool) -> Result<Self, Error> {
        let config = Config::load(root)?;
        let store = match MarkerStore::read(&root.join(STORE_FILE)) {
            Err(Error::StoreNotFound { .. }) if !require_store => MarkerStore::default(),
            other => other?,
        };

        let mut workspace = Self {
            files: BTreeMap::new(),
            manager: MarkerManager::new(config),
            missing: Vec::new(),
            root: root.to_path_buf(),
            store,
        };
        let next_id = workspace.store.next_id();
        workspace.manager.reserve_marker_ids(next_id);
        for file in workspace.store.files() {
            match workspace.load_file(&file) {
                Ok(_) => {},
                Err(Error::FileNotFound { .. }) => {
                    tracing::warn!(file = %file.display(), "tracked file is missing");
                    workspace.missing.push(file);
                },
                Err(e) => return Err(e),
            }
        }
        return Ok(workspace);
    }

    /// Write every open session's markers back to the store.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` or `Error::Io` if the store cannot be written.
    pub fn persist(&mut self) -> Result<(), Error> {
        for (file, &id) in &self.files {
            self.store.replace_file(file, self.manager.markers(id));
        }
        return self.store.write(&self.root.join(STORE_FILE));
    }

    /// Snapshot outcomes of one document as report rows.
    pub fn reports(&self, file: &Path, id: DocumentId, outcomes: &[ReconciliationOutcome]) -> Vec<MarkerReport> {
        return outcomes
            .iter()
            .map(|outcome| {
                let marker = self.manager.marker(id, outcome.marker_id);
                return MarkerReport {
                    annotations: marker.map(|m| return m.annotation_ids.iter().cloned().collect()).unwrap_or_default(),
                    file: file.to_path_buf(),
                    line: marker.map_or(0, |m| return m.start_line),
                    outcome: outcome.clone(),
                };
            })
            .collect();
    }
}

/// Verify every stored marker against the files on disk and write fixes back.
///
/// Exit code priority: needs-manual-fix or missing file (2) > needs-review (1) > clean (0).
///
/// # Errors
///
/// Returns store, config, or I/O errors.
pub fn check(format: Format) -> Result<ExitCode, Error> {
    let mut workspace = Workspace::open(Path::new("."), true)?;
    let files: Vec<(PathBuf, DocumentId)> = workspace.files.iter().map(|(f, &id)| return (f.clone(), id)).collect();

    let mut reports = Vec::new();
    for (file, id) in files {
        let outcomes = workspace.manager.verify_all(id)?;
        reports.extend(workspace.reports(&file, id, &outcomes));
    }
    workspace.persist()?;

    print_check(&reports, &workspace.missing, format);
    return Ok(check_exit_code(&reports, !workspace.missing.is_empty()));
}

/// Exit code for a set of reports.
pub fn check_exit_code(reports: &[MarkerReport], files_missing: bool) -> ExitCode {
    let any = |status: Status| return reports.iter().any(|r| return r.outcome.status == status);
    if files_missing || any(Status::NeedsManualFix) {
        return ExitCode::from(2);
    }
    if any(Status::NeedsReview) {
        return ExitCode::from(1);
    }
    return ExitCode::SUCCESS;
}

/// Bind annotations to a line (or range) of a file.
///
/// # Errors
///
/// Returns `Error::FileNotFound`, line validation errors, or store errors.
pub fn mark(file: &Path, line: u32, end_line: Option<u32>, annotations: &[String]) -> Result<(), Error> {
    let mut workspace = Workspace::open(Path::new("."), false)?;
    let id = workspace.load_file(file)?;
    let annotation_ids: Vec<AnnotationId> = annotations.iter().map(|a| return AnnotationId::from(a.as_str())).collect();
    let marker = workspace.manager.create_marker(id, line, &annotation_ids, end_line)?;
    workspace.persist()?;

    let anchored = marker
        .anchor()
        .map_or_else(|| return "content fingerprint".to_string(), |a| return format!("`{}`", a.display_path()));
    println!("Marked {}:{} ({}) anchored to {anchored}", file.display(), marker.start_line, marker.id);
    return Ok(());
}

/// Find annotations whose code is gone or changed.
///
/// # Errors
///
/// Returns store, config, or I/O errors.
pub fn orphans(format: Format, min_confidence: u8) -> Result<ExitCode, Error> {
    let mut workspace = Workspace::open(Path::new("."), true)?;
    let files: Vec<(PathBuf, DocumentId)> = workspace.files.iter().map(|(f, &id)| return (f.clone(), id)).collect();

    let mut reports = Vec::new();
    for (file, id) in files {
        let orphans = workspace.manager.find_orphans(id, min_confidence)?;
        reports.push(OrphanReport { file, orphans });
    }

    match format {
        Format::Json => print_json(&reports),
        Format::Text => diagnostics::print_report(&diagnostics::render_orphan_report(&reports)),
    }
    if reports.iter().any(|r| return !r.orphans.is_empty()) {
        return Ok(ExitCode::from(1));
    }
    return Ok(ExitCode::SUCCESS);
}

/// Print the symbol outline of a file.
///
/// # Errors
///
/// Returns `Error::FileNotFound`, `Error::UnsupportedLanguage`, or parse errors.
pub fn outline(file: &Path) -> Result<(), Error> {
    let source = std::fs::read_to_string(file).map_err(|_| return Error::FileNotFound { path: file.to_path_buf() })?;
    let symbols = Outliner::for_path(file)?.outline(&source)?;
    print!("{}", render_tree(&SymbolTree { symbols }));
    return Ok(());
}

/// Print a check report in the requested format.
pub fn print_check(reports: &[MarkerReport], missing: &[PathBuf], format: Format) {
    match format {
        Format::Json => print_json(&reports),
        Format::Text => {
            for file in missing {
                diagnostics::print_error(&Error::FileNotFound { path: file.clone() });
            }
            diagnostics::print_report(&diagnostics::render_check_report(reports));
        },
    }
}

/// Print a value as pretty JSON on stdout.
fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "cannot serialize report"),
    }
}

/// Move a marker to a new line on the user's word.
///
/// # Errors
///
/// Returns `Error::UnknownMarker` if the file has no such marker, line
/// validation errors, or store errors.
pub fn reanchor(file: &Path, marker: &str, line: u32, end_line: Option<u32>) -> Result<(), Error> {
    let marker_id = parse_marker_id(marker)?;
    let mut workspace = Workspace::open(Path::new("."), true)?;
    let id = workspace.load_file(file)?;
    let moved = workspace.manager.reanchor_marker(id, marker_id, line, end_line)?;
    workspace.persist()?;
    println!("Re-anchored {} to {}:{}", moved.id, file.display(), moved.start_line);
    return Ok(());
}

/// Accept `m3` or `3`.
fn parse_marker_id(text: &str) -> Result<MarkerId, Error> {
    let digits = text.strip_prefix('m').unwrap_or(text);
    return digits.parse::<u64>().map(MarkerId).map_err(|_| {
        return Error::InvalidMarkerId { text: text.to_owned() };
    });
}

/// Remove an annotation from every marker, deleting emptied markers.
///
/// # Errors
///
/// Returns `Error::UnknownAnnotation` if no marker carries it, or store errors.
pub fn unmark(annotation: &str) -> Result<(), Error> {
    let mut workspace = Workspace::open(Path::new("."), true)?;
    let annotation = AnnotationId::from(annotation);
    let mut found = false;
    let mut deleted = 0_usize;
    let ids: Vec<DocumentId> = workspace.files.values().copied().collect();
    for id in ids {
        match workspace.manager.remove_annotation(id, &annotation) {
            Ok(removed) => {
                found = true;
                deleted = deleted.saturating_add(removed.len());
            },
            Err(Error::UnknownAnnotation { .. }) => {},
            Err(e) => return Err(e),
        }
    }
    if !found {
        return Err(Error::UnknownAnnotation { id: annotation });
    }
    workspace.persist()?;
    println!("Removed `{annotation}` ({deleted} marker(s) deleted)");
    return Ok(());
}
