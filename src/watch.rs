//! File watcher: feeds on-disk changes to the marker manager as edits and
//! reports verification passes as their debounce expires.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use driftmark::error::Error;
use driftmark::types::DocumentId;
use notify::{RecursiveMode, Watcher as _};

use crate::commands::{self, Format, Workspace};

/// How long to block when no verification is pending.
const IDLE_WAIT: Duration = Duration::from_secs(60);

/// Parent directories of every tracked file.
fn collect_watch_dirs(workspace: &Workspace) -> HashSet<PathBuf> {
    return workspace
        .files
        .keys()
        .chain(&workspace.missing)
        .filter_map(|file| return workspace.root.join(file).parent().map(Path::to_path_buf))
        .collect();
}

/// Create a filesystem watcher that sends changed paths on the given channel.
///
/// # Errors
///
/// Returns `Error::WatchFailed` if the watcher cannot be created.
fn create_watcher(tx: crossbeam_channel::Sender<PathBuf>) -> Result<notify::RecommendedWatcher, Error> {
    return notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_) | notify::EventKind::Modify(_) | notify::EventKind::Remove(_)
            )
        {
            for path in event.paths {
                let _ = tx.send(path);
            }
        }
    })
    .map_err(|e| {
        return Error::WatchFailed { reason: format!("watcher setup failed: {e}") };
    });
}

/// Re-read a changed file and hand the difference to the manager as one edit.
fn ingest_change(workspace: &mut Workspace, file: &Path, id: DocumentId) {
    let Ok(text) = std::fs::read_to_string(workspace.root.join(file)) else {
        tracing::warn!(file = %file.display(), "tracked file vanished");
        return;
    };
    let Some(edit) = workspace.manager.document(id).and_then(|doc| return doc.diff_to(&text)) else {
        return;
    };
    match workspace.manager.apply_edit(id, &edit, Instant::now()) {
        Ok(event) => {
            tracing::debug!(file = %file.display(), delta = event.line_delta(), "applied change");
        },
        Err(e) => tracing::warn!(file = %file.display(), error = %e, "cannot apply change"),
    }
}

/// Entry point for the watch command.
///
/// Verifies every marker once, then tracks edits to the tracked files and
/// re-verifies each file after its debounce. Fixes are written back to the
/// store after every pass.
///
/// # Errors
///
/// Returns errors from config or store loading, or `Error::WatchFailed` if
/// the watcher cannot be set up.
pub fn run(format: Format) -> Result<ExitCode, Error> {
    eprintln!("watch: initial check");
    let mut last_code = match commands::check(format) {
        Ok(code) => code,
        Err(e) => {
            driftmark::diagnostics::print_error(&e);
            ExitCode::from(3_u8)
        },
    };

    let mut workspace = Workspace::open(Path::new("."), true)?;
    let watch_dirs = collect_watch_dirs(&workspace);
    let tracked = tracked_by_canonical_path(&workspace);

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx)?;
    for dir in &watch_dirs {
        if dir.exists()
            && let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive)
        {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot watch directory");
        }
    }
    eprintln!("watch: monitoring {} directories, press Ctrl+C to stop", watch_dirs.len());

    loop {
        let wait = workspace
            .manager
            .next_deadline()
            .map_or(IDLE_WAIT, |due| return due.saturating_duration_since(Instant::now()));
        match rx.recv_timeout(wait) {
            Ok(path) => {
                let canonical = path.canonicalize().unwrap_or(path);
                if let Some(file) = tracked.get(&canonical)
                    && let Some(&id) = workspace.files.get(file)
                {
                    ingest_change(&mut workspace, file, id);
                }
            },
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {},
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }

        let passes = workspace.manager.run_due(Instant::now());
        if passes.is_empty() {
            continue;
        }
        let mut reports = Vec::new();
        for (id, outcomes) in passes {
            let Some(file) = workspace.files.iter().find(|&(_, &doc)| return doc == id).map(|(f, _)| return f.clone())
            else {
                continue;
            };
            reports.extend(workspace.reports(&file, id, &outcomes));
        }
        eprintln!("watch: change verified");
        commands::print_check(&reports, &[], format);
        last_code = commands::check_exit_code(&reports, false);
        if let Err(e) = workspace.persist() {
            driftmark::diagnostics::print_error(&e);
        }
    }

    return Ok(last_code);
}

/// Map canonical on-disk paths back to the store's relative paths.
fn tracked_by_canonical_path(workspace: &Workspace) -> BTreeMap<PathBuf, PathBuf> {
    return workspace
        .files
        .keys()
        .filter_map(|file| {
            return workspace.root.join(file).canonicalize().ok().map(|canonical| return (canonical, file.clone()));
        })
        .collect();
}
