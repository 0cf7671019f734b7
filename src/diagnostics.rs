use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::orphan::OrphanedAnnotation;
use crate::store::STORE_FILE;
use crate::types::{AnnotationId, ReconciliationOutcome, Status};

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// One verified marker, as listed in a check report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MarkerReport {
    /// Annotations bound to the marker.
    pub annotations: Vec<AnnotationId>,
    /// File the marker tracks.
    pub file: PathBuf,
    /// Marker line after verification.
    pub line: u32,
    /// Verification verdict.
    #[serde(flatten)]
    pub outcome: ReconciliationOutcome,
}

/// Orphans of one file, as listed in an orphan report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OrphanReport {
    /// File the markers track.
    pub file: PathBuf,
    /// Orphaned annotations at or above the report threshold.
    pub orphans: Vec<OrphanedAnnotation>,
}

/// Render markdown to stderr, bolding headings.
fn print_markdown(md: &str) {
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    print_markdown(&render_error(e));
}

/// Render a report as markdown with bold headings and print to stdout.
pub fn print_report(md: &str) {
    for line in md.lines() {
        if line.starts_with('#') {
            println!("{BOLD}{line}{RESET}");
        } else {
            println!("{line}");
        }
    }
}

/// Render a check run as markdown: a summary line, then every marker that
/// did not verify cleanly with what to do about it.
pub fn render_check_report(reports: &[MarkerReport]) -> String {
    let count = |status: Status| return reports.iter().filter(|r| return r.outcome.status == status).count();
    let mut out = format!(
        "# Check\n\n{} valid, {} auto-fixed, {} need review, {} need manual fix.\n",
        count(Status::Valid),
        count(Status::AutoFixed),
        count(Status::NeedsReview),
        count(Status::NeedsManualFix),
    );

    for status in [Status::NeedsManualFix, Status::NeedsReview, Status::AutoFixed] {
        let matching: Vec<&MarkerReport> = reports.iter().filter(|r| return r.outcome.status == status).collect();
        if matching.is_empty() {
            continue;
        }
        let _ = write!(out, "\n## {}\n\n", section_title(status));
        for report in matching {
            let _ = writeln!(out, "- {}", describe_marker(report));
        }
        if let Some(fix) = fix_hint(status) {
            let _ = write!(out, "\n## Fix\n\n{fix}\n");
        }
    }
    return out;
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is
/// one, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::EmptyAnnotations { line } => format!("\
# Error: No Annotations

A marker at line {line} must carry at least one annotation id.

## Fix

    driftmark mark <file> {line} <annotation>
"),
        Error::FileTooLarge { file, max_bytes, size_bytes } => render_file_too_large(file, *size_bytes, *max_bytes),
        Error::InvalidMarkerId { text } => format!("\
# Error: Invalid Marker Id

`{text}` is not a marker id. Ids look like `m3` or `3`.

## Fix

    driftmark check --format json
"),
        Error::InvalidRange { end_line, line_count, start_line } => format!("\
# Error: Invalid Range

Range {start_line}-{end_line} is not valid in a document of {line_count} lines.
The end line must come after the start line and exist in the file.
"),
        Error::LineOutOfBounds { line, line_count } => format!("\
# Error: Line Out Of Bounds

Line {line} does not exist (the document has {line_count} lines).
"),
        Error::StoreNotFound { .. } => render_store_not_found(),
        Error::UnknownAnnotation { id } => format!("\
# Error: Unknown Annotation

No marker carries annotation `{id}`.
"),
        Error::UnsupportedLanguage { ext } => render_unsupported_language(ext),
        _ => render_generic(e),
    };
}

/// Plain-block rendering for variants without a dedicated layout.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::FileNotFound { path } => format!("\
# Error: File Not Found

`{}` does not exist.

## Fix

Restore the file, or drop its markers with `driftmark unmark`.
", path.display()),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),

        Error::ParseFailed { file, reason } => format!("\
# Error: Parse Failed

Could not parse `{}`: {reason}
", file.display()),

        Error::StoreCorrupt { reason } => format!("\
# Error: Marker Store Corrupt

{reason}

## Fix

Entries in `{STORE_FILE}` must be sorted by file, line, and id, with unique ids.
Restore the file from version control.
"),

        Error::TomlDe(e) => format!("\
# Error: Invalid TOML

{e}
"),

        Error::TomlSer(e) => format!("\
# Error: TOML Serialization

{e}
"),

        Error::WatchFailed { reason } => format!("\
# Error: Watch Failed

{reason}
"),

        _ => format!("\
# Error

{e}
"),
    };
}

/// Render orphan scan results as markdown with recovery suggestions.
pub fn render_orphan_report(reports: &[OrphanReport]) -> String {
    let total: usize = reports.iter().map(|r| return r.orphans.len()).sum();
    if total == 0 {
        return "# Orphans\n\nNo orphaned annotations.\n".to_string();
    }

    let mut out = format!("# Orphans\n\n{total} orphaned annotation(s).\n");
    for report in reports.iter().filter(|r| return !r.orphans.is_empty()) {
        let _ = write!(out, "\n## {}\n\n", report.file.display());
        for orphan in &report.orphans {
            let _ = writeln!(
                out,
                "- `{}` at line {} ({}, {}% confidence): {}",
                orphan.annotation_id,
                orphan.line,
                orphan.status.reason,
                orphan.status.confidence,
                orphan.status.description(),
            );
            for suggestion in orphan.status.recovery_suggestions() {
                let _ = writeln!(out, "  - {suggestion}");
            }
        }
    }
    return out;
}

/// One-line description of a verified marker.
fn describe_marker(report: &MarkerReport) -> String {
    let annotations = report.annotations.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    let outcome = &report.outcome;
    let mut line = format!(
        "{}:{} {} [{annotations}] {}",
        report.file.display(),
        report.line,
        outcome.marker_id,
        outcome.reason
    );
    if let (Some(old), Some(new)) = (outcome.old_line, outcome.new_line) {
        let _ = write!(line, " (moved {old} -> {new})");
    }
    if let Some(suggested) = outcome.suggested_line {
        let _ = write!(line, " (candidate at line {suggested})");
    }
    return line;
}

/// How to resolve markers in a non-valid state.
fn fix_hint(status: Status) -> Option<&'static str> {
    return match status {
        Status::AutoFixed | Status::Valid => None,
        Status::NeedsManualFix => Some("\
The tracked code could not be found. Re-anchor or drop the marker:

    driftmark reanchor <file> <marker> <line>
    driftmark unmark <annotation>"),
        Status::NeedsReview => Some("\
Confirm the candidate line by re-anchoring there:

    driftmark reanchor <file> <marker> <candidate-line>"),
    };
}

fn render_file_too_large(file: &Path, size_bytes: u64, max_bytes: u64) -> String {
    return format!("\
# Error: File Too Large

`{}` is {size_bytes} bytes (max {max_bytes}).
", file.display());
}

/// Section heading for a status group.
const fn section_title(status: Status) -> &'static str {
    return match status {
        Status::AutoFixed => "Auto-fixed",
        Status::NeedsManualFix => "Needs manual fix",
        Status::NeedsReview => "Needs review",
        Status::Valid => "Valid",
    };
}

fn render_store_not_found() -> String {
    return format!("\
# Error: Marker Store Not Found

`{STORE_FILE}` does not exist.

## Fix

Create it by marking a line:

    driftmark mark <file> <line> <annotation>
");
}

fn render_unsupported_language(ext: &str) -> String {
    return format!(
        "\
# Error: Unsupported Language

No tree-sitter grammar for `.{ext}` files.

## Supported extensions

- `.rs`: Rust
- `.ts`, `.tsx`, `.js`, `.jsx`: TypeScript and JavaScript
- `.py`: Python
- `.go`: Go
- `.md`: Markdown
"
    );
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{MarkerReport, OrphanReport, render_check_report, render_error, render_orphan_report};
    use crate::error::Error;
    use crate::orphan::{OrphanReason, OrphanStatus, OrphanedAnnotation};
    use crate::types::{AnnotationId, MarkerId, ReconciliationOutcome, Reason, Status};

    fn report(status: Status, reason: Reason) -> MarkerReport {
        return MarkerReport {
            annotations: vec![AnnotationId::from("note")],
            file: PathBuf::from("src/lib.rs"),
            line: 4,
            outcome: ReconciliationOutcome::plain(MarkerId(3), status, reason),
        };
    }

    #[test]
    fn check_report_groups_by_status() {
        let md = render_check_report(&[
            report(Status::Valid, Reason::HashMatch),
            report(Status::NeedsManualFix, Reason::NoMatchFound),
        ]);
        assert!(md.contains("1 valid, 0 auto-fixed, 0 need review, 1 need manual fix."));
        assert!(md.contains("## Needs manual fix\n\n- src/lib.rs:4 m3 [note] no-match-found"));
        assert!(md.contains("driftmark unmark"));
        assert!(!md.contains("## Valid"));
    }

    #[test]
    fn moved_markers_show_both_lines() {
        let mut moved = report(Status::AutoFixed, Reason::FoundDrift);
        moved.outcome = ReconciliationOutcome::moved(MarkerId(3), Reason::FoundDrift, 2, 4);
        assert!(render_check_report(&[moved]).contains("(moved 2 -> 4)"));
    }

    #[test]
    fn orphan_report_lists_suggestions() {
        let md = render_orphan_report(&[OrphanReport {
            file: PathBuf::from("a.ts"),
            orphans: vec![OrphanedAnnotation {
                annotation_id: AnnotationId::from("note"),
                line: 2,
                marker_id: MarkerId(1),
                status: OrphanStatus {
                    confidence: 95,
                    is_orphaned: true,
                    reason: OrphanReason::SymbolDeleted,
                    suggested_location: None,
                },
            }],
        }]);
        assert!(md.contains("## a.ts"));
        assert!(md.contains("`note` at line 2 (symbol-deleted, 95% confidence)"));
        assert!(md.contains("  - Search the file for similar code"));
        assert_eq!(render_orphan_report(&[]), "# Orphans\n\nNo orphaned annotations.\n");
    }

    #[test]
    fn every_error_renders_a_heading() {
        for e in [
            Error::EmptyAnnotations { line: 3 },
            Error::StoreCorrupt { reason: "bad".to_string() },
            Error::UnsupportedLanguage { ext: "txt".to_string() },
            Error::WatchFailed { reason: "inotify".to_string() },
        ] {
            assert!(render_error(&e).starts_with("# Error"));
        }
    }

    #[test]
    fn invalid_marker_id_names_the_text() {
        let md = render_error(&Error::InvalidMarkerId { text: "mx".to_string() });
        assert!(md.starts_with("# Error: Invalid Marker Id"));
        assert!(md.contains("`mx` is not a marker id"));
    }
}
