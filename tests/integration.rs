use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Copy the `shapes` fixture into a fresh temp dir.
fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/shapes");
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    for file in ["src/shapes.rs", "notes.txt"] {
        std::fs::copy(fixture.join(file), dir.path().join(file)).unwrap();
    }
    dir
}

fn driftmark(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_driftmark")).args(args).current_dir(dir).output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn store(dir: &Path) -> String {
    std::fs::read_to_string(dir.join(".driftmark.lock")).unwrap()
}

fn rewrite(path: PathBuf, edit: impl FnOnce(&str) -> String) {
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, edit(&text)).unwrap();
}

#[test]
fn mark_then_check_passes() {
    let dir = project();
    let mark = driftmark(dir.path(), &["mark", "src/shapes.rs", "9", "area-formula"]);
    assert!(mark.status.success(), "mark failed: {}", String::from_utf8_lossy(&mark.stderr));
    assert!(stdout(&mark).contains("anchored to `impl Circle.area`"), "{}", stdout(&mark));
    assert!(store(dir.path()).contains("area-formula"));

    let check = driftmark(dir.path(), &["check"]);
    assert_eq!(check.status.code(), Some(0), "{}", stdout(&check));
    assert!(stdout(&check).contains("1 valid, 0 auto-fixed"));
}

#[test]
fn lines_inserted_above_are_followed() {
    let dir = project();
    driftmark(dir.path(), &["mark", "src/shapes.rs", "9", "area-formula"]);
    rewrite(dir.path().join("src/shapes.rs"), |text| format!("// Copyright\n\n{text}"));

    let check = driftmark(dir.path(), &["check"]);
    assert_eq!(check.status.code(), Some(0), "{}", stdout(&check));
    assert!(stdout(&check).contains("(moved 9 -> 11)"), "{}", stdout(&check));
    assert!(store(dir.path()).contains("start_line = 11"));

    let again = driftmark(dir.path(), &["check"]);
    assert!(stdout(&again).contains("1 valid"));
}

#[test]
fn deleted_code_needs_manual_fix() {
    let dir = project();
    driftmark(dir.path(), &["mark", "src/shapes.rs", "19", "unit-default"]);
    rewrite(dir.path().join("src/shapes.rs"), |text| {
        text.lines().take(16).map(|line| format!("{line}\n")).collect()
    });

    let check = driftmark(dir.path(), &["check"]);
    assert_eq!(check.status.code(), Some(2));
    assert!(stdout(&check).contains("## Needs manual fix"));
    assert!(stdout(&check).contains("line-out-of-bounds"));

    let orphans = driftmark(dir.path(), &["orphans"]);
    assert_eq!(orphans.status.code(), Some(1));
    assert!(stdout(&orphans).contains("`unit-default` at line 19 (symbol-deleted, 95% confidence)"));
}

#[test]
fn files_without_grammar_track_by_fingerprint() {
    let dir = project();
    let mark = driftmark(dir.path(), &["mark", "notes.txt", "3", "tagging"]);
    assert!(stdout(&mark).contains("anchored to content fingerprint"));

    rewrite(dir.path().join("notes.txt"), |text| format!("Draft\n{text}"));
    let check = driftmark(dir.path(), &["check"]);
    assert_eq!(check.status.code(), Some(0));
    assert!(stdout(&check).contains("found-drift (moved 3 -> 4)"), "{}", stdout(&check));
}

#[test]
fn check_json_lists_outcomes() {
    let dir = project();
    driftmark(dir.path(), &["mark", "src/shapes.rs", "14", "perimeter"]);
    let check = driftmark(dir.path(), &["check", "--format", "json"]);
    let reports: serde_json::Value = serde_json::from_slice(&check.stdout).unwrap();
    let first = &reports[0];
    assert_eq!(first["status"], "valid");
    assert_eq!(first["reason"], "ast-exact-match");
    assert_eq!(first["marker_id"], "m1");
    assert_eq!(first["line"], 14);
}

#[test]
fn reanchor_and_unmark() {
    let dir = project();
    driftmark(dir.path(), &["mark", "src/shapes.rs", "9", "note"]);

    let moved = driftmark(dir.path(), &["reanchor", "src/shapes.rs", "m1", "14"]);
    assert!(moved.status.success(), "{}", String::from_utf8_lossy(&moved.stderr));
    assert!(store(dir.path()).contains("start_line = 14"));

    let unmark = driftmark(dir.path(), &["unmark", "note"]);
    assert!(stdout(&unmark).contains("1 marker(s) deleted"));
    assert!(!store(dir.path()).contains("note"));

    let missing = driftmark(dir.path(), &["unmark", "note"]);
    assert_eq!(missing.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&missing.stderr).contains("Unknown Annotation"));
}

#[test]
fn invalid_line_is_rejected() {
    let dir = project();
    let mark = driftmark(dir.path(), &["mark", "src/shapes.rs", "99", "note"]);
    assert_eq!(mark.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&mark.stderr).contains("Line Out Of Bounds"));
}

#[test]
fn outline_prints_symbols() {
    let dir = project();
    let outline = driftmark(dir.path(), &["outline", "src/shapes.rs"]);
    assert!(outline.status.success());
    let text = stdout(&outline);
    assert!(text.contains("impl Circle [7-16]"), "{text}");
    assert!(text.contains("area [8-11]"), "{text}");
    assert!(text.contains("unit [18-20]"), "{text}");
}
