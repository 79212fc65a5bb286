//! Integration tests for the `splash` binary.
//!
//! These tests run the actual binary and check its output.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run the splash binary with arguments and stdin, returning stdout, stderr
/// and whether it exited successfully
fn run(args: &[&str], input: &str) -> (String, String, bool) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_splash"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn splash binary");

    {
        let stdin = child.stdin.as_mut().expect("Failed to open stdin");
        stdin
            .write_all(input.as_bytes())
            .expect("Failed to write to stdin");
    }

    let output = child.wait_with_output().expect("Failed to read output");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn build_dump(dir: &Path, args: &[&str], input: &str) -> String {
    let dump = dir.join("table.dump");
    let dump = dump.to_str().expect("utf-8 temp path").to_owned();
    let mut full = vec!["build"];
    full.extend(args);
    full.extend(["--dump", dump.as_str()]);
    let (_, stderr, ok) = run(&full, input);
    assert!(ok, "build failed: {stderr}");
    dump
}

#[test]
fn build_then_probe() {
    let dir = tempfile::tempdir().unwrap();
    let dump = build_dump(
        dir.path(),
        &["-H", "4", "-b", "1", "-S", "5", "-r", "8", "--seed", "1"],
        "3 4\n4 5\n",
    );

    let (stdout, _, ok) = run(&["probe", &dump], "3\n4\n5\n");
    assert!(ok);
    assert_eq!(stdout, "4\n5\n0\n");

    let (stdout, _, ok) = run(&["probe", "--hits-only", &dump], "3\n4\n5\n");
    assert!(ok);
    assert_eq!(stdout, "3 4\n4 5\n");
}

#[test]
fn build_dumps_to_stdout() {
    let (stdout, _, ok) = run(
        &["build", "-H", "2", "-b", "2", "-S", "2", "-r", "4", "--seed", "9", "--dump", "-"],
        "7 70\n",
    );
    assert!(ok);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "2 2 2 1");
    assert_eq!(lines.len(), 2 + 4);
    assert_eq!(lines[2..].iter().filter(|l| **l == "7 70").count(), 1);
}

#[test]
fn build_stops_at_duplicate_and_keeps_entries() {
    let dir = tempfile::tempdir().unwrap();
    let dump = build_dump(
        dir.path(),
        &["-H", "2", "-b", "4", "-S", "6", "-r", "16", "--seed", "2"],
        "1 10\n2 20\n1 11\n3 30\n",
    );
    let text = std::fs::read_to_string(&dump).unwrap();
    assert!(text.starts_with("4 6 2 2\n"));

    let (stdout, _, ok) = run(&["probe", "--backend", "scalar", &dump], "1\n2\n3\n");
    assert!(ok);
    assert_eq!(stdout, "10\n20\n0\n");
}

#[test]
fn randomize_output_feeds_build() {
    let (stdout, _, ok) = run(&["randomize", "50", "--seed", "4"], "");
    assert!(ok);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 50);
    for line in &lines {
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], fields[1]);
        fields[0].parse::<u32>().unwrap();
    }

    let (again, _, _) = run(&["randomize", "50", "--seed", "4"], "");
    assert_eq!(stdout, again);
}

#[test]
fn probe_accepts_pair_lines() {
    let dir = tempfile::tempdir().unwrap();
    let dump = build_dump(
        dir.path(),
        &["-H", "2", "-b", "4", "-S", "8", "-r", "32", "--seed", "5"],
        "11 11\n22 22\n",
    );
    let (stdout, _, ok) = run(&["probe", "--hits-only", &dump], "11 11\n33 33\n22 22\n");
    assert!(ok);
    assert_eq!(stdout, "11 11\n22 22\n");
}

#[test]
fn bad_dump_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.dump");
    std::fs::write(&path, "2 2 2 0\n1\n").unwrap();
    let (stdout, stderr, ok) = run(&["probe", path.to_str().unwrap()], "");
    assert!(!ok);
    assert!(stdout.is_empty());
    assert!(stderr.contains("line 2"), "{stderr}");
}

#[test]
fn missing_dump_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.dump");
    let (_, stderr, ok) = run(&["probe", path.to_str().unwrap()], "");
    assert!(!ok);
    assert!(stderr.contains("Could not open"), "{stderr}");
}

#[test]
fn invalid_shape_fails() {
    let (_, stderr, ok) = run(&["build", "-H", "2", "-b", "3", "-S", "4", "-r", "1"], "");
    assert!(!ok);
    assert!(stderr.contains("bucket size"), "{stderr}");
}

#[test]
fn malformed_input_lines_are_skipped() {
    let (stdout, stderr, ok) = run(
        &["build", "-H", "2", "-b", "2", "-S", "4", "-r", "1", "--seed", "3", "--dump", "-"],
        "1 2\n# comment\nthree four\n3 4\n",
    );
    assert!(ok, "{stderr}");
    assert!(stderr.contains("line 2"), "{stderr}");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "2 4 2 2");
    assert!(lines[2..].contains(&"1 2"));
    assert!(lines[2..].contains(&"3 4"));
}
