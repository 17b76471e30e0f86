// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Integration tests for the `litmus` binary: exit codes, text and JSON
//! output over documents written to a temporary directory.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const PASSING: &str = "# Passing\n\n```js runnable\nlet total = 0;\n```\n\n```js runnable\nfor (const n of [1, 2, 3, 4]) total += n;\nconsole.log(total);\n```\n\n```output\n10\n```\n";

const FAILING: &str = "# Failing\n\n```js runnable\nmissing();\n```\n";

fn litmus(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_litmus"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("LITMUS_LOG")
        .output()
        .expect("failed to run litmus")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[test]
fn passing_documents_exit_zero() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs").join("guide.md"), PASSING).unwrap();

    let out = litmus(&["docs"], dir.path());
    assert_eq!(out.status.code(), Some(0), "stdout: {}", stdout(&out));
    let text = stdout(&out);
    assert!(text.contains("✓ line 3"));
    assert!(text.contains("✓ line 7"));
    assert!(text.contains("1 documents, 2 blocks run, 2 passed, 0 failed"));
}

#[test]
fn failing_document_exits_one_and_names_the_block() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.md"), PASSING).unwrap();
    fs::write(dir.path().join("b.md"), FAILING).unwrap();

    let out = litmus(&["."], dir.path());
    assert_eq!(out.status.code(), Some(1));
    let text = stdout(&out);
    assert!(text.contains("threw ReferenceError"));
    assert!(text.contains("b.md:3 - thrown:ReferenceError"));
}

#[test]
fn json_format_emits_reports() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("guide.md"), PASSING).unwrap();

    let out = litmus(&["--format", "json", "guide.md"], dir.path());
    assert_eq!(out.status.code(), Some(0));
    let reports: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(reports[0]["id"], "guide.md");
    assert_eq!(reports[0]["run"], 2);
    assert_eq!(reports[0]["results"][1]["output"][0], "10");
}

#[test]
fn capabilities_can_be_granted_from_flags_and_config() {
    let dir = tempfile::tempdir().unwrap();
    let timers = "```js runnable\nsetTimeout(() => console.log('later'), 5);\n```\n";
    fs::write(dir.path().join("timers.md"), timers).unwrap();

    let denied = litmus(&["timers.md"], dir.path());
    assert_eq!(denied.status.code(), Some(1));
    assert!(stdout(&denied).contains("capability-denied:timers"));

    let allowed = litmus(&["--allow", "timers", "timers.md"], dir.path());
    assert_eq!(allowed.status.code(), Some(0));

    fs::write(
        dir.path().join("litmus.toml"),
        "[policy]\nallow = [\"print\", \"timers\"]\n",
    )
    .unwrap();
    let configured = litmus(&["--config", "litmus.toml", "timers.md"], dir.path());
    assert_eq!(configured.status.code(), Some(0));
}

#[test]
fn usage_and_io_errors_exit_two() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(litmus(&["missing.md"], dir.path()).status.code(), Some(2));
    assert_eq!(litmus(&[], dir.path()).status.code(), Some(2));

    fs::write(dir.path().join("bad.toml"), "jobs = 0\n").unwrap();
    fs::write(dir.path().join("guide.md"), PASSING).unwrap();
    let out = litmus(&["--config", "bad.toml", "guide.md"], dir.path());
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("jobs must be at least 1"));
}
