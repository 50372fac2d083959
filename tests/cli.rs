//! Integration tests for top-level CLI behavior.

use std::path::Path;
use std::process::Command;

fn run_pipemap(dir: &Path, args: &[&str]) -> std::process::Output {
    let bin = env!("CARGO_BIN_EXE_pipemap");
    Command::new(bin)
        .args(args)
        .current_dir(dir)
        .env_remove("PIPEMAP_RECORD")
        .env_remove("ANTHROPIC_API_KEY")
        .output()
        .expect("failed to run pipemap binary")
}

#[test]
fn help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_pipemap(dir.path(), &["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    for command in ["update", "impact", "check"] {
        assert!(stdout.contains(command), "missing {command} in:\n{stdout}");
    }
}

#[test]
fn check_summarises_a_markdown_diagram() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("pipeline.md"),
        "# Pipeline\n\n```mermaid\nflowchart TD\n    %% commit: abc123\n    \
         A[\"• Load\"] --> B[\"• Split\"] --> C[\"• Store\"]\n```\n",
    )
    .unwrap();
    let output = run_pipemap(dir.path(), &["check", "pipeline.md"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("3 nodes, 2 edges"));
    assert!(stdout.contains("commit: abc123"));
}

#[test]
fn check_fails_on_a_document_without_a_diagram() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.md"), "# Notes\n").unwrap();
    let output = run_pipemap(dir.path(), &["check", "notes.md"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("no mermaid flowchart"));
}

#[test]
fn update_rejects_out_of_range_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_pipemap(dir.path(), &["update", "--ceiling", "1.5"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("ceiling"));
}

#[test]
fn update_rejects_invalid_config_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pipemap.toml"), "[update]\nincremental_ceiling = 0\n").unwrap();
    let output = run_pipemap(dir.path(), &["update"]);
    assert!(!output.status.success());
    assert!(!dir.path().join("diagram.html").exists());
}

#[test]
fn update_without_api_key_fails_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_pipemap(dir.path(), &["update", "--diagram", "pipeline.md"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stdout.contains("Outcome:  failed"));
    assert!(stderr.contains("ANTHROPIC_API_KEY"));
    assert!(!dir.path().join("pipeline.md").exists());
}
