use anyhow::Result;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Helper to run the CLI binary against a database inside `temp_dir`
fn run_cli(temp_dir: &TempDir, args: &[&str]) -> Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_treescope"))
        .current_dir(temp_dir.path())
        .arg("--db")
        .arg(temp_dir.path().join("index.db"))
        .arg("--hashing-embedder")
        .args(args)
        .output()?;
    Ok(output)
}

fn populate_corpus(root: &Path) -> Result<()> {
    let files = [
        ("corpus/notes.txt", "meeting notes from monday"),
        ("corpus/reports/2024/q1.txt", "quarterly revenue report for the north"),
        ("corpus/reports/summary.md", "summary of all reports"),
        ("corpus/archive/old/legacy.txt", "legacy revenue figures"),
    ];
    for (path, content) in files {
        let path = root.join(path);
        std::fs::create_dir_all(path.parent().expect("file has a parent"))?;
        std::fs::write(path, content)?;
    }
    Ok(())
}

#[test]
fn test_index_search_stats() -> Result<()> {
    let temp_dir = TempDir::new()?;
    populate_corpus(temp_dir.path())?;
    let corpus = temp_dir.path().join("corpus");

    let output = run_cli(&temp_dir, &["index", corpus.to_str().expect("utf-8 temp path")])?;
    assert!(output.status.success(), "index failed: {output:?}");
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Finished indexing 4 files"), "{stdout}");

    let output = run_cli(
        &temp_dir,
        &[
            "search",
            "revenue",
            "--root-folder",
            "reports",
            "--format",
            "json",
        ],
    )?;
    assert!(output.status.success(), "search failed: {output:?}");
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(parsed["filter"], "root_folder = 'reports'");
    let results = parsed["results"].as_array().expect("results array");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["path"], "reports/2024/q1.txt");

    let output = run_cli(&temp_dir, &["search", "revenue", "--max-depth", "0"])?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Path: notes.txt"), "{stdout}");
    assert!(!stdout.contains("legacy.txt"));

    let output = run_cli(&temp_dir, &["stats", "--format", "json"])?;
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(stats["document_count"], 4);
    assert_eq!(stats["max_folder_depth"], 2);
    Ok(())
}

#[test]
fn test_conflicting_depth_flags_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = run_cli(
        &temp_dir,
        &["search", "q", "--max-depth", "2", "--min-depth", "1"],
    )?;
    assert!(!output.status.success());
    Ok(())
}

#[test]
fn test_missing_folder_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = run_cli(&temp_dir, &["index", "does-not-exist"])?;
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("not accessible"), "{stderr}");
    Ok(())
}

#[test]
fn test_search_empty_index() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let empty = temp_dir.path().join("empty");
    std::fs::create_dir(&empty)?;
    let output = run_cli(&temp_dir, &["index", empty.to_str().expect("utf-8 temp path")])?;
    assert!(output.status.success(), "index failed: {output:?}");

    let output = run_cli(&temp_dir, &["search", "anything"])?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("No results found"));
    Ok(())
}

#[test]
fn test_read_commands_do_not_create_index() -> Result<()> {
    let temp_dir = TempDir::new()?;
    for command in [&["search", "anything"][..], &["stats"][..]] {
        let output = run_cli(&temp_dir, command)?;
        assert!(!output.status.success());
        let stderr = String::from_utf8(output.stderr)?;
        assert!(stderr.contains("no index at"), "{stderr}");
    }
    assert!(!temp_dir.path().join("index.db").exists());
    Ok(())
}
