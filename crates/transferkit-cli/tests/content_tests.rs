//! Integration tests for content commands

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn transferkit_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("transferkit").unwrap();
    cmd.env("TRANSFERKIT_DB", dir.path().join("test.sqlite"))
        .env("TRANSFERKIT_CONFIG", dir.path().join("missing.yml"))
        .env_remove("TRANSFERKIT_LLM_URL");
    cmd
}

fn write_document(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("biology.json");
    fs::write(
        &path,
        r#"{
            "id": "bio-101",
            "title": "Cell Biology",
            "chunks": [
                {"id": "intro", "page": 1, "text": "Cells are the unit of life."},
                {"page": 2, "text": "Mitochondria produce energy."}
            ],
            "glossary": [{"term": "mitochondria", "definition": "organelle"}]
        }"#,
    )
    .unwrap();
    path
}

#[test]
fn test_import_then_list() {
    let dir = TempDir::new().unwrap();
    let doc = write_document(&dir);

    transferkit_cmd(&dir)
        .args(["content", "import"])
        .arg(&doc)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported content 'bio-101' (2 chunks)"));

    transferkit_cmd(&dir)
        .args(["content", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bio-101"))
        .stdout(predicate::str::contains("Cell Biology"));
}

#[test]
fn test_list_empty_database() {
    let dir = TempDir::new().unwrap();

    transferkit_cmd(&dir)
        .args(["content", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No content imported."));
}

#[test]
fn test_import_rejects_missing_id() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{"id": "  ", "chunks": []}"#).unwrap();

    transferkit_cmd(&dir)
        .args(["content", "import"])
        .arg(&path)
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_import_json_output() {
    let dir = TempDir::new().unwrap();
    let doc = write_document(&dir);

    let output = transferkit_cmd(&dir)
        .args(["--format", "json", "content", "import"])
        .arg(&doc)
        .output()
        .unwrap();
    assert!(output.status.success());

    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["id"], "bio-101");
    assert_eq!(info["chunk_count"], 2);
}
