#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

const BIN: &str = env!("CARGO_BIN_EXE_recon-engine");

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&p, fs::Permissions::from_mode(0o755)).unwrap();
    p
}

fn config(dir: &Path, subfinder: &Path, httpx: &Path) -> PathBuf {
    let p = dir.join("recon.yaml");
    let yaml = format!(
        "tools:\n  subfinder:\n    path: {}\n  httpx:\n    path: {}\n",
        subfinder.display(),
        httpx.display()
    );
    fs::write(&p, yaml).unwrap();
    p
}

const HTTPX: &str = r#"while IFS= read -r h; do
  printf '{"input":"%s","url":"https://%s","status_code":200,"title":"T","tech":["nginx"]}\n' "$h" "$h"
done"#;

#[test]
fn missing_binary_prints_one_json_line() {
    let empty = tempfile::tempdir().unwrap();
    let out = Command::new(BIN)
        .arg("example.com")
        .env("PATH", empty.path())
        .env_remove("RUST_LOG")
        .current_dir(empty.path())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(
        String::from_utf8(out.stdout).unwrap(),
        "{\"error\":\"Missing binary: subfinder\",\"message\":\"Please install required tools in PATH\"}\n"
    );
}

#[test]
fn end_to_end_with_stand_in_tools() {
    let dir = tempfile::tempdir().unwrap();
    let subfinder = script(dir.path(), "subfinder", "printf 'a.example.com\\nA.example.com\\nb.example.com\\n'");
    let httpx = script(dir.path(), "httpx", HTTPX);
    let cfg = config(dir.path(), &subfinder, &httpx);
    let out = Command::new(BIN)
        .args(["--config", cfg.to_str().unwrap(), "example.com"])
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8(out.stdout).unwrap();
    let records: Vec<serde_json::Value> = stdout.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["subdomain"], "a.example.com");
    assert_eq!(records[0]["status_code"], 200);
    assert_eq!(records[0]["source"], "recon_pipeline");
    assert_eq!(records[1]["subdomain"], "b.example.com");
}

#[test]
fn empty_discovery_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let subfinder = script(dir.path(), "subfinder", "exit 0");
    let httpx = script(dir.path(), "httpx", HTTPX);
    let cfg = config(dir.path(), &subfinder, &httpx);
    let out = Command::new(BIN)
        .args(["--config", cfg.to_str().unwrap(), "example.com"])
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0));
    assert!(out.stdout.is_empty());
}
