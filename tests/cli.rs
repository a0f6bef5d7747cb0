//! Integration tests for the `pbuf` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn get_pbuf_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pbuf"))
}

fn run_pbuf(project_dir: &Path, args: &[&str]) -> Output {
    Command::new(get_pbuf_binary())
        .args(args)
        .current_dir(project_dir)
        .env("HOME", project_dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run pbuf")
}

fn output_text(output: &Output) -> String {
    format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
fn init_writes_default_manifest() {
    let dir = tempfile::tempdir().unwrap();

    let output = run_pbuf(dir.path(), &["init", "acme/api"]);
    assert!(output.status.success(), "{}", output_text(&output));

    let manifest = fs::read_to_string(dir.path().join("pbuf.yaml")).unwrap();
    assert!(manifest.contains("name: acme/api"));
    assert!(manifest.contains("addr: pbuf.cloud"));
    assert!(manifest.contains("pbufio/pbuf-registry"));
    assert!(manifest.contains("- proto"));
}

#[test]
fn init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("pbuf.yaml"), "version: v1\n").unwrap();

    let output = run_pbuf(dir.path(), &["init", "acme/api"]);
    assert!(!output.status.success());
    assert!(output_text(&output).contains("already exists"));
    assert_eq!(
        fs::read_to_string(dir.path().join("pbuf.yaml")).unwrap(),
        "version: v1\n"
    );
}

#[test]
fn vendor_without_manifest_suggests_init() {
    let dir = tempfile::tempdir().unwrap();

    let output = run_pbuf(dir.path(), &["vendor"]);
    assert!(!output.status.success());
    assert!(output_text(&output).contains("pbuf init"));
}

#[test]
fn vendor_rejects_gen_out_without_go_module() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("pbuf.yaml"),
        "version: v1\nmodules:\n  - repository: https://github.com/acme/api\n    gen_out: gen\n",
    )
    .unwrap();

    let output = run_pbuf(dir.path(), &["vendor"]);
    assert!(!output.status.success());
    assert!(output_text(&output).contains("go.mod"));
}

#[test]
fn vendor_json_reports_failed_module() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no-such-repo");
    fs::write(
        dir.path().join("pbuf.yaml"),
        format!(
            "version: v1\nmodules:\n  - repository: file://{}\n    out: vendor\n",
            missing.display()
        ),
    )
    .unwrap();

    let output = run_pbuf(dir.path(), &["vendor", "--json"]);
    assert_eq!(output.status.code(), Some(1), "{}", output_text(&output));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["modules"][0]["status"], "failed");
    assert_eq!(report["modules"][0]["error_kind"], "transport");
}

#[test]
fn completion_prints_script() {
    let dir = tempfile::tempdir().unwrap();

    let output = run_pbuf(dir.path(), &["completion", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("pbuf"));
}
