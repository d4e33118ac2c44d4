#![cfg(feature = "policy-config")]

use std::time::Duration;

use bodesk::{ModalContext, ModalPolicy, PolicyError};
use tempfile::TempDir;

fn write_policy(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write policy file");
    path
}

#[test]
fn loads_toml_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_policy(&dir, "policy.toml", "close_grace_ms = 0\nhistory_capacity = 8\n");
    let policy = ModalPolicy::load(&path).expect("valid policy");

    assert_eq!(policy.close_grace, Duration::ZERO);
    assert_eq!(policy.history_capacity, 8);

    let ctx: ModalContext = ModalContext::new(policy);
    assert_eq!(ctx.bus().history_capacity(), 8);
}

#[test]
fn loads_json_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_policy(&dir, "policy.json", r#"{ "nav_guard_ms": 500 }"#);
    let policy = ModalPolicy::load(&path).expect("valid policy");

    assert_eq!(policy.nav_guard, Duration::from_millis(500));
    assert_eq!(policy.close_grace, Duration::from_millis(300));
}

#[test]
fn malformed_json_file_reports_json_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_policy(&dir, "broken.json", "{ nav_guard_ms: }");
    let err = ModalPolicy::load(&path).unwrap_err();
    assert!(matches!(err, PolicyError::Json(_)));
    assert!(err.to_string().starts_with("invalid JSON policy"));
}
