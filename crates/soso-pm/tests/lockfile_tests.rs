//! Integration tests for lockfile persistence

use soso_pm::{InstallSet, LockEntry, Lockfile, LockfileError, LockfileRecord, LOCKFILE_VERSION};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

fn entry(name: &str, version: &str, deps: &[(&str, &str)]) -> LockEntry {
    LockEntry {
        version: version.to_string(),
        resolved: format!("https://git.example.com/{}.git#v{}", name, version),
        integrity: format!("sha256-{}{}", name, version),
        dependencies: deps
            .iter()
            .map(|(n, r)| (n.to_string(), r.to_string()))
            .collect(),
    }
}

fn sample() -> Vec<(String, LockEntry)> {
    vec![
        ("zlib".to_string(), entry("zlib", "1.2.0", &[])),
        ("alpha".to_string(), entry("alpha", "2.0.0", &[("zlib", "^1.0.0")])),
        ("@acme/ui".to_string(), entry("ui", "0.3.1", &[("alpha", "~2.0.0")])),
        ("mid".to_string(), entry("mid", "1.0.0", &[])),
    ]
}

#[test]
fn test_write_then_read_round_trip() {
    let dir = TempDir::new().unwrap();
    let lockfile = Lockfile::new(dir.path());
    let set: InstallSet = sample().into_iter().collect();

    lockfile.write(&set).unwrap();
    let record = lockfile.read().unwrap().unwrap();
    record.validate().unwrap();

    assert_eq!(record.lockfile_version, Some(LOCKFILE_VERSION));
    let expected: BTreeMap<String, LockEntry> = set.into_iter().collect();
    assert_eq!(record.packages.unwrap(), expected);
}

#[test]
fn test_output_is_byte_stable_across_insertion_orders() {
    let forward: InstallSet = sample().into_iter().collect();
    let backward: InstallSet = sample().into_iter().rev().collect();

    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    Lockfile::new(a.path()).write(&forward).unwrap();
    Lockfile::new(b.path()).write(&backward).unwrap();

    let bytes_a = fs::read(Lockfile::new(a.path()).path()).unwrap();
    let bytes_b = fs::read(Lockfile::new(b.path()).path()).unwrap();
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn test_serialized_layout() {
    let set: InstallSet = sample().into_iter().collect();
    let json = LockfileRecord::from_install_set(&set).to_json_string().unwrap();

    let order: Vec<usize> = ["\"@acme/ui\"", "\"alpha\"", "\"mid\"", "\"zlib\""]
        .iter()
        .map(|key| json.find(key).unwrap())
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["lockfileVersion"], 1);
    assert!(value["packages"]["zlib"].get("dependencies").is_none());
    assert_eq!(value["packages"]["alpha"]["dependencies"]["zlib"], "^1.0.0");
    assert_eq!(
        value["packages"]["alpha"]["resolved"],
        "https://git.example.com/alpha.git#v2.0.0"
    );
}

#[test]
fn test_read_absent_and_corrupt() {
    let dir = TempDir::new().unwrap();
    let lockfile = Lockfile::new(dir.path());
    assert!(lockfile.read().unwrap().is_none());

    fs::write(lockfile.path(), "lockfileVersion = 1").unwrap();
    assert!(matches!(lockfile.read(), Err(LockfileError::Corrupt { .. })));

    fs::write(
        lockfile.path(),
        r#"{"lockfileVersion": 1, "packages": {"a": {"version": 3}}}"#,
    )
    .unwrap();
    assert!(matches!(lockfile.read(), Err(LockfileError::Corrupt { .. })));
}

#[test]
fn test_read_keeps_invalid_records_for_validation() {
    let dir = TempDir::new().unwrap();
    let lockfile = Lockfile::new(dir.path());

    fs::write(lockfile.path(), r#"{"lockfileVersion": 2, "packages": {}}"#).unwrap();
    let record = lockfile.read().unwrap().unwrap();
    assert!(matches!(
        record.validate(),
        Err(LockfileError::UnsupportedVersion { found: Some(2) })
    ));

    fs::write(lockfile.path(), r#"{"lockfileVersion": 1, "packages": "none"}"#).unwrap();
    let record = lockfile.read().unwrap().unwrap();
    assert!(matches!(record.validate(), Err(LockfileError::Malformed)));
}

#[test]
fn test_get_package() {
    let set: InstallSet = sample().into_iter().collect();
    let record = LockfileRecord::from_install_set(&set);

    assert_eq!(record.get_package("mid").unwrap().version, "1.0.0");
    assert!(record.get_package("missing").is_none());
}

#[test]
fn test_write_replaces_previous() {
    let dir = TempDir::new().unwrap();
    let lockfile = Lockfile::new(dir.path());

    lockfile.write(&sample().into_iter().collect()).unwrap();
    let mut smaller = InstallSet::new();
    smaller.insert("mid".to_string(), entry("mid", "1.1.0", &[]));
    lockfile.write(&smaller).unwrap();

    let record = lockfile.read().unwrap().unwrap();
    let packages = record.packages.unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages["mid"].version, "1.1.0");

    // Only the lockfile remains; the staging file was renamed into place
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}
