//! Shared fixtures for integration tests

#![allow(dead_code)]

use soso_pm::{
    FallbackError, FallbackInstaller, FetchError, Fetcher, Locator, RegistryView, VersionRecord,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn git_url(name: &str) -> String {
    format!("https://git.example.com/{}.git", name)
}

/// Publish `name@version` with the given dependency ranges
pub fn publish(view: &mut RegistryView, name: &str, version: &str, deps: &[(&str, &str)]) {
    let mut record = VersionRecord::new(version, &git_url(name));
    for (dep, range) in deps {
        record = record.with_dependency(dep, range);
    }
    view.publish(name, record);
}

pub fn ranges(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(n, r)| (n.to_string(), r.to_string()))
        .collect()
}

/// Write a package.json with the given dependencies
pub fn write_manifest(project: &Path, name: &str, deps: &[(&str, &str)]) {
    let manifest = serde_json::json!({
        "name": name,
        "version": "1.0.0",
        "dependencies": ranges(deps),
    });
    fs::write(
        project.join("package.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}

pub fn read_manifest_deps(project: &Path) -> BTreeMap<String, String> {
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(project.join("package.json")).unwrap()).unwrap();
    serde_json::from_value(raw["dependencies"].clone()).unwrap()
}

/// Fetcher that materializes a small package tree for any locator
///
/// The tree's manifest records the locator so tests can tell versions apart.
#[derive(Default)]
pub struct FakeFetcher {
    pub fetches: AtomicUsize,
    pub failing: Mutex<Vec<String>>,
    pub without_manifest: Mutex<Vec<String>>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fail_on(&self, url: &str) {
        self.failing.lock().unwrap().push(url.to_string());
    }

    /// Produce trees with no package.json for `url`
    pub fn omit_manifest_on(&self, url: &str) {
        self.without_manifest.lock().unwrap().push(url.to_string());
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, locator: &Locator, destination: &Path) -> Result<(), FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&locator.url) {
            return Err(FetchError::CommandFailed {
                command: format!("clone {}", locator),
                stderr: "repository not found".to_string(),
            });
        }

        self.fetched.lock().unwrap().push(locator.to_string());
        fs::create_dir_all(destination.join(".git")).unwrap();
        fs::create_dir_all(destination.join("lib")).unwrap();
        fs::write(destination.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        if !self.without_manifest.lock().unwrap().contains(&locator.url) {
            fs::write(
                destination.join("package.json"),
                serde_json::json!({ "locator": locator.to_string() }).to_string(),
            )
            .unwrap();
        }
        fs::write(destination.join("lib/index.js"), "module.exports = {};\n").unwrap();
        Ok(())
    }
}

/// Fallback installer that records its calls
#[derive(Default)]
pub struct RecordingFallback {
    pub calls: Mutex<Vec<(String, String)>>,
    pub unknown: Vec<String>,
}

impl FallbackInstaller for RecordingFallback {
    fn install(&self, name: &str, range: &str, _project: &Path) -> Result<(), FallbackError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), range.to_string()));
        if self.unknown.iter().any(|n| n == name) {
            return Err(FallbackError::NotFound {
                name: name.to_string(),
                stderr: "404".to_string(),
            });
        }
        Ok(())
    }
}
