//! Lockfile management (soso-lock.json)
//!
//! Records the exact version, locator and integrity digest of every installed
//! package so repeated installs are reproducible without re-resolving.

use crate::range::{parse_version, VersionRange};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Lockfile name inside a project directory
pub const LOCKFILE_NAME: &str = "soso-lock.json";

/// Lockfile format version
pub const LOCKFILE_VERSION: u32 = 1;

/// Errors that can occur during lockfile operations
#[derive(Debug, Error)]
pub enum LockfileError {
    /// Failed to read or write the lockfile
    #[error("Failed to access lockfile at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Content is not a lockfile record
    #[error("Lockfile at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// `packages` is missing or not a mapping
    #[error("Invalid lockfile format: missing packages")]
    Malformed,

    /// `lockfileVersion` is not the supported value
    #[error("Unsupported lockfile version: {}", .found.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string()))]
    UnsupportedVersion { found: Option<u32> },

    /// Failed to serialize the lockfile
    #[error("Failed to serialize lockfile: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// How a loaded lockfile is compared with the manifest's dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Locked names have the same count as, and include, the current names
    #[default]
    NameSet,

    /// Locked versions satisfy every current and transitive range, and every
    /// locked entry is reachable from the current dependencies
    Satisfies,
}

/// One locked package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockEntry {
    /// Exact version
    pub version: String,

    /// Fetch locator (`<url>#<tag>`)
    pub resolved: String,

    /// Integrity digest (`sha256-<base64>`)
    pub integrity: String,

    /// Direct dependency ranges of this version
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
}

/// Packages handed to [`Lockfile::write`], in any order
pub type InstallSet = HashMap<String, LockEntry>;

/// Persisted lockfile record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LockfileRecord {
    /// Format version; anything that is not an integer reads as absent
    #[serde(default, deserialize_with = "lenient_version")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockfile_version: Option<u32>,

    /// Locked packages; absent when missing or not a mapping
    #[serde(default, deserialize_with = "lenient_packages")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages: Option<BTreeMap<String, LockEntry>>,
}

fn lenient_version<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_u64().and_then(|v| u32::try_from(v).ok()))
}

fn lenient_packages<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, LockEntry>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => serde_json::from_value(Value::Object(map))
            .map(Some)
            .map_err(D::Error::custom),
        _ => Ok(None),
    }
}

impl LockfileRecord {
    /// Build a current-version record from an install set
    pub fn from_install_set(set: &InstallSet) -> Self {
        let packages = set
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();

        Self {
            lockfile_version: Some(LOCKFILE_VERSION),
            packages: Some(packages),
        }
    }

    /// Serialize as 2-space pretty JSON with a trailing newline
    pub fn to_json_string(&self) -> Result<String, LockfileError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Check the version and the shape of `packages`
    pub fn validate(&self) -> Result<(), LockfileError> {
        if self.lockfile_version != Some(LOCKFILE_VERSION) {
            return Err(LockfileError::UnsupportedVersion {
                found: self.lockfile_version,
            });
        }

        if self.packages.is_none() {
            return Err(LockfileError::Malformed);
        }

        Ok(())
    }

    /// Look up a locked package
    pub fn get_package(&self, name: &str) -> Option<&LockEntry> {
        self.packages.as_ref().and_then(|p| p.get(name))
    }

    /// Check whether the record still describes `current` (name -> range)
    pub fn matches(&self, current: &BTreeMap<String, String>, mode: MatchMode) -> bool {
        let Some(packages) = &self.packages else {
            return false;
        };

        match mode {
            MatchMode::NameSet => {
                packages.len() == current.len()
                    && current.keys().all(|name| packages.contains_key(name))
            }
            MatchMode::Satisfies => ranges_hold(packages, current),
        }
    }
}

fn locked_satisfies(packages: &BTreeMap<String, LockEntry>, name: &str, range: &str) -> bool {
    let Some(entry) = packages.get(name) else {
        return false;
    };

    match (VersionRange::parse(range), parse_version(&entry.version)) {
        (Ok(range), Ok(version)) => range.satisfies(&version),
        _ => false,
    }
}

fn ranges_hold(packages: &BTreeMap<String, LockEntry>, current: &BTreeMap<String, String>) -> bool {
    if !current
        .iter()
        .all(|(name, range)| locked_satisfies(packages, name, range))
    {
        return false;
    }

    let transitive_ok = packages.values().all(|entry| {
        entry
            .dependencies
            .iter()
            .all(|(name, range)| locked_satisfies(packages, name, range))
    });
    if !transitive_ok {
        return false;
    }

    // Every locked entry must be reachable from the current roots
    let mut reached: BTreeSet<&str> = BTreeSet::new();
    let mut stack: Vec<&str> = current.keys().map(String::as_str).collect();
    while let Some(name) = stack.pop() {
        if !reached.insert(name) {
            continue;
        }
        if let Some(entry) = packages.get(name) {
            stack.extend(entry.dependencies.keys().map(String::as_str));
        }
    }

    reached.len() == packages.len()
}

/// Lockfile of one project directory
#[derive(Debug, Clone)]
pub struct Lockfile {
    path: PathBuf,
}

impl Lockfile {
    /// Lockfile for the project at `project_dir`
    pub fn new(project_dir: &Path) -> Self {
        Self {
            path: project_dir.join(LOCKFILE_NAME),
        }
    }

    /// Path to the lockfile
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the lockfile exists
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn io_error(&self, source: io::Error) -> LockfileError {
        LockfileError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Read the persisted record, or `None` if there is no lockfile
    ///
    /// Content that is not a JSON object is `Corrupt`. A record that parses
    /// but fails [`LockfileRecord::validate`] is still returned.
    pub fn read(&self) -> Result<Option<LockfileRecord>, LockfileError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let corrupt = |reason: String| LockfileError::Corrupt {
            path: self.path.clone(),
            reason,
        };

        let value: Value = serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        if !value.is_object() {
            return Err(corrupt("top level is not an object".to_string()));
        }

        let record = serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;
        Ok(Some(record))
    }

    /// Write the install set, replacing any previous lockfile in one step
    pub fn write(&self, set: &InstallSet) -> Result<LockfileRecord, LockfileError> {
        debug!(packages = set.len(), path = %self.path.display(), "writing lockfile");

        let record = LockfileRecord::from_install_set(set);
        let json = record.to_json_string()?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        Ok(record)
    }

    /// Remove the lockfile; no-op if absent
    pub fn delete(&self) -> Result<(), LockfileError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
