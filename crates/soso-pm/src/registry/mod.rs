//! Registry view
//!
//! The read-only mapping from package name to published versions that the
//! resolver consumes, plus the provider seam that loads and saves it.

mod file;

pub use file::FileRegistry;

use crate::range::{parse_version, RangeError};
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or saving the registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// IO error on the registry file
    #[error("Failed to access registry at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Registry file is not valid JSON of the expected shape
    #[error("Failed to parse registry at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Registry could not be serialized
    #[error("Failed to serialize registry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Source of the registry view
///
/// Only the publish path mutates the registry; everything else loads it.
pub trait RegistryProvider {
    /// Load the current registry view
    fn load(&self) -> Result<RegistryView, RegistryError>;

    /// Persist a registry view
    fn save(&self, view: &RegistryView) -> Result<(), RegistryError>;
}

/// All known packages
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistryView {
    #[serde(default)]
    pub packages: BTreeMap<String, PackageRecord>,
}

/// A package and its published versions
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackageRecord {
    /// Package name
    #[serde(default)]
    pub name: String,

    /// Published versions, keyed by version string
    #[serde(default)]
    pub versions: BTreeMap<String, VersionRecord>,
}

/// One published version
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    /// Version string (mirrors the map key)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Source-control URL the version is fetched from
    pub git_url: String,

    /// Tag marking the version in source control
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Dependencies (name -> range)
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    /// When the version was published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Where a version's contents come from: a repository URL and optional tag
///
/// The textual form is `<url>#<tag>`, or just `<url>` when untagged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub url: String,
    pub tag: Option<String>,
}

impl RegistryView {
    /// Create an empty registry view
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a package
    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.get(name)
    }

    /// Check whether a package is known
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Sorted package names
    pub fn names(&self) -> Vec<&str> {
        self.packages.keys().map(String::as_str).collect()
    }

    /// Insert a version, creating the package record if needed
    pub fn publish(&mut self, name: &str, record: VersionRecord) {
        let package = self
            .packages
            .entry(name.to_string())
            .or_insert_with(|| PackageRecord::new(name));
        package.versions.insert(record.version.clone(), record);
    }
}

impl PackageRecord {
    /// Create a package record with no versions
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            versions: BTreeMap::new(),
        }
    }

    /// Parsed versions, highest precedence first
    pub fn parsed_versions(&self) -> Result<Vec<(Version, &str, &VersionRecord)>, RangeError> {
        let mut parsed = self
            .versions
            .iter()
            .map(|(key, record)| parse_version(key).map(|v| (v, key.as_str(), record)))
            .collect::<Result<Vec<_>, _>>()?;

        parsed.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(parsed)
    }

    /// Find the record for a parsed version
    pub fn version_record(&self, version: &Version) -> Option<(&str, &VersionRecord)> {
        self.versions
            .iter()
            .find(|(key, _)| parse_version(key).ok().as_ref() == Some(version))
            .map(|(key, record)| (key.as_str(), record))
    }
}

impl VersionRecord {
    /// Create a record for a freshly published version
    pub fn new(version: &str, git_url: &str) -> Self {
        Self {
            version: version.to_string(),
            git_url: git_url.to_string(),
            tag: Some(format!("v{}", version)),
            dependencies: BTreeMap::new(),
            published_at: None,
        }
    }

    /// Add a dependency range
    pub fn with_dependency(mut self, name: &str, range: &str) -> Self {
        self.dependencies.insert(name.to_string(), range.to_string());
        self
    }

    /// Fetch locator for this version; untagged records use `v<version>`
    pub fn locator(&self, version_key: &str) -> Locator {
        Locator {
            url: self.git_url.clone(),
            tag: Some(
                self.tag
                    .clone()
                    .unwrap_or_else(|| format!("v{}", version_key)),
            ),
        }
    }
}

impl Locator {
    /// Parse the textual `<url>#<tag>` form
    pub fn parse(s: &str) -> Self {
        match s.rsplit_once('#') {
            Some((url, tag)) if !tag.is_empty() => Locator {
                url: url.to_string(),
                tag: Some(tag.to_string()),
            },
            Some((url, _)) => Locator {
                url: url.to_string(),
                tag: None,
            },
            None => Locator {
                url: s.to_string(),
                tag: None,
            },
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}#{}", self.url, tag),
            None => f.write_str(&self.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registry_json() {
        let json = r#"{
            "packages": {
                "left-pad": {
                    "name": "left-pad",
                    "versions": {
                        "1.0.0": {
                            "version": "1.0.0",
                            "gitUrl": "https://git.example.com/left-pad.git",
                            "tag": "v1.0.0",
                            "dependencies": { "pad-core": "^2.0.0" },
                            "publishedAt": "2024-03-01T12:00:00Z"
                        }
                    }
                }
            }
        }"#;

        let view: RegistryView = serde_json::from_str(json).unwrap();
        let record = &view.get("left-pad").unwrap().versions["1.0.0"];
        assert_eq!(record.dependencies["pad-core"], "^2.0.0");
        assert!(record.published_at.is_some());
    }

    #[test]
    fn test_parsed_versions_descending() {
        let mut package = PackageRecord::new("b");
        for v in ["2.3.0", "2.10.0", "2.5.0"] {
            package
                .versions
                .insert(v.to_string(), VersionRecord::new(v, "https://x/b.git"));
        }

        let order: Vec<String> = package
            .parsed_versions()
            .unwrap()
            .into_iter()
            .map(|(v, _, _)| v.to_string())
            .collect();
        assert_eq!(order, vec!["2.10.0", "2.5.0", "2.3.0"]);
    }

    #[test]
    fn test_locator_text_form() {
        let record = VersionRecord {
            tag: None,
            ..VersionRecord::new("1.2.0", "https://x/a.git")
        };
        let locator = record.locator("1.2.0");
        assert_eq!(locator.to_string(), "https://x/a.git#v1.2.0");
        assert_eq!(Locator::parse(&locator.to_string()), locator);
        assert_eq!(Locator::parse("https://x/a.git").tag, None);
    }
}
