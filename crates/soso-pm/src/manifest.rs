//! Project manifest (package.json)
//!
//! Only `name`, `version` and `dependencies` are interpreted; every other
//! field is carried through untouched when the manifest is rewritten.

use crate::range::parse_version;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Manifest file name inside a project directory
pub const MANIFEST_NAME: &str = "package.json";

/// Errors that can occur during manifest handling
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No manifest in the project directory
    #[error("No package.json found in {}", .0.display())]
    NotFound(PathBuf),

    /// Failed to read or write the manifest
    #[error("Failed to access manifest at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid JSON of the expected shape
    #[error("Failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Top level is not a JSON object
    #[error("Manifest at {0} is not a JSON object")]
    NotAnObject(PathBuf),

    /// Missing required field
    #[error("package.json missing required field: {0}")]
    MissingField(&'static str),

    /// Name does not follow the naming rules
    #[error("Invalid package name: {0}. Use lowercase letters, numbers, and hyphens. Scoped packages: @scope/name")]
    InvalidName(String),

    /// Version is not valid semver
    #[error("Invalid version: {0}. Must follow semver (e.g., 1.2.3)")]
    InvalidVersion(String),

    /// Failed to serialize the manifest
    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Project manifest
///
/// The parsed document is kept whole so a rewrite reproduces every field in
/// its original order; only `dependencies` is ever edited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectManifest {
    document: Map<String, Value>,
}

fn name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(@[a-z0-9-]+/)?[a-z0-9-]+$").ok())
        .as_ref()
}

/// Check a publishable package name (`name` or `@scope/name`)
pub fn is_valid_package_name(name: &str) -> bool {
    name_pattern().is_some_and(|re| re.is_match(name))
}

impl ProjectManifest {
    /// Path of the manifest for a project directory
    pub fn path_in(project_dir: &Path) -> PathBuf {
        project_dir.join(MANIFEST_NAME)
    }

    /// Load the manifest of a project directory
    pub fn load(project_dir: &Path) -> Result<Self, ManifestError> {
        let path = Self::path_in(project_dir);
        if !path.is_file() {
            return Err(ManifestError::NotFound(project_dir.to_path_buf()));
        }

        let content = fs::read_to_string(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
            path: path.clone(),
            source,
        })?;
        let Value::Object(document) = value else {
            return Err(ManifestError::NotAnObject(path));
        };
        if let Some(deps) = document.get("dependencies") {
            serde_json::from_value::<BTreeMap<String, String>>(deps.clone())
                .map_err(|source| ManifestError::Parse { path, source })?;
        }
        Ok(Self { document })
    }

    /// Save the manifest as 2-space pretty JSON with a trailing newline
    pub fn save(&self, project_dir: &Path) -> Result<(), ManifestError> {
        let path = Self::path_in(project_dir);
        let mut json = serde_json::to_string_pretty(&self.document)?;
        json.push('\n');
        fs::write(&path, json).map_err(|source| ManifestError::Io { path, source })
    }

    /// `name` field, if it is a string
    pub fn name(&self) -> Option<&str> {
        self.document.get("name").and_then(Value::as_str)
    }

    /// `version` field, if it is a string
    pub fn version(&self) -> Option<&str> {
        self.document.get("version").and_then(Value::as_str)
    }

    /// Declared dependencies, empty if the field is absent
    pub fn dependencies(&self) -> BTreeMap<String, String> {
        self.document
            .get("dependencies")
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .filter_map(|(name, range)| Some((name.clone(), range.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Edit the `dependencies` object, creating it at the end if absent
    fn edit_dependencies<R>(&mut self, edit: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        let mut deps = match self.document.get_mut("dependencies") {
            Some(Value::Object(deps)) => std::mem::take(deps),
            _ => Map::new(),
        };
        let result = edit(&mut deps);
        self.document
            .insert("dependencies".to_string(), Value::Object(deps));
        result
    }

    /// Add a dependency unless it is already declared
    ///
    /// Returns true if the manifest changed. New names go after existing ones.
    pub fn add_dependency(&mut self, name: &str, range: &str) -> bool {
        self.edit_dependencies(|deps| {
            if deps.contains_key(name) {
                return false;
            }
            deps.insert(name.to_string(), Value::String(range.to_string()));
            true
        })
    }

    /// Set a dependency's range, keeping its position if already declared
    pub fn set_dependency(&mut self, name: &str, range: &str) {
        self.edit_dependencies(|deps| {
            deps.insert(name.to_string(), Value::String(range.to_string()));
        });
    }

    /// Validate the fields publishing needs, returning `(name, version)`
    pub fn validate_for_publish(&self) -> Result<(&str, &str), ManifestError> {
        let name = self
            .name()
            .filter(|n| !n.is_empty())
            .ok_or(ManifestError::MissingField("name"))?;
        let version = self
            .version()
            .filter(|v| !v.is_empty())
            .ok_or(ManifestError::MissingField("version"))?;

        if !is_valid_package_name(name) {
            return Err(ManifestError::InvalidName(name.to_string()));
        }
        if parse_version(version).is_err() {
            return Err(ManifestError::InvalidVersion(version.to_string()));
        }

        Ok((name, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, content: &str) {
        fs::write(dir.join(MANIFEST_NAME), content).unwrap();
    }

    fn read(dir: &Path) -> String {
        fs::read_to_string(dir.join(MANIFEST_NAME)).unwrap()
    }

    fn manifest(value: Value) -> ProjectManifest {
        let dir = TempDir::new().unwrap();
        write(dir.path(), &value.to_string());
        ProjectManifest::load(dir.path()).unwrap()
    }

    #[test]
    fn test_unknown_fields_survive_rewrite() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            r#"{"name":"app","version":"1.0.0","scripts":{"start":"node ."},"dependencies":{"zeta":"^1.0.0"},"private":true,"author":"someone"}"#,
        );

        let mut manifest = ProjectManifest::load(dir.path()).unwrap();
        assert!(manifest.add_dependency("left-pad", "*"));
        assert!(!manifest.add_dependency("left-pad", "^2.0.0"));
        manifest.save(dir.path()).unwrap();

        let content = read(dir.path());
        let raw: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(raw["scripts"]["start"], "node .");
        assert_eq!(raw["private"], true);
        assert_eq!(raw["dependencies"]["left-pad"], "*");

        // Keys keep their original order, new dependencies go last
        let order: Vec<usize> = [
            "\"name\"",
            "\"version\"",
            "\"scripts\"",
            "\"dependencies\"",
            "\"zeta\"",
            "\"left-pad\"",
            "\"private\"",
            "\"author\"",
        ]
        .iter()
        .map(|key| content.find(key).unwrap())
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{}", content);
        assert!(content.ends_with("}\n"));
    }

    #[test]
    fn test_set_dependency_keeps_position() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            r#"{"dependencies":{"zeta":"^1.0.0","alpha":"^1.0.0"}}"#,
        );

        let mut manifest = ProjectManifest::load(dir.path()).unwrap();
        manifest.set_dependency("zeta", "^2.0.0");
        manifest.save(dir.path()).unwrap();

        let content = read(dir.path());
        assert!(content.find("\"zeta\": \"^2.0.0\"").unwrap() < content.find("\"alpha\"").unwrap());
    }

    #[test]
    fn test_rejects_malformed_documents() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "[1, 2]");
        assert!(matches!(
            ProjectManifest::load(dir.path()),
            Err(ManifestError::NotAnObject(_))
        ));

        write(dir.path(), r#"{"dependencies":{"a":1}}"#);
        assert!(matches!(
            ProjectManifest::load(dir.path()),
            Err(ManifestError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ProjectManifest::load(dir.path()),
            Err(ManifestError::NotFound(_))
        ));
    }

    #[test]
    fn test_validate_package_name() {
        assert!(is_valid_package_name("my-package"));
        assert!(is_valid_package_name("@org/pkg-2"));
        assert!(!is_valid_package_name("My_Package"));
        assert!(!is_valid_package_name("@org/"));
        assert!(!is_valid_package_name(""));
    }

    #[test]
    fn test_validate_for_publish() {
        let missing = manifest(serde_json::json!({ "name": "pkg" }));
        assert!(matches!(
            missing.validate_for_publish(),
            Err(ManifestError::MissingField("version"))
        ));

        let short = manifest(serde_json::json!({ "name": "pkg", "version": "1.0" }));
        assert!(matches!(
            short.validate_for_publish(),
            Err(ManifestError::InvalidVersion(_))
        ));

        let valid = manifest(serde_json::json!({ "name": "pkg", "version": "1.0.0" }));
        assert_eq!(valid.validate_for_publish().unwrap(), ("pkg", "1.0.0"));
    }
}
