//! JSON file registry provider

use super::{RegistryError, RegistryProvider, RegistryView};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Registry persisted as a single JSON document (`registry.json`)
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    /// Create a provider for the given registry file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the registry file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> RegistryError {
        RegistryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl RegistryProvider for FileRegistry {
    fn load(&self) -> Result<RegistryView, RegistryError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "registry file missing, using empty registry");
            return Ok(RegistryView::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, view: &RegistryView) -> Result<(), RegistryError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let json = serde_json::to_string_pretty(view)?;

        // Write to a temporary file first, then move over the old registry
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        debug!(path = %self.path.display(), packages = view.packages.len(), "saved registry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::VersionRecord;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let registry = FileRegistry::new(dir.path().join("registry.json"));
        assert!(registry.load().unwrap().packages.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let registry = FileRegistry::new(dir.path().join("nested").join("registry.json"));

        let mut view = RegistryView::new();
        view.publish(
            "alpha",
            VersionRecord::new("1.0.0", "https://git.example.com/alpha.git")
                .with_dependency("beta", "^2.0.0"),
        );
        registry.save(&view).unwrap();

        assert_eq!(registry.load().unwrap(), view);
    }

    #[test]
    fn test_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "{ not json").unwrap();

        let result = FileRegistry::new(&path).load();
        assert!(matches!(result, Err(RegistryError::Parse { .. })));
    }
}
