//! Cache entry metadata
//!
//! Written next to each entry's package tree when the entry is populated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during metadata operations
#[derive(Debug, Error)]
pub enum MetadataError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Metadata for a cached package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    /// Package name
    pub name: String,

    /// Package version
    pub version: String,

    /// Integrity digest computed when the entry was populated
    pub integrity: String,

    /// When the entry was populated
    pub cached_at: DateTime<Utc>,
}

impl EntryMetadata {
    /// Create metadata stamped with the current time
    pub fn new(name: &str, version: &str, integrity: String) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            integrity,
            cached_at: Utc::now(),
        }
    }

    /// Load metadata from a JSON file
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let contents = fs::read_to_string(path)?;
        let metadata = serde_json::from_str(&contents)?;
        Ok(metadata)
    }

    /// Save metadata to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), MetadataError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
