//! Info command
//!
//! Summarises a package's published versions.

use crate::range::RangeError;
use crate::registry::{Locator, RegistryView};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfoError {
    /// Name has no package record
    #[error("Package not found: {name}")]
    NotFound {
        name: String,
        /// Every known package name, sorted
        available: Vec<String>,
    },

    #[error("Invalid published version for {name}: {source}")]
    InvalidVersion {
        name: String,
        #[source]
        source: RangeError,
    },
}

/// One published version
#[derive(Debug, Clone, PartialEq)]
pub struct VersionSummary {
    pub version: String,
    pub latest: bool,
    pub locator: Locator,
    pub published_at: Option<DateTime<Utc>>,
    pub dependencies: BTreeMap<String, String>,
}

/// A package and its versions, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct PackageSummary {
    pub name: String,
    pub versions: Vec<VersionSummary>,
}

/// Summarise a package from the registry view
pub fn package_info(view: &RegistryView, name: &str) -> Result<PackageSummary, InfoError> {
    let record = view.get(name).ok_or_else(|| InfoError::NotFound {
        name: name.to_string(),
        available: view.names().into_iter().map(String::from).collect(),
    })?;

    let versions = record
        .parsed_versions()
        .map_err(|source| InfoError::InvalidVersion {
            name: name.to_string(),
            source,
        })?
        .into_iter()
        .enumerate()
        .map(|(i, (_, key, version))| VersionSummary {
            version: key.to_string(),
            latest: i == 0,
            locator: version.locator(key),
            published_at: version.published_at,
            dependencies: version.dependencies.clone(),
        })
        .collect();

    let display_name = if record.name.is_empty() {
        name.to_string()
    } else {
        record.name.clone()
    };

    Ok(PackageSummary {
        name: display_name,
        versions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::VersionRecord;

    #[test]
    fn test_versions_newest_first() {
        let mut view = RegistryView::new();
        for v in ["1.0.0", "1.10.0", "1.2.0"] {
            view.publish("pkg", VersionRecord::new(v, "https://x/pkg.git"));
        }

        let summary = package_info(&view, "pkg").unwrap();
        let order: Vec<&str> = summary.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(order, vec!["1.10.0", "1.2.0", "1.0.0"]);
        assert!(summary.versions[0].latest);
        assert!(!summary.versions[1].latest);
        assert_eq!(
            summary.versions[0].locator.to_string(),
            "https://x/pkg.git#v1.10.0"
        );
    }

    #[test]
    fn test_not_found_lists_available() {
        let mut view = RegistryView::new();
        view.publish("zeta", VersionRecord::new("1.0.0", "https://x/z.git"));
        view.publish("alpha", VersionRecord::new("1.0.0", "https://x/a.git"));

        match package_info(&view, "missing") {
            Err(InfoError::NotFound { available, .. }) => {
                assert_eq!(available, vec!["alpha", "zeta"]);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
