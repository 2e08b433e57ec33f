//! Update command
//!
//! Raises dependency ranges to `^<latest>` when the registry has a version
//! newer than the best match for the current range, then reinstalls.

use super::install::{install, InstallError, InstallOptions, InstallReport};
use super::InstallContext;
use crate::manifest::{ManifestError, ProjectManifest};
use crate::range::{RangeError, VersionRange};
use crate::registry::{PackageRecord, RegistryError, RegistryView};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur during update
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Install(#[from] InstallError),

    /// The named package is not declared in package.json
    #[error("Package {0} not found in dependencies")]
    NotADependency(String),

    /// A published version string could not be parsed
    #[error("Invalid published version for {name}: {source}")]
    InvalidVersion {
        name: String,
        #[source]
        source: RangeError,
    },
}

/// One rewritten dependency range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeChange {
    pub name: String,
    pub from: String,
    pub to: String,
}

/// Update result
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// Ranges that were raised
    pub changes: Vec<RangeChange>,

    /// Dependencies the registry does not know
    pub skipped: Vec<String>,

    /// Reinstall result, present when any range changed
    pub install: Option<InstallReport>,
}

/// Newest published version, if it is newer than the best match for `range`
fn newer_version(
    name: &str,
    range: &str,
    record: &PackageRecord,
) -> Result<Option<String>, UpdateError> {
    let versions = record
        .parsed_versions()
        .map_err(|source| UpdateError::InvalidVersion {
            name: name.to_string(),
            source,
        })?;

    let Some((latest, _, _)) = versions.first() else {
        return Ok(None);
    };

    let range = match VersionRange::parse(range) {
        Ok(range) => range,
        Err(e) => {
            warn!("Cannot check {} for updates: {}", name, e);
            return Ok(None);
        }
    };

    let current = range.max_satisfying(versions.iter().map(|(v, _, _)| v));
    Ok(match current {
        Some(current) if latest > current => Some(latest.to_string()),
        _ => None,
    })
}

fn check(
    name: &str,
    range: &str,
    view: &RegistryView,
    report: &mut UpdateReport,
) -> Result<Option<String>, UpdateError> {
    let Some(record) = view.get(name) else {
        warn!("Package {} not found in registry", name);
        report.skipped.push(name.to_string());
        return Ok(None);
    };

    let Some(latest) = newer_version(name, range, record)? else {
        return Ok(None);
    };

    let to = format!("^{}", latest);
    info!("Updated {} to {}", name, to);
    report.changes.push(RangeChange {
        name: name.to_string(),
        from: range.to_string(),
        to: to.clone(),
    });
    Ok(Some(to))
}

/// Update one dependency (or all of them) and reinstall if anything changed
pub fn update(
    project: &Path,
    package: Option<&str>,
    ctx: &InstallContext<'_>,
    options: &InstallOptions,
) -> Result<UpdateReport, UpdateError> {
    let mut manifest = ProjectManifest::load(project)?;
    let dependencies = manifest.dependencies();
    let mut report = UpdateReport::default();

    if dependencies.is_empty() {
        info!("No dependencies to update");
        return Ok(report);
    }

    let targets: Vec<(&String, &String)> = match package {
        Some(name) => {
            let entry = dependencies
                .get_key_value(name)
                .ok_or_else(|| UpdateError::NotADependency(name.to_string()))?;
            info!("Checking for updates to {}...", name);
            vec![entry]
        }
        None => {
            info!("Checking for updates...");
            dependencies.iter().collect()
        }
    };

    let view = ctx.registry.load()?;
    for (name, range) in targets {
        if let Some(to) = check(name, range, &view, &mut report)? {
            manifest.set_dependency(name, &to);
        }
    }

    if report.changes.is_empty() {
        info!("All dependencies are up to date");
        return Ok(report);
    }

    manifest.save(project)?;
    info!("Reinstalling dependencies...");
    report.install = Some(install(project, None, ctx, options)?);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::VersionRecord;

    fn record(versions: &[&str]) -> PackageRecord {
        let mut record = PackageRecord::new("pkg");
        for v in versions {
            record
                .versions
                .insert(v.to_string(), VersionRecord::new(v, "https://x/pkg.git"));
        }
        record
    }

    #[test]
    fn test_newer_version() {
        let record = record(&["1.0.0", "1.4.0", "2.1.0"]);
        assert_eq!(
            newer_version("pkg", "^1.0.0", &record).unwrap(),
            Some("2.1.0".to_string())
        );
        assert_eq!(newer_version("pkg", "^2.0.0", &record).unwrap(), None);
        // nothing matches the current range, so nothing to compare with
        assert_eq!(newer_version("pkg", "^3.0.0", &record).unwrap(), None);
    }
}
