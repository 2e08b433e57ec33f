//! Publish command
//!
//! Tags the project's repository with `v<version>`, pushes the tag and
//! records the version in the registry.

use crate::git::{FetchError, SourceControl};
use crate::manifest::{ManifestError, ProjectManifest};
use crate::registry::{Locator, RegistryError, RegistryProvider, VersionRecord};
use chrono::Utc;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur during publishing
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Source-control query failed
    #[error(transparent)]
    Git(#[from] FetchError),

    #[error("Not a git repository. Initialize with: git init")]
    NotARepository,

    #[error("Working directory is not clean. Commit or stash changes before publishing.")]
    DirtyWorkingTree,

    #[error("No git remote configured. Add remote with: git remote add origin <url>")]
    NoRemote,

    #[error("Version {version} of {name} already published. Update version in package.json.")]
    AlreadyPublished { name: String, version: String },

    #[error("Failed to create tag {tag}: {source}")]
    TagFailed {
        tag: String,
        #[source]
        source: FetchError,
    },

    /// Push failed; the local tag has been removed again
    #[error("Failed to push tag {tag}: {source}")]
    PushFailed {
        tag: String,
        #[source]
        source: FetchError,
    },
}

/// Publish result
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub name: String,
    pub version: String,

    /// Where the version can be fetched from
    pub locator: Locator,

    /// True if this was the package's first version
    pub new_package: bool,
}

/// Publish the project at `project` to the registry
pub fn publish(
    project: &Path,
    registry: &dyn RegistryProvider,
    scm: &dyn SourceControl,
) -> Result<PublishReport, PublishError> {
    let manifest = ProjectManifest::load(project)?;
    let (name, version) = manifest.validate_for_publish()?;
    info!("Publishing {}@{}...", name, version);

    if !project.join(".git").exists() {
        return Err(PublishError::NotARepository);
    }
    if !scm.is_clean(project)? {
        return Err(PublishError::DirtyWorkingTree);
    }
    let remote = scm.remote_url(project)?.ok_or(PublishError::NoRemote)?;
    info!("Git remote: {}", remote);

    let mut view = registry.load()?;
    let new_package = !view.contains(name);
    if new_package {
        info!("Adding new package: {}", name);
    } else if view
        .get(name)
        .is_some_and(|p| p.versions.contains_key(version))
    {
        return Err(PublishError::AlreadyPublished {
            name: name.to_string(),
            version: version.to_string(),
        });
    }

    let tag = format!("v{}", version);
    info!("Creating tag: {}", tag);
    scm.create_tag(project, &tag, &format!("Release {}", version))
        .map_err(|source| PublishError::TagFailed {
            tag: tag.clone(),
            source,
        })?;

    info!("Pushing tag to remote...");
    if let Err(source) = scm.push_tags(project) {
        if let Err(e) = scm.delete_tag(project, &tag) {
            warn!("Could not remove local tag {}: {}", tag, e);
        }
        return Err(PublishError::PushFailed { tag, source });
    }

    let mut record = VersionRecord::new(version, &remote);
    record.tag = Some(tag);
    record.dependencies = manifest.dependencies();
    record.published_at = Some(Utc::now());
    let locator = record.locator(version);

    view.publish(name, record);
    registry.save(&view)?;
    info!("Published {}@{}", name, version);

    Ok(PublishReport {
        name: name.to_string(),
        version: version.to_string(),
        locator,
        new_package,
    })
}
