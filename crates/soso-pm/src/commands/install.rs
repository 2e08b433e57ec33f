//! Install command
//!
//! Installs a project's dependencies from package.json and soso-lock.json.
//! Registry packages are resolved (or taken from the lockfile), served from
//! the cache or fetched into it, and copied into `node_modules`. Names the
//! registry does not know go to the fallback installer.

use super::InstallContext;
use crate::cache::{tree, CacheError, PackageCache, VCS_DIR};
use crate::config::{Config, CorruptLockfilePolicy};
use crate::fallback::FallbackError;
use crate::git::{FetchError, Fetcher};
use crate::lockfile::{InstallSet, LockEntry, Lockfile, LockfileError, LockfileRecord, MatchMode};
use crate::manifest::{ManifestError, ProjectManifest};
use crate::registry::{Locator, RegistryError, RegistryView};
use crate::resolver::{DependencyResolver, ResolverError, TraversalMode};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Directory packages are installed into
pub const NODE_MODULES: &str = "node_modules";

/// Errors that can occur during installation
#[derive(Debug, Error)]
pub enum InstallError {
    /// Manifest error
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Registry error
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Resolution error
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Lockfile error
    #[error(transparent)]
    Lockfile(#[from] LockfileError),

    /// A resolved version has no record in the registry
    #[error("Version {version} not found for {name}")]
    MissingVersion { name: String, version: String },

    /// The fetch collaborator could not retrieve a package
    #[error("Failed to fetch {name}@{version}: {source}")]
    FetchFailed {
        name: String,
        version: String,
        #[source]
        source: FetchError,
    },

    /// Cached content differs from the locked digest
    #[error("Integrity mismatch for {name}@{version}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        name: String,
        version: String,
        expected: String,
        actual: String,
    },

    /// A fallback package could not be installed
    #[error("Failed to install {name}: {source}")]
    FallbackFailed {
        name: String,
        #[source]
        source: FallbackError,
    },

    /// Failed to write into node_modules
    #[error("Failed to install into {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fetch pool could not be created
    #[error("Failed to start fetch workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Install options
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Fetch worker pool size
    pub jobs: usize,

    /// How a lockfile is compared with the manifest
    pub lockfile_match: MatchMode,

    /// What to do with an unreadable lockfile
    pub corrupt_lockfile: CorruptLockfilePolicy,

    /// Resolver traversal mode
    pub traversal: TraversalMode,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            lockfile_match: MatchMode::default(),
            corrupt_lockfile: CorruptLockfilePolicy::default(),
            traversal: TraversalMode::default(),
        }
    }
}

impl InstallOptions {
    /// Options taken from the resolved configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            jobs: config.jobs,
            lockfile_match: config.lockfile_match,
            corrupt_lockfile: config.corrupt_lockfile,
            traversal: config.traversal,
        }
    }
}

/// Where the installed registry versions came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    Lockfile,
    Resolver,
}

/// Install result
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// Registry packages installed (name -> version)
    pub packages: BTreeMap<String, String>,

    /// Number of packages served from the cache
    pub from_cache: usize,

    /// Number of packages fetched into the cache
    pub fetched: usize,

    /// Names installed through the fallback installer
    pub fallback: Vec<String>,

    /// Origin of the registry versions, if any were installed
    pub source: Option<VersionSource>,

    /// True if the requested package was added to package.json
    pub manifest_updated: bool,
}

/// A package chosen for installation
#[derive(Debug, Clone)]
struct Planned {
    name: String,
    version: String,
    locator: Locator,
    expected_integrity: Option<String>,
    dependencies: BTreeMap<String, String>,
}

/// Outcome of installing one package
struct Installed {
    name: String,
    entry: LockEntry,
    from_cache: bool,
}

/// Install a project's dependencies
///
/// With `package`, that name is first added to package.json with range `*`
/// unless already declared.
pub fn install(
    project: &Path,
    package: Option<&str>,
    ctx: &InstallContext<'_>,
    options: &InstallOptions,
) -> Result<InstallReport, InstallError> {
    let mut manifest = ProjectManifest::load(project)?;
    let mut report = InstallReport::default();

    if let Some(name) = package {
        info!("Installing {}...", name);
        if manifest.add_dependency(name, "*") {
            manifest.save(project)?;
            report.manifest_updated = true;
        }
    } else {
        info!("Installing dependencies...");
    }

    let dependencies = manifest.dependencies();
    if dependencies.is_empty() {
        info!("No dependencies to install");
        return Ok(report);
    }

    let view = ctx.registry.load()?;
    let (registry_roots, fallback_roots): (BTreeMap<_, _>, BTreeMap<_, _>) = dependencies
        .into_iter()
        .partition(|(name, _)| view.contains(name));

    if !registry_roots.is_empty() {
        let lockfile = Lockfile::new(project);
        let (plan, source) = match usable_lockfile(&lockfile, &registry_roots, options)? {
            Some(record) => (plan_from_lockfile(&record), VersionSource::Lockfile),
            None => (
                plan_from_registry(&view, &registry_roots, options.traversal)?,
                VersionSource::Resolver,
            ),
        };
        debug!(packages = plan.len(), ?source, "install plan ready");

        let modules = project.join(NODE_MODULES);
        fs::create_dir_all(&modules).map_err(|source| InstallError::Io {
            path: modules.clone(),
            source,
        })?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs.max(1))
            .build()?;
        let (cache, fetcher) = (ctx.cache, ctx.fetcher);
        let results = pool.install(|| {
            plan.par_iter()
                .map(|planned| install_one(planned, &modules, cache, fetcher))
                .collect::<Result<Vec<_>, _>>()
        })?;

        let mut set = InstallSet::new();
        for installed in results {
            if installed.from_cache {
                report.from_cache += 1;
            } else {
                report.fetched += 1;
            }
            report
                .packages
                .insert(installed.name.clone(), installed.entry.version.clone());
            set.insert(installed.name, installed.entry);
        }

        lockfile.write(&set)?;
        report.source = Some(source);
        info!("Installed {} soso packages", set.len());
    }

    if !fallback_roots.is_empty() {
        info!(
            "Found {} packages not in soso registry, trying npm...",
            fallback_roots.len()
        );
        for (name, range) in &fallback_roots {
            ctx.fallback
                .install(name, range, project)
                .map_err(|source| InstallError::FallbackFailed {
                    name: name.clone(),
                    source,
                })?;
            report.fallback.push(name.clone());
        }
    }

    Ok(report)
}

/// The lockfile record to install from, if it exists and still applies
fn usable_lockfile(
    lockfile: &Lockfile,
    roots: &BTreeMap<String, String>,
    options: &InstallOptions,
) -> Result<Option<LockfileRecord>, InstallError> {
    let checked = lockfile
        .read()
        .and_then(|record| record.map(|r| r.validate().map(|()| r)).transpose());

    let record = match checked {
        Ok(record) => record,
        Err(e) if options.corrupt_lockfile == CorruptLockfilePolicy::Reresolve => {
            warn!("Ignoring unusable lockfile: {}", e);
            None
        }
        Err(e) => return Err(e.into()),
    };

    Ok(record.filter(|r| {
        let matches = r.matches(roots, options.lockfile_match);
        if !matches {
            debug!("lockfile does not match dependencies, resolving");
        }
        matches
    }))
}

fn plan_from_lockfile(record: &LockfileRecord) -> Vec<Planned> {
    record
        .packages
        .iter()
        .flatten()
        .map(|(name, entry)| Planned {
            name: name.clone(),
            version: entry.version.clone(),
            locator: Locator::parse(&entry.resolved),
            expected_integrity: Some(entry.integrity.clone()),
            dependencies: entry.dependencies.clone(),
        })
        .collect()
}

fn plan_from_registry(
    view: &RegistryView,
    roots: &BTreeMap<String, String>,
    traversal: TraversalMode,
) -> Result<Vec<Planned>, InstallError> {
    info!("Resolving soso dependency tree...");
    let resolution = DependencyResolver::new(view)
        .with_mode(traversal)
        .resolve(roots)?;
    debug!("Resolved {} soso packages", resolution.len());

    resolution
        .resolved
        .iter()
        .map(|(name, version)| {
            let (key, record) = view
                .get(name)
                .and_then(|p| p.version_record(version))
                .ok_or_else(|| InstallError::MissingVersion {
                    name: name.clone(),
                    version: version.to_string(),
                })?;

            Ok(Planned {
                name: name.clone(),
                version: key.to_string(),
                locator: record.locator(key),
                expected_integrity: None,
                dependencies: record.dependencies.clone(),
            })
        })
        .collect()
}

/// Serve one package from the cache (fetching on a miss) into node_modules
fn install_one(
    planned: &Planned,
    modules: &Path,
    cache: &PackageCache,
    fetcher: &dyn Fetcher,
) -> Result<Installed, InstallError> {
    let name = planned.name.as_str();
    let version = planned.version.as_str();
    info!("Installing {}@{}...", name, version);

    let (source, from_cache) = match cache.get(name, version) {
        Some(path) => {
            debug!("Using cached {}@{}", name, version);
            (path, true)
        }
        None => {
            debug!("Fetching {}@{} from {}", name, version, planned.locator);
            let staging = cache.staging_dir()?;
            let checkout = staging.path().join("checkout");
            fetcher
                .fetch(&planned.locator, &checkout)
                .map_err(|source| InstallError::FetchFailed {
                    name: name.to_string(),
                    version: version.to_string(),
                    source,
                })?;
            (cache.add(name, version, &checkout)?, false)
        }
    };

    // Cache hits without a locked digest are checked against the digest
    // recorded when the entry was populated
    let expected = match &planned.expected_integrity {
        Some(digest) => Some(digest.clone()),
        None if from_cache => cache.metadata(name, version)?.map(|m| m.integrity),
        None => None,
    };

    let integrity = match expected {
        Some(expected) => match PackageCache::check_integrity(&source, name, version, &expected)
        {
            Ok(actual) => actual,
            Err(CacheError::IntegrityMismatch {
                expected, actual, ..
            }) => {
                return Err(InstallError::IntegrityMismatch {
                    name: name.to_string(),
                    version: version.to_string(),
                    expected,
                    actual,
                })
            }
            Err(e) => return Err(e.into()),
        },
        None => PackageCache::calculate_integrity(&source)?,
    };

    let target = install_path(modules, name);
    if target.exists() {
        fs::remove_dir_all(&target).map_err(|source| InstallError::Io {
            path: target.clone(),
            source,
        })?;
    }
    tree::copy_tree(&source, &target, &[VCS_DIR])?;
    debug!("Installed {}@{} to {}", name, version, target.display());

    Ok(Installed {
        name: name.to_string(),
        entry: LockEntry {
            version: version.to_string(),
            resolved: planned.locator.to_string(),
            integrity,
            dependencies: planned.dependencies.clone(),
        },
        from_cache,
    })
}

/// `node_modules/<name>`, nesting scoped names as `@scope/name`
pub fn install_path(modules: &Path, name: &str) -> PathBuf {
    name.split('/')
        .fold(modules.to_path_buf(), |path, part| path.join(part))
}
