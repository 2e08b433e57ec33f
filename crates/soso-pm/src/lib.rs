//! Soso Package Manager Library
//!
//! This crate provides the engine behind the `soso` private package manager:
//! - Version ranges over semantic versions
//! - Registry view and its JSON file provider
//! - Dependency resolution (highest compatible version per name)
//! - Package cache (content-keyed, staged and renamed into place)
//! - Lockfile management (soso-lock.json)
//! - Project manifest handling (package.json)
//! - Install, update, publish, info and cache clean pipelines

pub mod cache;
pub mod commands;
pub mod config;
pub mod fallback;
pub mod git;
pub mod lockfile;
pub mod manifest;
pub mod range;
pub mod registry;
pub mod resolver;

pub use cache::{CacheError, CacheStats, EntryMetadata, PackageCache};
pub use config::{Config, ConfigError, CorruptLockfilePolicy, FallbackKind};
pub use fallback::{DisabledFallback, FallbackError, FallbackInstaller, NpmInstaller};
pub use git::{FetchError, Fetcher, GitClient, SourceControl};
pub use lockfile::{
    InstallSet, LockEntry, Lockfile, LockfileError, LockfileRecord, MatchMode, LOCKFILE_VERSION,
};
pub use manifest::{ManifestError, ProjectManifest};
pub use range::{parse_version, RangeError, VersionRange};
pub use registry::{
    FileRegistry, Locator, PackageRecord, RegistryError, RegistryProvider, RegistryView,
    VersionRecord,
};
pub use resolver::{
    DependencyResolver, Origin, Requirement, RequirementSet, Resolution, ResolvedSet,
    ResolverError, TraversalMode,
};
