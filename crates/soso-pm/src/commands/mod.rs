//! Package manager commands
//!
//! Implements the pipelines behind the CLI: install, update, publish, info
//! and cache clean. Collaborators are passed in so callers (and tests) decide
//! where the registry lives and how packages are fetched.

pub mod clean;
pub mod info;
pub mod install;
pub mod publish;
pub mod update;

pub use clean::clean_cache;
pub use info::{package_info, InfoError, PackageSummary, VersionSummary};
pub use install::{install, InstallError, InstallOptions, InstallReport, VersionSource};
pub use publish::{publish, PublishError, PublishReport};
pub use update::{update, RangeChange, UpdateError, UpdateReport};

use crate::cache::PackageCache;
use crate::fallback::FallbackInstaller;
use crate::git::Fetcher;
use crate::registry::RegistryProvider;

/// Collaborators an install or update runs against
pub struct InstallContext<'a> {
    pub registry: &'a dyn RegistryProvider,
    pub cache: &'a PackageCache,
    pub fetcher: &'a dyn Fetcher,
    pub fallback: &'a dyn FallbackInstaller,
}
