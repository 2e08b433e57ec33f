//! Subcommand implementations

pub mod cache;
pub mod info;
pub mod install;
pub mod publish;
pub mod update;

use soso_pm::commands::{InstallContext, InstallOptions};
use soso_pm::fallback::installer_for;
use soso_pm::{Config, FallbackInstaller, FileRegistry, GitClient, PackageCache};
use tracing::debug;

/// Collaborators shared by every subcommand of one invocation
pub struct Session {
    pub config: Config,
    pub registry: FileRegistry,
    pub cache: PackageCache,
    pub git: GitClient,
    pub fallback: Box<dyn FallbackInstaller>,
}

impl Session {
    pub fn open(config: Config) -> anyhow::Result<Self> {
        debug!(
            cache = %config.cache_dir.display(),
            registry = %config.registry_path.display(),
            "opening session"
        );
        Ok(Self {
            registry: FileRegistry::new(&config.registry_path),
            cache: PackageCache::open(&config.cache_dir)?,
            git: GitClient::new(),
            fallback: installer_for(config.fallback),
            config,
        })
    }

    pub fn install_context(&self) -> InstallContext<'_> {
        InstallContext {
            registry: &self.registry,
            cache: &self.cache,
            fetcher: &self.git,
            fallback: self.fallback.as_ref(),
        }
    }

    pub fn install_options(&self) -> InstallOptions {
        InstallOptions::from_config(&self.config)
    }
}
