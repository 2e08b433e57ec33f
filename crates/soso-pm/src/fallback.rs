//! Fallback installation through npm
//!
//! Names with no package record in the registry are handed to an external
//! installer as an opaque pass/fail step.

use crate::config::FallbackKind;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Errors from the fallback installer
#[derive(Debug, Error)]
pub enum FallbackError {
    /// Installer process could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Installer ran but did not install the package
    #[error("The package {name} has not been found neither in npm repos or soso registries")]
    NotFound { name: String, stderr: String },

    /// Fallback installation is turned off
    #[error("{name} is not in the soso registry and fallback installation is disabled")]
    Disabled { name: String },
}

/// Installs a package from another ecosystem into a project
pub trait FallbackInstaller {
    fn install(&self, name: &str, range: &str, project: &Path) -> Result<(), FallbackError>;
}

/// Runs `npm install <name>@<range> --save` in the project
#[derive(Debug, Clone)]
pub struct NpmInstaller {
    program: String,
}

impl Default for NpmInstaller {
    fn default() -> Self {
        Self {
            program: if cfg!(windows) { "npm.cmd" } else { "npm" }.to_string(),
        }
    }
}

impl NpmInstaller {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FallbackInstaller for NpmInstaller {
    fn install(&self, name: &str, range: &str, project: &Path) -> Result<(), FallbackError> {
        let spec = format!("{}@{}", name, range);
        debug!(program = %self.program, %spec, "running fallback installer");

        let output = Command::new(&self.program)
            .args(["install", spec.as_str(), "--save"])
            .current_dir(project)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| FallbackError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FallbackError::NotFound {
                name: name.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Rejects every fallback request
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledFallback;

impl FallbackInstaller for DisabledFallback {
    fn install(&self, name: &str, _range: &str, _project: &Path) -> Result<(), FallbackError> {
        Err(FallbackError::Disabled {
            name: name.to_string(),
        })
    }
}

/// Installer selected by configuration
pub fn installer_for(kind: FallbackKind) -> Box<dyn FallbackInstaller> {
    match kind {
        FallbackKind::Npm => Box::new(NpmInstaller::new()),
        FallbackKind::Disabled => Box::new(DisabledFallback),
    }
}
