//! Tool configuration
//!
//! Resolved once per invocation from the environment and `~/.sosorc`.
//!
//! ```text
//! # ~/.sosorc
//! jobs=4
//! lockfile-match=ranges
//! corrupt-lockfile=fail
//! traversal=fixed-point
//! fallback=none
//! cache-dir=/var/cache/soso
//! registry=/srv/soso/registry.json
//! ```

use crate::lockfile::MatchMode;
use crate::resolver::TraversalMode;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// User config file name in the home directory
pub const USER_CONFIG_FILE: &str = ".sosorc";

/// Upper bound on the default fetch pool size
pub const MAX_DEFAULT_JOBS: usize = 8;

/// Errors that can occur while resolving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No home directory could be determined
    #[error("Cannot determine home directory; set SOSO_HOME")]
    NoHomeDir,

    /// Failed to read the user config file
    #[error("Failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A key has a value outside its accepted set
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// What install does with a lockfile that cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptLockfilePolicy {
    /// Warn and resolve as if there were no lockfile
    #[default]
    Reresolve,

    /// Abort the install
    Fail,
}

/// Installer used for names the registry does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackKind {
    #[default]
    Npm,
    Disabled,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Tool home (`~/.soso`)
    pub home: PathBuf,

    /// Package cache root
    pub cache_dir: PathBuf,

    /// Registry file
    pub registry_path: PathBuf,

    /// Fetch worker pool size
    pub jobs: usize,

    pub lockfile_match: MatchMode,
    pub corrupt_lockfile: CorruptLockfilePolicy,
    pub traversal: TraversalMode,
    pub fallback: FallbackKind,

    /// Keys this version does not interpret
    pub extra: BTreeMap<String, String>,
}

/// Parse `KEY=VALUE` lines; `#` comments and blank lines are ignored
///
/// Everything after the first `=` is the value.
pub fn parse_rc(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn default_jobs() -> usize {
    num_cpus::get().clamp(1, MAX_DEFAULT_JOBS)
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Platform default home: `%LOCALAPPDATA%\soso` on Windows, `~/.soso` elsewhere
fn default_home() -> Result<PathBuf, ConfigError> {
    if cfg!(windows) {
        if let Some(local) = dirs::data_local_dir() {
            return Ok(local.join("soso"));
        }
    }

    dirs::home_dir()
        .map(|h| h.join(".soso"))
        .ok_or(ConfigError::NoHomeDir)
}

impl Config {
    /// Resolve configuration from the process environment and `~/.sosorc`
    pub fn load() -> Result<Self, ConfigError> {
        let rc = match dirs::home_dir() {
            Some(home) => read_rc(&home.join(USER_CONFIG_FILE))?,
            None => BTreeMap::new(),
        };

        let home = match std::env::var_os("SOSO_HOME") {
            Some(home) => PathBuf::from(home),
            None => default_home()?,
        };

        Self::from_sources(home, &rc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from explicit sources
    ///
    /// `env` looks up environment overrides; `rc` holds the parsed user
    /// config file.
    pub fn from_sources(
        home: PathBuf,
        rc: &BTreeMap<String, String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self {
            cache_dir: home.join("cache"),
            registry_path: home.join("registry.json"),
            home,
            jobs: default_jobs(),
            lockfile_match: MatchMode::default(),
            corrupt_lockfile: CorruptLockfilePolicy::default(),
            traversal: TraversalMode::default(),
            fallback: FallbackKind::default(),
            extra: BTreeMap::new(),
        };

        for (key, value) in rc {
            config.apply(key, value)?;
        }

        if let Some(dir) = env("SOSO_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(path) = env("SOSO_REGISTRY") {
            config.registry_path = PathBuf::from(path);
        }

        debug!(?config, "configuration resolved");
        Ok(config)
    }

    /// Apply one `KEY=VALUE` setting
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "jobs" => {
                self.jobs = value
                    .parse::<usize>()
                    .ok()
                    .filter(|&n| n >= 1)
                    .ok_or_else(|| invalid(key, value))?;
            }
            "lockfile-match" => {
                self.lockfile_match = match value {
                    "names" => MatchMode::NameSet,
                    "ranges" => MatchMode::Satisfies,
                    _ => return Err(invalid(key, value)),
                };
            }
            "corrupt-lockfile" => {
                self.corrupt_lockfile = match value {
                    "reresolve" => CorruptLockfilePolicy::Reresolve,
                    "fail" => CorruptLockfilePolicy::Fail,
                    _ => return Err(invalid(key, value)),
                };
            }
            "traversal" => {
                self.traversal = match value {
                    "provisional" => TraversalMode::Provisional,
                    "fixed-point" => TraversalMode::FixedPoint,
                    _ => return Err(invalid(key, value)),
                };
            }
            "fallback" => {
                self.fallback = match value {
                    "npm" => FallbackKind::Npm,
                    "none" => FallbackKind::Disabled,
                    _ => return Err(invalid(key, value)),
                };
            }
            "cache-dir" => self.cache_dir = PathBuf::from(value),
            "registry" => self.registry_path = PathBuf::from(value),
            _ => {
                self.extra.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }
}

fn read_rc(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(parse_rc(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_rc() {
        let rc = parse_rc("# comment\n\njobs = 3\ntoken=a=b\nnovalue\n=orphan\n");
        assert_eq!(rc.len(), 2);
        assert_eq!(rc["jobs"], "3");
        assert_eq!(rc["token"], "a=b");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(PathBuf::from("/h"), &BTreeMap::new(), no_env).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/h/cache"));
        assert_eq!(config.registry_path, PathBuf::from("/h/registry.json"));
        assert!(config.jobs >= 1 && config.jobs <= MAX_DEFAULT_JOBS);
        assert_eq!(config.lockfile_match, MatchMode::NameSet);
        assert_eq!(config.corrupt_lockfile, CorruptLockfilePolicy::Reresolve);
        assert_eq!(config.traversal, TraversalMode::Provisional);
        assert_eq!(config.fallback, FallbackKind::Npm);
    }

    #[test]
    fn test_rc_keys_and_env_overrides() {
        let rc = parse_rc(
            "jobs=2\nlockfile-match=ranges\ntraversal=fixed-point\nfallback=none\ncache-dir=/rc/cache\ncolor=always\n",
        );
        let env = |key: &str| (key == "SOSO_CACHE_DIR").then(|| "/env/cache".to_string());

        let config = Config::from_sources(PathBuf::from("/h"), &rc, env).unwrap();
        assert_eq!(config.jobs, 2);
        assert_eq!(config.lockfile_match, MatchMode::Satisfies);
        assert_eq!(config.traversal, TraversalMode::FixedPoint);
        assert_eq!(config.fallback, FallbackKind::Disabled);
        assert_eq!(config.cache_dir, PathBuf::from("/env/cache"));
        assert_eq!(config.extra["color"], "always");
    }

    #[test]
    fn test_invalid_values() {
        for line in ["jobs=0", "jobs=many", "lockfile-match=exact", "traversal=bfs"] {
            let result = Config::from_sources(PathBuf::from("/h"), &parse_rc(line), no_env);
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { .. })),
                "{} should be rejected",
                line
            );
        }
    }
}
