//! Package cache
//!
//! Content-keyed store of fetched package trees at `~/.soso/cache/`.
//!
//! Directory structure:
//! ```text
//! ~/.soso/cache/
//! ├── <sha256("name@version")>/
//! │   ├── package/        # the package's file tree
//! │   │   └── package.json
//! │   └── entry.json      # EntryMetadata
//! └── .tmp/               # staging for in-flight populations
//! ```
//!
//! An entry is populated in a staging directory and renamed into place, so
//! readers never observe a partially written entry.

mod metadata;
pub(crate) mod tree;

pub use metadata::{EntryMetadata, MetadataError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

/// Marker file whose presence makes an entry complete
pub const MANIFEST_FILE: &str = "package.json";

/// Nested dependency directory excluded from integrity digests
pub const MODULES_DIR: &str = "node_modules";

/// Source-control metadata directory never copied into the cache
pub const VCS_DIR: &str = ".git";

const PACKAGE_DIR: &str = "package";
const METADATA_FILE: &str = "entry.json";
const STAGING_DIR: &str = ".tmp";

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure on a cache path
    #[error("Cache IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Entry metadata could not be read or written
    #[error("Cache metadata error at {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },

    /// Cached content no longer matches the expected digest
    #[error("Integrity mismatch for {name}@{version}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        name: String,
        version: String,
        expected: String,
        actual: String,
    },

    /// Requested entry is not in the cache
    #[error("Package not in cache: {name}@{version}")]
    NotCached { name: String, version: String },
}

impl CacheError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> CacheError {
        let path = path.to_path_buf();
        move |source| CacheError::Io { path, source }
    }
}

/// Entry count and on-disk size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_bytes: u64,
}

/// Package cache rooted at a directory
#[derive(Debug, Clone)]
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    /// Open (and create if needed) a cache at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let cache = Self { root: root.into() };
        cache.ensure_layout()?;
        Ok(cache)
    }

    fn ensure_layout(&self) -> Result<(), CacheError> {
        let staging = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging).map_err(CacheError::io(&staging))
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location key for a package: hex SHA-256 of `"<name>@<version>"`
    pub fn content_key(name: &str, version: &str) -> String {
        let digest = Sha256::digest(format!("{}@{}", name, version).as_bytes());
        hex::encode(digest)
    }

    fn entry_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(Self::content_key(name, version))
    }

    /// Path of an entry's package tree (whether or not it exists)
    pub fn entry_path(&self, name: &str, version: &str) -> PathBuf {
        self.entry_dir(name, version).join(PACKAGE_DIR)
    }

    /// True iff a complete entry exists
    ///
    /// An entry missing its manifest is treated as absent.
    pub fn has(&self, name: &str, version: &str) -> bool {
        self.entry_path(name, version).join(MANIFEST_FILE).is_file()
    }

    /// Path of a complete entry
    pub fn get(&self, name: &str, version: &str) -> Option<PathBuf> {
        if self.has(name, version) {
            Some(self.entry_path(name, version))
        } else {
            None
        }
    }

    /// Fresh staging directory inside the cache
    ///
    /// Dropping it discards whatever was written there.
    pub fn staging_dir(&self) -> Result<TempDir, CacheError> {
        let staging = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging).map_err(CacheError::io(&staging))?;
        tempfile::Builder::new()
            .prefix("stage-")
            .tempdir_in(&staging)
            .map_err(CacheError::io(&staging))
    }

    /// Copy a package tree into the cache
    ///
    /// Re-adding a present entry is a no-op. The copy lands in a staging
    /// directory first and is renamed into place in one step.
    pub fn add(&self, name: &str, version: &str, source: &Path) -> Result<PathBuf, CacheError> {
        if self.has(name, version) {
            debug!(name, version, "already cached");
            return Ok(self.entry_path(name, version));
        }

        let staging = self.staging_dir()?;
        let package_dir = staging.path().join(PACKAGE_DIR);
        tree::copy_tree(source, &package_dir, &[VCS_DIR])?;

        if !package_dir.join(MANIFEST_FILE).is_file() {
            warn!(name, version, "package tree has no {}", MANIFEST_FILE);
        }

        let integrity = Self::calculate_integrity(&package_dir)?;
        let metadata_path = staging.path().join(METADATA_FILE);
        EntryMetadata::new(name, version, integrity)
            .save(&metadata_path)
            .map_err(|source| CacheError::Metadata {
                path: metadata_path.clone(),
                source,
            })?;

        let entry_dir = self.entry_dir(name, version);
        debug!(name, version, path = %entry_dir.display(), "caching package");

        if let Err(first) = fs::rename(staging.path(), &entry_dir) {
            if self.has(name, version) {
                // Another writer finished first; the staged copy is dropped
                debug!(name, version, "entry populated concurrently");
            } else if entry_dir.exists() {
                // Incomplete leftover from an interrupted writer
                fs::remove_dir_all(&entry_dir).map_err(CacheError::io(&entry_dir))?;
                fs::rename(staging.path(), &entry_dir).map_err(CacheError::io(&entry_dir))?;
            } else {
                return Err(CacheError::Io {
                    path: entry_dir,
                    source: first,
                });
            }
        }

        Ok(self.entry_path(name, version))
    }

    /// Digest of a package tree, as `sha256-<base64>`
    ///
    /// Entries are visited sorted by name; the name and then (for files) the
    /// bytes feed a single hash. `node_modules` directories are skipped.
    pub fn calculate_integrity(path: &Path) -> Result<String, CacheError> {
        let mut hasher = Sha256::new();
        tree::hash_tree(path, MODULES_DIR, &mut hasher)?;
        Ok(format!("sha256-{}", STANDARD.encode(hasher.finalize())))
    }

    /// Recompute an entry's digest and compare it with `expected`
    pub fn verify(&self, name: &str, version: &str, expected: &str) -> Result<String, CacheError> {
        let path = self.get(name, version).ok_or_else(|| CacheError::NotCached {
            name: name.to_string(),
            version: version.to_string(),
        })?;
        Self::check_integrity(&path, name, version, expected)
    }

    /// Digest `path` and compare it with `expected`, returning the digest
    pub fn check_integrity(
        path: &Path,
        name: &str,
        version: &str,
        expected: &str,
    ) -> Result<String, CacheError> {
        let actual = Self::calculate_integrity(path)?;
        if actual != expected {
            return Err(CacheError::IntegrityMismatch {
                name: name.to_string(),
                version: version.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }

        Ok(actual)
    }

    /// Metadata recorded when an entry was populated
    pub fn metadata(&self, name: &str, version: &str) -> Result<Option<EntryMetadata>, CacheError> {
        if !self.has(name, version) {
            return Ok(None);
        }

        let path = self.entry_dir(name, version).join(METADATA_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        EntryMetadata::load(&path)
            .map(Some)
            .map_err(|source| CacheError::Metadata { path, source })
    }

    /// Clear the entire cache
    ///
    /// **Warning:** This deletes all cached packages!
    pub fn clear(&self) -> Result<(), CacheError> {
        debug!(path = %self.root.display(), "clearing cache");

        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(CacheError::io(&self.root))?;
        }
        fs::create_dir_all(&self.root).map_err(CacheError::io(&self.root))?;
        self.ensure_layout()
    }

    /// Count entries and total their size
    ///
    /// Only directories named like a content key count; the staging area and
    /// stray files are ignored.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();
        if !self.root.exists() {
            return Ok(stats);
        }

        for entry in fs::read_dir(&self.root).map_err(CacheError::io(&self.root))? {
            let entry = entry.map_err(CacheError::io(&self.root))?;
            let path = entry.path();
            if !path.is_dir() || !is_content_key(&entry.file_name().to_string_lossy()) {
                continue;
            }

            stats.entry_count += 1;
            stats.total_bytes += tree::tree_size(&path)?;
        }

        Ok(stats)
    }
}

fn is_content_key(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
