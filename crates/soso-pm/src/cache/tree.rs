//! Directory tree walks
//!
//! Copy, digest and size package trees with an explicit work stack so deep
//! trees never grow the call stack. Entries are visited in name order.

use super::CacheError;
use sha2::{Digest, Sha256};
use std::fs::{self, FileType};
use std::path::{Path, PathBuf};

/// A directory entry with its display name
struct Entry {
    name: String,
    path: PathBuf,
    file_type: FileType,
}

/// Read a directory's entries sorted by name
fn sorted_entries(dir: &Path) -> Result<Vec<Entry>, CacheError> {
    let read = fs::read_dir(dir).map_err(CacheError::io(dir))?;

    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.map_err(CacheError::io(dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(CacheError::io(&path))?;
        entries.push(Entry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
            file_type,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Feed a tree into a running hash: each entry's name, then its bytes if a file
///
/// Directories named `skip` are left out at every depth. Traversal is
/// pre-order, matching a recursive walk over sorted entries.
pub(crate) fn hash_tree(root: &Path, skip: &str, hasher: &mut Sha256) -> Result<(), CacheError> {
    let mut stack: Vec<Entry> = sorted_entries(root)?;
    stack.reverse();

    while let Some(entry) = stack.pop() {
        if entry.name == skip {
            continue;
        }

        hasher.update(entry.name.as_bytes());

        if entry.file_type.is_dir() {
            let mut children = sorted_entries(&entry.path)?;
            children.reverse();
            stack.extend(children);
        } else {
            let bytes = fs::read(&entry.path).map_err(CacheError::io(&entry.path))?;
            hasher.update(&bytes);
        }
    }

    Ok(())
}

/// Copy `src` into `dest`, leaving out top-level or nested entries named in `skip`
pub(crate) fn copy_tree(src: &Path, dest: &Path, skip: &[&str]) -> Result<(), CacheError> {
    let mut stack: Vec<(PathBuf, PathBuf)> = vec![(src.to_path_buf(), dest.to_path_buf())];

    while let Some((from, to)) = stack.pop() {
        fs::create_dir_all(&to).map_err(CacheError::io(&to))?;

        for entry in sorted_entries(&from)? {
            if skip.contains(&entry.name.as_str()) {
                continue;
            }

            let target = to.join(&entry.name);
            if entry.file_type.is_dir() {
                stack.push((entry.path, target));
            } else {
                fs::copy(&entry.path, &target).map_err(CacheError::io(&entry.path))?;
            }
        }
    }

    Ok(())
}

/// Total size in bytes of all files under `root`
pub(crate) fn tree_size(root: &Path) -> Result<u64, CacheError> {
    let mut total = 0;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for entry in sorted_entries(&dir)? {
            if entry.file_type.is_dir() {
                stack.push(entry.path);
            } else {
                let meta = fs::metadata(&entry.path).map_err(CacheError::io(&entry.path))?;
                total += meta.len();
            }
        }
    }

    Ok(total)
}
