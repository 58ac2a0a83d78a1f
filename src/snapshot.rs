//! snapshot pointers: per-revision symlinks into the blob store

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cache::{relative_blob_target, RepoStorage};
use crate::error::{IoResultExt, Result};
use crate::types::is_commit_hash;

/// pointer path for an already materialized commit revision
///
/// a commit's content never changes, so an existing pointer for it can be
/// served without asking the hub. symbolic revisions always return `None`.
pub fn fast_path(storage: &RepoStorage, revision: &str, rel_path: &str) -> Option<PathBuf> {
    if !is_commit_hash(revision) {
        return None;
    }
    let pointer = storage.pointer_path(revision, rel_path);
    // exists() follows the link, so a dangling pointer does not count
    if pointer.exists() {
        debug!(pointer = %pointer.display(), "commit already materialized");
        Some(pointer)
    } else {
        None
    }
}

/// point `snapshots/<revision>/<rel_path>` at the blob for `etag`
///
/// the link is relative so the cache folder can be moved. an existing
/// pointer is replaced atomically by renaming a fresh link over it.
pub fn link(storage: &RepoStorage, revision: &str, rel_path: &str, etag: &str) -> Result<PathBuf> {
    let pointer = storage.pointer_path(revision, rel_path);
    let target = relative_blob_target(revision, rel_path, etag);

    if let Some(parent) = pointer.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    if let Ok(existing) = fs::read_link(&pointer) {
        if existing == target {
            return Ok(pointer);
        }
    }

    let tmp = tmp_link_path(&pointer);
    symlink(&target, &tmp).with_path(&tmp)?;
    if let Err(e) = fs::rename(&tmp, &pointer) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_path(&pointer);
    }

    debug!(pointer = %pointer.display(), target = %target.display(), "linked snapshot");
    Ok(pointer)
}

/// blob a pointer resolves to, if it is a readable link
pub fn resolve_pointer(pointer: &Path) -> Option<PathBuf> {
    let target = fs::read_link(pointer).ok()?;
    let parent = pointer.parent()?;
    Some(normalize(&parent.join(target)))
}

fn tmp_link_path(pointer: &Path) -> PathBuf {
    let mut name = pointer
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
    pointer.with_file_name(name)
}

/// lexically fold `..` components
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
