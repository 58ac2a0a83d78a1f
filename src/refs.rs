use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::cache::RepoStorage;
use crate::error::{Error, IoResultExt, Result};
use crate::types::{is_commit_hash, validate_revision};

/// record the commit a symbolic revision resolved to (create or update)
///
/// revision can contain slashes, like "refs/pr/1"
pub fn write_ref(storage: &RepoStorage, revision: &str, commit: &str) -> Result<()> {
    validate_revision(revision)?;
    if !is_commit_hash(commit) {
        return Err(Error::InvalidRevision(format!(
            "not a commit hash: {}",
            commit
        )));
    }

    let ref_path = storage.ref_path(revision);

    // skip the write when nothing changed
    if read_ref(storage, revision)?.as_deref() == Some(commit) {
        return Ok(());
    }

    // ensure parent directories exist
    let parent = ref_path
        .parent()
        .ok_or_else(|| Error::InvalidRevision(revision.to_string()))?;
    fs::create_dir_all(parent).with_path(parent)?;

    // atomic write: temp -> fsync -> rename
    let tmp_path = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(commit.as_bytes()).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }

    // rename to final location
    fs::rename(&tmp_path, &ref_path).with_path(&ref_path)?;

    // fsync parent directory
    let dir = File::open(parent).with_path(parent)?;
    dir.sync_all().with_path(parent)?;

    Ok(())
}

/// read the commit recorded for a revision, `None` if never recorded
pub fn read_ref(storage: &RepoStorage, revision: &str) -> Result<Option<String>> {
    let ref_path = storage.ref_path(revision);

    match fs::read_to_string(&ref_path) {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io {
            path: ref_path,
            source: e,
        }),
    }
}

/// map a revision to the snapshot directory name it is cached under
///
/// commit hashes map to themselves; symbolic revisions go through `refs/`.
pub fn resolve_local(storage: &RepoStorage, revision: &str) -> Result<Option<String>> {
    if is_commit_hash(revision) {
        return Ok(Some(revision.to_string()));
    }
    read_ref(storage, revision)
}

/// list all recorded refs as (revision, commit)
pub fn list_refs(storage: &RepoStorage) -> Result<Vec<(String, String)>> {
    let refs_dir = storage.refs_path();
    let mut refs = Vec::new();

    if refs_dir.exists() {
        collect_refs(&refs_dir, &refs_dir, &mut refs)?;
    }

    refs.sort();
    Ok(refs)
}

/// recursively collect refs from directory
fn collect_refs(base: &Path, dir: &Path, refs: &mut Vec<(String, String)>) -> Result<()> {
    for entry in fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        let path = entry.path();

        if path.is_dir() {
            collect_refs(base, &path, refs)?;
        } else if path.is_file() {
            // leftovers of interrupted writes
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            if let Ok(rel) = path.strip_prefix(base) {
                let revision = rel.to_string_lossy().replace('\\', "/");
                let commit = fs::read_to_string(&path).with_path(&path)?;
                refs.push((revision, commit.trim().to_string()));
            }
        }
    }
    Ok(())
}
