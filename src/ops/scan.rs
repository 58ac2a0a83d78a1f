//! cache inventory

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::blob::is_incomplete;
use crate::cache::{CacheDir, RepoStorage};
use crate::error::{IoResultExt, Result};
use crate::refs::list_refs;
use crate::types::RepoId;

/// everything found under a cache root
#[derive(Debug, Default)]
pub struct CacheReport {
    pub repos: Vec<RepoReport>,
    /// entries of the cache root that are not storage folders
    pub ignored: Vec<PathBuf>,
}

impl CacheReport {
    pub fn size_on_disk(&self) -> u64 {
        self.repos.iter().map(|r| r.blob_bytes).sum()
    }
}

/// one cached repository
#[derive(Debug)]
pub struct RepoReport {
    pub repo: RepoId,
    pub path: PathBuf,
    pub blobs: usize,
    pub blob_bytes: u64,
    /// leftovers of interrupted transfers
    pub incomplete: usize,
    pub incomplete_bytes: u64,
    pub revisions: Vec<RevisionReport>,
}

/// one snapshot directory
#[derive(Debug, PartialEq, Eq)]
pub struct RevisionReport {
    pub revision: String,
    /// pointers that resolve to a blob
    pub files: usize,
    /// pointers whose blob is gone
    pub broken: usize,
    /// symbolic revisions recorded as pointing here
    pub refs: Vec<String>,
}

/// walk the cache root and describe every repository in it; read-only
pub fn scan_cache(cache: &CacheDir) -> Result<CacheReport> {
    let mut report = CacheReport::default();
    let root = cache.path();
    if !root.exists() {
        return Ok(report);
    }

    let mut entries: Vec<_> = fs::read_dir(root)
        .with_path(root)?
        .collect::<std::io::Result<Vec<_>>>()
        .with_path(root)?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let repo = match RepoId::from_storage_folder(&name) {
            Some(repo) if path.is_dir() => repo,
            _ => {
                warn!(path = %path.display(), "not a repository storage folder");
                report.ignored.push(path);
                continue;
            }
        };
        report.repos.push(scan_repo(repo, RepoStorage::at(path))?);
    }

    Ok(report)
}

fn scan_repo(repo: RepoId, storage: RepoStorage) -> Result<RepoReport> {
    let mut out = RepoReport {
        repo,
        path: storage.path().to_path_buf(),
        blobs: 0,
        blob_bytes: 0,
        incomplete: 0,
        incomplete_bytes: 0,
        revisions: Vec::new(),
    };

    for (path, size) in files_in(&storage.blobs_path(), Some(1)) {
        if is_incomplete(&path) {
            out.incomplete += 1;
            out.incomplete_bytes += size;
        } else {
            out.blobs += 1;
            out.blob_bytes += size;
        }
    }

    let mut refs_by_commit: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (revision, commit) in list_refs(&storage)? {
        refs_by_commit.entry(commit).or_default().push(revision);
    }

    let snapshots = storage.snapshots_path();
    if snapshots.is_dir() {
        let mut dirs: Vec<_> = fs::read_dir(&snapshots)
            .with_path(&snapshots)?
            .collect::<std::io::Result<Vec<_>>>()
            .with_path(&snapshots)?;
        dirs.sort_by_key(|e| e.file_name());

        for dir in dirs.into_iter().filter(|d| d.path().is_dir()) {
            let revision = dir.file_name().to_string_lossy().into_owned();
            let mut files = 0;
            let mut broken = 0;
            for (pointer, _) in files_in(&dir.path(), None) {
                if pointer.exists() {
                    files += 1;
                } else {
                    broken += 1;
                }
            }
            out.revisions.push(RevisionReport {
                refs: refs_by_commit.remove(&revision).unwrap_or_default(),
                revision,
                files,
                broken,
            });
        }
    }

    Ok(out)
}

/// non-directory entries below `dir` with their own (not followed) size
fn files_in(dir: &Path, max_depth: Option<usize>) -> Vec<(PathBuf, u64)> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut walker = WalkDir::new(dir).min_depth(1);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }
    walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .map(|e| {
            let size = e.metadata().map(|m| m.len()).unwrap_or(0);
            (e.into_path(), size)
        })
        .collect()
}
