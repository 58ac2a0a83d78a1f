//! cache layout: where every artifact of a repository lives on disk
//!
//! ```text
//! <cache root>/<storage folder>/
//!   blobs/<etag>
//!   refs/<revision>
//!   snapshots/<revision>/<path>  -> ../../blobs/<etag>
//! ```
//!
//! everything here is path arithmetic; nothing touches the filesystem.

use std::path::{Path, PathBuf};

use crate::types::RepoId;

/// root of the download cache
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// cache root path
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// storage for one repository
    pub fn repo(&self, repo: &RepoId) -> RepoStorage {
        RepoStorage {
            path: self.root.join(repo.storage_folder()),
        }
    }
}

/// storage folder of a single repository
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoStorage {
    path: PathBuf,
}

impl RepoStorage {
    /// wrap an existing storage folder path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// storage folder root
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// path to blobs directory
    pub fn blobs_path(&self) -> PathBuf {
        self.path.join("blobs")
    }

    /// path to snapshots directory
    pub fn snapshots_path(&self) -> PathBuf {
        self.path.join("snapshots")
    }

    /// path to refs directory
    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    /// path of the blob for a normalized etag
    pub fn blob_path(&self, etag: &str) -> PathBuf {
        self.blobs_path().join(etag)
    }

    /// path of the snapshot pointer for a revision and relative file path
    pub fn pointer_path(&self, revision: &str, rel_path: &str) -> PathBuf {
        self.snapshots_path().join(revision).join(rel_path)
    }

    /// path of the ref file recording a symbolic revision
    pub fn ref_path(&self, revision: &str) -> PathBuf {
        self.refs_path().join(revision)
    }
}

/// link target of a snapshot pointer, relative to the pointer's directory
///
/// `snapshots/<rev>/a/b.txt` needs one `..` per directory up to the storage
/// folder: `../../../blobs/<etag>`. revisions such as `refs/pr/1` add levels.
pub fn relative_blob_target(revision: &str, rel_path: &str, etag: &str) -> PathBuf {
    let depth = revision.split('/').count() + rel_path.split('/').count();
    let mut target = PathBuf::new();
    for _ in 0..depth {
        target.push("..");
    }
    target.push("blobs");
    target.push(etag);
    target
}
