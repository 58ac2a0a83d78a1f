//! mirror a whole repository revision into the cache

use std::fs;
use std::path::PathBuf;

use glob::Pattern;
use tracing::{debug, info, warn};

use crate::cache::CacheDir;
use crate::error::{Error, IoResultExt, Result};
use crate::ops::download::{ensure_file_cached, CacheOptions};
use crate::refs::write_ref;
use crate::transport::{ByteSource, ListingClient, MetadataClient};
use crate::types::{is_commit_hash, validate_revision, FileRequest, RepoId, DEFAULT_REVISION};

/// what to do when a single file fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// stop at the first failing file and return its error
    #[default]
    Abort,
    /// record the failure and carry on with the next file
    Continue,
}

/// sync options
#[derive(Clone, Debug, Default)]
pub struct SyncOptions {
    pub failure_policy: FailurePolicy,
    /// only files matching one of these patterns (all files if empty)
    pub include: Vec<String>,
    /// skip files matching any of these patterns
    pub exclude: Vec<String>,
}

/// a file that could not be cached
#[derive(Debug)]
pub struct SyncFailure {
    pub path: String,
    pub error: Error,
}

/// result of a sync
#[derive(Debug)]
pub struct SyncReport {
    /// commit every file was fetched at
    pub commit: String,
    /// `snapshots/<commit>`
    pub snapshot: PathBuf,
    /// cached files as (path in repo, pointer)
    pub files: Vec<(String, PathBuf)>,
    /// files whose bytes were transferred during this sync
    pub fetched: usize,
    /// listed files left out by the filters
    pub skipped: usize,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// cache every file of `repo` at `revision` (default `main`)
///
/// the revision is resolved to a commit once; listing and every file
/// download then use that commit, so all files come from the same
/// snapshot even if the branch moves mid-sync. files are processed
/// sequentially in listing order.
pub fn synchronize_repository<C>(
    client: &C,
    cache: &CacheDir,
    repo: &RepoId,
    revision: Option<&str>,
    options: &SyncOptions,
) -> Result<SyncReport>
where
    C: MetadataClient + ListingClient + ByteSource + ?Sized,
{
    let revision = revision.unwrap_or(DEFAULT_REVISION);
    validate_revision(revision)?;
    let filter = PathFilter::new(&options.include, &options.exclude)?;

    let commit = client.resolve_revision(repo, revision)?;
    validate_revision(&commit)?;
    debug!(%repo, %revision, %commit, "resolved revision");

    let storage = cache.repo(repo);
    let snapshot = storage.snapshots_path().join(&commit);
    fs::create_dir_all(&snapshot).with_path(&snapshot)?;

    let mut report = SyncReport {
        commit: commit.clone(),
        snapshot,
        files: Vec::new(),
        fetched: 0,
        skipped: 0,
        failures: Vec::new(),
    };

    for entry in client.list_files(repo, &commit)? {
        let entry = entry?;
        if !filter.accepts(&entry.path) {
            report.skipped += 1;
            continue;
        }

        let result = FileRequest::new(repo.clone(), &entry.path, Some(&commit))
            .and_then(|request| {
                ensure_file_cached(client, cache, &request, CacheOptions::default())
            });

        match result {
            Ok(file) => {
                if file.fetched {
                    report.fetched += 1;
                }
                report.files.push((entry.path, file.pointer));
            }
            Err(e) => match options.failure_policy {
                FailurePolicy::Abort => return Err(e),
                FailurePolicy::Continue => {
                    warn!(path = %entry.path, error = %e, "failed to cache file");
                    report.failures.push(SyncFailure {
                        path: entry.path,
                        error: e,
                    });
                }
            },
        }
    }

    if revision != commit && is_commit_hash(&commit) {
        write_ref(&storage, revision, &commit)?;
    }

    info!(
        %repo,
        %commit,
        files = report.files.len(),
        fetched = report.fetched,
        skipped = report.skipped,
        failed = report.failures.len(),
        "sync finished"
    );
    Ok(report)
}

/// include/exclude globs over repository paths
///
/// `*` also matches `/`, and a pattern ending in `/` covers everything
/// below that directory.
struct PathFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl PathFilter {
    fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    fn accepts(&self, path: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| p.matches(path));
        included && !self.exclude.iter().any(|p| p.matches(path))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|raw| {
            let expanded = if raw.ends_with('/') {
                format!("{}*", raw)
            } else {
                raw.clone()
            };
            Pattern::new(&expanded).map_err(|e| Error::InvalidPattern {
                pattern: raw.clone(),
                message: e.msg.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::read_ref;
    use crate::testing::FakeHub;
    use tempfile::tempdir;

    const COMMIT: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn repo() -> RepoId {
        RepoId::model("org/tiny").unwrap()
    }

    fn hub_with_files() -> FakeHub {
        let hub = FakeHub::new();
        hub.add_file(&repo(), "main", COMMIT, "README.md", b"readme", "e-readme");
        hub.add_file(&repo(), "main", COMMIT, "config.json", b"{}", "e-config");
        hub.add_file(&repo(), "main", COMMIT, "onnx/model.onnx", b"graph", "e-onnx");
        hub
    }

    fn paths(report: &SyncReport) -> Vec<&str> {
        report.files.iter().map(|(p, _)| p.as_str()).collect()
    }

    #[test]
    fn test_sync_all_files_at_one_commit() {
        let dir = tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let hub = hub_with_files();

        let report =
            synchronize_repository(&hub, &cache, &repo(), None, &SyncOptions::default()).unwrap();

        assert_eq!(report.commit, COMMIT);
        assert_eq!(paths(&report), vec!["README.md", "config.json", "onnx/model.onnx"]);
        assert_eq!(report.fetched, 3);
        assert!(report.is_complete());
        assert_eq!(hub.resolve_count(), 1);
        assert_eq!(hub.list_count(), 1);

        let storage = cache.repo(&repo());
        for (path, pointer) in &report.files {
            assert_eq!(pointer, &storage.pointer_path(COMMIT, path));
            assert!(pointer.exists());
        }
        assert_eq!(
            fs::read(report.snapshot.join("onnx/model.onnx")).unwrap(),
            b"graph"
        );
        assert_eq!(read_ref(&storage, "main").unwrap().as_deref(), Some(COMMIT));
    }

    #[test]
    fn test_resync_transfers_nothing() {
        let dir = tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let hub = hub_with_files();

        synchronize_repository(&hub, &cache, &repo(), None, &SyncOptions::default()).unwrap();
        let heads = hub.head_count();
        let gets = hub.get_count();

        let report =
            synchronize_repository(&hub, &cache, &repo(), None, &SyncOptions::default()).unwrap();

        assert_eq!(report.fetched, 0);
        assert_eq!(report.files.len(), 3);
        assert_eq!(hub.head_count(), heads);
        assert_eq!(hub.get_count(), gets);
    }

    #[test]
    fn test_include_exclude() {
        let dir = tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let hub = hub_with_files();

        let options = SyncOptions {
            include: vec!["*.json".to_string(), "onnx/".to_string()],
            exclude: vec!["*.onnx".to_string()],
            ..Default::default()
        };
        let report = synchronize_repository(&hub, &cache, &repo(), None, &options).unwrap();

        assert_eq!(paths(&report), vec!["config.json"]);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_bad_pattern_fails_before_network() {
        let dir = tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let hub = hub_with_files();

        let options = SyncOptions {
            include: vec!["[".to_string()],
            ..Default::default()
        };
        let err = synchronize_repository(&hub, &cache, &repo(), None, &options).unwrap_err();

        assert!(matches!(err, Error::InvalidPattern { ref pattern, .. } if pattern == "["));
        assert_eq!(hub.resolve_count(), 0);
    }

    #[test]
    fn test_abort_on_first_failure() {
        let dir = tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let hub = hub_with_files();
        // listed but not served
        hub.add_listing_entry(&repo(), COMMIT, "ghost.bin", 4);
        hub.add_file(&repo(), "main", COMMIT, "z-last.txt", b"z", "e-z");

        let err = synchronize_repository(&hub, &cache, &repo(), None, &SyncOptions::default())
            .unwrap_err();

        assert!(matches!(err, Error::NotFound { ref path, .. } if path == "ghost.bin"));
        let storage = cache.repo(&repo());
        assert!(!storage.pointer_path(COMMIT, "z-last.txt").exists());
        assert_eq!(read_ref(&storage, "main").unwrap(), None);
    }

    #[test]
    fn test_continue_collects_failures() {
        let dir = tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let hub = hub_with_files();
        hub.add_listing_entry(&repo(), COMMIT, "ghost.bin", 4);
        hub.add_file(&repo(), "main", COMMIT, "z-last.txt", b"z", "e-z");

        let options = SyncOptions {
            failure_policy: FailurePolicy::Continue,
            ..Default::default()
        };
        let report = synchronize_repository(&hub, &cache, &repo(), None, &options).unwrap();

        assert_eq!(report.files.len(), 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "ghost.bin");
        assert!(!report.is_complete());
        assert!(cache
            .repo(&repo())
            .pointer_path(COMMIT, "z-last.txt")
            .exists());
    }

    #[test]
    fn test_sync_by_commit_writes_no_ref() {
        let dir = tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let hub = hub_with_files();

        let report =
            synchronize_repository(&hub, &cache, &repo(), Some(COMMIT), &SyncOptions::default())
                .unwrap();

        assert_eq!(report.files.len(), 3);
        assert!(!cache.repo(&repo()).refs_path().exists());
    }

    #[test]
    fn test_unknown_revision() {
        let dir = tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let hub = hub_with_files();

        let err = synchronize_repository(&hub, &cache, &repo(), Some("nope"), &SyncOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Remote { status: 404, .. }));
    }
}
