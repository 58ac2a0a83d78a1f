//! single file operations: cache a file, describe it, stream a range of it

use std::io::Read;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::blob::{ensure_blob, source_url};
use crate::cache::{CacheDir, RepoStorage};
use crate::error::{Error, Result};
use crate::refs::{resolve_local, write_ref};
use crate::resolver::resolve_descriptor;
use crate::snapshot::{fast_path, link, resolve_pointer};
use crate::transport::{remote_error, ByteRange, ByteResponse, ByteSource, MetadataClient};
use crate::types::{is_commit_hash, validate_revision, ContentDescriptor, FileRequest};

/// cache options
#[derive(Clone, Copy, Debug, Default)]
pub struct CacheOptions {
    /// never contact the hub; serve only what is already cached
    pub local_only: bool,
}

/// a file available in the cache
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedFile {
    /// `snapshots/<commit>/<path>`, stable across calls; the blob itself for
    /// raw requests, which never get a snapshot pointer
    pub pointer: PathBuf,
    /// the blob the pointer resolves to
    pub blob: PathBuf,
    /// snapshot directory the pointer lives in
    pub commit: String,
    /// false when no bytes were transferred
    pub fetched: bool,
}

/// make sure a file is in the cache and return its snapshot pointer
///
/// a commit revision whose pointer already exists is answered from disk
/// without any remote call. otherwise the descriptor is resolved, the blob
/// fetched if its etag is new, and the pointer linked under the commit the
/// hub reported. symbolic revisions also get their ref recorded.
///
/// raw requests name different content than resolved ones at the same path
/// (the large-file pointer, not what it points to), so they only populate
/// the blob store and never read or write `snapshots/` or `refs/`.
pub fn ensure_file_cached<C>(
    client: &C,
    cache: &CacheDir,
    request: &FileRequest,
    options: CacheOptions,
) -> Result<CachedFile>
where
    C: MetadataClient + ByteSource + ?Sized,
{
    let storage = cache.repo(&request.repo);

    if !request.raw {
        if let Some(pointer) = fast_path(&storage, &request.revision, &request.path) {
            return Ok(cached(pointer, &request.revision, false));
        }
    }

    if options.local_only {
        if request.raw {
            return Err(not_cached(request));
        }
        return cached_locally(&storage, request);
    }

    let descriptor = resolve_descriptor(client, request)?.ok_or_else(|| not_found(request))?;
    let commit = snapshot_revision(&descriptor, request);

    let pinned = request.at_revision(&commit);
    let url = source_url(&descriptor, &client.file_url(&pinned)?);

    let pointer = if request.raw {
        storage.blob_path(&descriptor.etag)
    } else {
        storage.pointer_path(&commit, &request.path)
    };
    let outcome = ensure_blob(&storage, &descriptor, &pointer, client, &url)?;

    let pointer = if request.raw {
        outcome.path.clone()
    } else {
        let pointer = link(&storage, &commit, &request.path, &descriptor.etag)?;
        if request.revision != commit && is_commit_hash(&commit) {
            write_ref(&storage, &request.revision, &commit)?;
        }
        pointer
    };

    if outcome.fetched {
        info!(
            repo = %request.repo,
            path = %request.path,
            commit = %commit,
            bytes = outcome.bytes,
            "downloaded"
        );
    }

    Ok(CachedFile {
        pointer,
        blob: outcome.path,
        commit,
        fetched: outcome.fetched,
    })
}

/// describe a file on the hub without downloading it
pub fn fetch_descriptor<C>(client: &C, request: &FileRequest) -> Result<ContentDescriptor>
where
    C: MetadataClient + ?Sized,
{
    resolve_descriptor(client, request)?.ok_or_else(|| not_found(request))
}

/// open a download of a file, or of a byte range of it
///
/// returns `Ok(None)` when the file does not exist at the revision. the
/// body is not read; nothing is written to the cache.
pub fn download_file<C>(
    client: &C,
    request: &FileRequest,
    range: Option<ByteRange>,
) -> Result<Option<ByteResponse>>
where
    C: MetadataClient + ByteSource + ?Sized,
{
    let descriptor = match resolve_descriptor(client, request)? {
        Some(d) => d,
        None => return Ok(None),
    };
    let commit = snapshot_revision(&descriptor, request);
    let url = source_url(&descriptor, &client.file_url(&request.at_revision(&commit))?);

    debug!(%url, ?range, "opening download");
    let mut response = client.get_bytes(&url, range)?;
    if !response.is_success() {
        let mut text = String::new();
        let body = response.body.read_to_string(&mut text).ok().map(|_| text);
        return Err(remote_error(
            response.status,
            &url,
            &response.headers,
            body.as_deref(),
        ));
    }
    Ok(Some(response))
}

/// the commit the hub reported, or the requested revision if it gave none
/// (or something unusable as a directory name)
fn snapshot_revision(descriptor: &ContentDescriptor, request: &FileRequest) -> String {
    descriptor
        .commit_hash
        .as_deref()
        .filter(|c| validate_revision(c).is_ok())
        .unwrap_or(request.revision.as_str())
        .to_string()
}

fn cached_locally(storage: &RepoStorage, request: &FileRequest) -> Result<CachedFile> {
    let commit = resolve_local(storage, &request.revision)?.ok_or_else(|| not_cached(request))?;
    let pointer = storage.pointer_path(&commit, &request.path);
    if !pointer.exists() {
        return Err(not_cached(request));
    }
    debug!(pointer = %pointer.display(), "served from local cache");
    Ok(cached(pointer, &commit, false))
}

fn cached(pointer: PathBuf, commit: &str, fetched: bool) -> CachedFile {
    let blob = resolve_pointer(&pointer).unwrap_or_else(|| pointer.clone());
    CachedFile {
        pointer,
        blob,
        commit: commit.to_string(),
        fetched,
    }
}

fn not_found(request: &FileRequest) -> Error {
    Error::NotFound {
        repo: request.repo.to_string(),
        path: request.path.clone(),
        revision: request.revision.clone(),
    }
}

fn not_cached(request: &FileRequest) -> Error {
    Error::NotCached {
        repo: request.repo.to_string(),
        path: request.path.clone(),
        revision: request.revision.clone(),
    }
}
