//! blob store: one immutable file per etag
//!
//! bytes are streamed into `blobs/<etag>.<uuid>.incomplete` and renamed onto
//! `blobs/<etag>` only once the whole body arrived and checked out. a file at
//! the final path is therefore always complete; a failed or interrupted
//! transfer leaves only the `.incomplete` file behind.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::RepoStorage;
use crate::error::{Error, IoResultExt, Result};
use crate::transport::{remote_error, ByteSource};
use crate::types::ContentDescriptor;

const INCOMPLETE_SUFFIX: &str = "incomplete";

/// how a blob came to be present
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobOutcome {
    pub path: PathBuf,
    /// false when the blob was already cached
    pub fetched: bool,
    /// bytes transferred
    pub bytes: u64,
}

/// make sure the blob for `descriptor` exists, fetching it from `url` if needed
///
/// parent directories of the blob and of `pointer_path` are created before
/// any transfer starts.
pub fn ensure_blob<S>(
    storage: &RepoStorage,
    descriptor: &ContentDescriptor,
    pointer_path: &Path,
    source: &S,
    url: &Url,
) -> Result<BlobOutcome>
where
    S: ByteSource + ?Sized,
{
    let blob_path = storage.blob_path(&descriptor.etag);
    let blob_dir = storage.blobs_path();

    fs::create_dir_all(&blob_dir).with_path(&blob_dir)?;
    if let Some(parent) = pointer_path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    // deduplication: if blob already exists, we're done
    if blob_path.exists() {
        debug!(etag = %descriptor.etag, "blob already cached");
        return Ok(BlobOutcome {
            path: blob_path,
            fetched: false,
            bytes: 0,
        });
    }

    let mut response = source.get_bytes(url, None)?;
    if !response.is_success() {
        let mut text = String::new();
        let body = response.body.read_to_string(&mut text).ok().map(|_| text);
        return Err(remote_error(
            response.status,
            url,
            &response.headers,
            body.as_deref(),
        ));
    }

    let tmp_path = incomplete_path(&blob_path);
    debug!(etag = %descriptor.etag, tmp = %tmp_path.display(), %url, "downloading blob");

    let written = match write_incomplete(&tmp_path, &mut response.body, descriptor) {
        Ok(written) => written,
        Err(e) => {
            warn!(tmp = %tmp_path.display(), error = %e, "blob transfer failed");
            return Err(e);
        }
    };

    let path = commit_blob(&tmp_path, &blob_path)?;
    info!(etag = %descriptor.etag, bytes = written, "blob stored");
    Ok(BlobOutcome {
        path,
        fetched: true,
        bytes: written,
    })
}

/// where the bytes come from: the cross-host location learned during
/// resolution when there is one, else the hub's own resolve url
pub fn source_url(descriptor: &ContentDescriptor, resolve_url: &Url) -> Url {
    descriptor
        .direct_location
        .clone()
        .unwrap_or_else(|| resolve_url.clone())
}

/// unique temp name next to the final blob, so the rename stays on one filesystem
fn incomplete_path(blob_path: &Path) -> PathBuf {
    let mut name = blob_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.{}", uuid::Uuid::new_v4(), INCOMPLETE_SUFFIX));
    blob_path.with_file_name(name)
}

/// stream the body to `tmp_path`, fsync it and check it against the descriptor
fn write_incomplete<R: Read + ?Sized>(
    tmp_path: &Path,
    reader: &mut R,
    descriptor: &ContentDescriptor,
) -> Result<u64> {
    let mut hasher = descriptor.is_sha256().then(Sha256::new);
    let mut written = 0u64;
    {
        let mut tmp_file = File::create(tmp_path).with_path(tmp_path)?;
        let mut buf = [0u8; 64 * 1024]; // 64KB buffer
        loop {
            let n = reader.read(&mut buf).with_path(tmp_path)?;
            if n == 0 {
                break;
            }
            if let Some(h) = hasher.as_mut() {
                h.update(&buf[..n]);
            }
            tmp_file.write_all(&buf[..n]).with_path(tmp_path)?;
            written += n as u64;
        }
        tmp_file.sync_all().with_path(tmp_path)?;
    }

    if written != descriptor.size {
        return Err(Error::SizeMismatch {
            etag: descriptor.etag.clone(),
            expected: descriptor.size,
            actual: written,
        });
    }

    if let Some(h) = hasher {
        let actual = hex::encode(h.finalize());
        if !actual.eq_ignore_ascii_case(&descriptor.etag) {
            return Err(Error::ChecksumMismatch {
                etag: descriptor.etag.clone(),
                actual,
            });
        }
    }

    Ok(written)
}

/// move a fully written temp file onto the blob path
///
/// a blob that appeared meanwhile (a concurrent download of the same etag)
/// is kept and the temp file dropped.
fn commit_blob(tmp_path: &Path, blob_path: &Path) -> Result<PathBuf> {
    if blob_path.exists() {
        debug!(blob = %blob_path.display(), "blob appeared concurrently");
        fs::remove_file(tmp_path).with_path(tmp_path)?;
        return Ok(blob_path.to_path_buf());
    }

    fs::rename(tmp_path, blob_path).with_path(blob_path)?;

    if let Some(parent) = blob_path.parent() {
        fsync_dir(parent)?;
    }
    Ok(blob_path.to_path_buf())
}

/// fsync a directory
fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path).with_path(path)?;
    dir.sync_all().with_path(path)?;
    Ok(())
}

/// true for leftovers of interrupted transfers
pub fn is_incomplete(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(INCOMPLETE_SUFFIX)
}
