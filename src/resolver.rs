//! remote descriptor resolution: what content backs a (repo, path, revision)

use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::transport::{
    remote_error, HeadResponse, MetadataClient, ERROR_CODE_ENTRY_NOT_FOUND, HEADER_X_ERROR_CODE,
    HEADER_X_LINKED_ETAG, HEADER_X_LINKED_SIZE, HEADER_X_REPO_COMMIT,
};
use crate::types::{normalize_etag, ContentDescriptor, FileRequest};

/// issue a metadata-only request for a file and describe its content
///
/// returns `Ok(None)` when the hub says the path does not exist at that
/// revision; any other failure is an error.
pub fn resolve_descriptor<C>(client: &C, request: &FileRequest) -> Result<Option<ContentDescriptor>>
where
    C: MetadataClient + ?Sized,
{
    let url = client.file_url(request)?;
    let response = client.head(&url)?;
    let descriptor = descriptor_from_response(&url, &response)?;
    match &descriptor {
        Some(d) => debug!(
            repo = %request.repo,
            path = %request.path,
            revision = %request.revision,
            etag = %d.etag,
            size = d.size,
            direct = d.direct_location.is_some(),
            "resolved descriptor"
        ),
        None => debug!(
            repo = %request.repo,
            path = %request.path,
            revision = %request.revision,
            "entry not found"
        ),
    }
    Ok(descriptor)
}

/// interpret a head response for `url`
///
/// linked headers describe the real content behind a large-file pointer and
/// win over the generic ones. a redirect target is only kept when it leaves
/// the host that was asked.
pub fn descriptor_from_response(
    url: &Url,
    response: &HeadResponse,
) -> Result<Option<ContentDescriptor>> {
    if response.status == 404
        && response.header(HEADER_X_ERROR_CODE) == Some(ERROR_CODE_ENTRY_NOT_FOUND)
    {
        return Ok(None);
    }

    if !response.is_success() && response.location.is_none() {
        return Err(remote_error(response.status, url, &response.headers, None));
    }

    let etag = response
        .header(HEADER_X_LINKED_ETAG)
        .or_else(|| response.header("etag"))
        .map(normalize_etag)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| malformed(url, "expected an etag"))?;
    // the etag becomes a file name under blobs/
    if etag.contains(['/', '\\', '\0']) || etag == "." || etag == ".." {
        return Err(malformed(url, &format!("unusable etag {:?}", etag)));
    }

    let size = response
        .header(HEADER_X_LINKED_SIZE)
        .or_else(|| response.header("content-length"))
        .ok_or_else(|| malformed(url, "expected size information"))?;
    let size = size
        .trim()
        .parse::<u64>()
        .map_err(|_| malformed(url, &format!("invalid file size {:?}", size)))?;

    let direct_location = response
        .location
        .as_ref()
        .filter(|loc| loc.host_str() != url.host_str())
        .cloned();

    let commit_hash = response
        .header(HEADER_X_REPO_COMMIT)
        .map(str::to_string)
        .filter(|c| !c.is_empty());

    Ok(Some(ContentDescriptor {
        etag,
        size,
        commit_hash,
        direct_location,
    }))
}

fn malformed(url: &Url, message: &str) -> Error {
    Error::MalformedResponse {
        url: url.to_string(),
        message: message.to_string(),
    }
}
