//! narrow interfaces to the hub, and the default http implementation
//!
//! the cache core only talks to the hub through [`MetadataClient`],
//! [`ListingClient`] and [`ByteSource`]; [`HubClient`] implements all three
//! over blocking reqwest.

mod http;
mod listing;

use std::fmt;
use std::io::Read;

use reqwest::header::HeaderMap;
use url::Url;

use crate::error::{Error, Result};
use crate::types::{FileRequest, RepoId};

pub use http::{Credentials, HubClient, HubClientBuilder};
pub use listing::{next_page_link, TreeListing};

pub const HEADER_X_REPO_COMMIT: &str = "x-repo-commit";
pub const HEADER_X_LINKED_ETAG: &str = "x-linked-etag";
pub const HEADER_X_LINKED_SIZE: &str = "x-linked-size";
pub const HEADER_X_ERROR_CODE: &str = "x-error-code";
pub const HEADER_X_ERROR_MESSAGE: &str = "x-error-message";

/// value of `X-Error-Code` when a path does not exist at a revision
pub const ERROR_CODE_ENTRY_NOT_FOUND: &str = "EntryNotFound";

/// answer to a metadata-only request
#[derive(Clone, Debug)]
pub struct HeadResponse {
    pub status: u16,
    /// url that produced this response, after same-host redirects
    pub url: Url,
    /// target of a redirect that was not followed
    pub location: Option<Url>,
    pub headers: HeaderMap,
}

impl HeadResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_str(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// answer to a byte transfer request, body not yet read
pub struct ByteResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Box<dyn Read + Send>,
}

impl ByteResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for ByteResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// inclusive byte range, as sent in a `Range` header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// one file entry of a recursive repository listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoFile {
    pub path: String,
    pub size: u64,
    pub oid: Option<String>,
}

/// repository metadata lookups
pub trait MetadataClient {
    /// base url of the hub
    fn endpoint(&self) -> &Url;

    /// resolve a branch, tag or commit to a full commit hash
    fn resolve_revision(&self, repo: &RepoId, revision: &str) -> Result<String>;

    /// metadata-only request; same-host redirects are followed, cross-host ones are not
    fn head(&self, url: &Url) -> Result<HeadResponse>;

    /// resolve (or raw) url of a file on this hub
    fn file_url(&self, request: &FileRequest) -> Result<Url> {
        file_url(self.endpoint(), request)
    }
}

/// recursive file listing
pub trait ListingClient {
    /// lazily list every file of a repository at a revision
    fn list_files<'a>(
        &'a self,
        repo: &RepoId,
        revision: &str,
    ) -> Result<Box<dyn Iterator<Item = Result<RepoFile>> + 'a>>;
}

/// byte transfer
pub trait ByteSource {
    /// start a download; the caller reads the body
    fn get_bytes(&self, url: &Url, range: Option<ByteRange>) -> Result<ByteResponse>;
}

/// build the hub url of a file:
/// `{endpoint}/[datasets/|spaces/]{name}/{resolve|raw}/{revision}/{path}`
///
/// the revision is a single percent-encoded segment, so `refs/pr/1` becomes
/// `refs%2Fpr%2F1`.
pub fn file_url(endpoint: &Url, request: &FileRequest) -> Result<Url> {
    let mut url = endpoint.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| Error::InvalidEndpoint(endpoint.to_string()))?;
        segments.pop_if_empty();
        if let Some(prefix) = request.repo.kind().url_prefix() {
            segments.push(prefix);
        }
        segments.extend(request.repo.name().split('/'));
        segments.push(if request.raw { "raw" } else { "resolve" });
        segments.push(&request.revision);
        segments.extend(request.path.split('/'));
    }
    Ok(url)
}

/// build an api url: `{endpoint}/api/{kind}s/{name}/{action}/{revision}`
pub fn api_url(endpoint: &Url, repo: &RepoId, action: &str, revision: &str) -> Result<Url> {
    let mut url = endpoint.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| Error::InvalidEndpoint(endpoint.to_string()))?;
        segments.pop_if_empty();
        segments.push("api");
        segments.push(repo.kind().plural());
        segments.extend(repo.name().split('/'));
        segments.push(action);
        segments.push(revision);
    }
    Ok(url)
}

/// header value as str, if present and valid ascii
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// turn a non-success response into a remote error
///
/// the hub reports its own message in `X-Error-Message`, or in the `error`
/// field of a json body.
pub fn remote_error(status: u16, url: &Url, headers: &HeaderMap, body: Option<&str>) -> Error {
    let message = header_str(headers, HEADER_X_ERROR_MESSAGE)
        .map(str::to_string)
        .or_else(|| body.and_then(json_error_message));
    Error::Remote {
        status,
        url: url.to_string(),
        message,
    }
}

fn json_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| item.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}
