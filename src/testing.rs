//! in-memory hub used by unit tests

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::Mutex;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::{Error, Result};
use crate::transport::{
    file_url, ByteRange, ByteResponse, ByteSource, HeadResponse, ListingClient, MetadataClient,
    RepoFile, ERROR_CODE_ENTRY_NOT_FOUND, HEADER_X_ERROR_CODE,
};
use crate::types::{FileRequest, RepoId};

pub const ENDPOINT: &str = "https://hub.test";
pub const CDN: &str = "https://cdn.test";

type ReaderFactory = Box<dyn Fn() -> Box<dyn Read + Send> + Send>;

enum Body {
    Bytes(Vec<u8>),
    Status(u16, String),
    Reader(ReaderFactory),
}

#[derive(Default)]
struct State {
    heads: HashMap<String, HeadResponse>,
    bodies: HashMap<String, Body>,
    revisions: HashMap<(String, String), String>,
    listings: HashMap<(String, String), Vec<RepoFile>>,
    head_calls: usize,
    get_calls: usize,
    resolve_calls: usize,
    list_calls: usize,
}

/// fake hub implementing every collaborator trait, with call counters
pub struct FakeHub {
    endpoint: Url,
    state: Mutex<State>,
}

impl FakeHub {
    pub fn new() -> Self {
        Self {
            endpoint: Url::parse(ENDPOINT).unwrap(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn serve_head(&self, url: &str, response: HeadResponse) {
        self.state().heads.insert(url.to_string(), response);
    }

    pub fn serve_bytes(&self, url: &str, content: &[u8]) {
        self.state()
            .bodies
            .insert(url.to_string(), Body::Bytes(content.to_vec()));
    }

    pub fn serve_status(&self, url: &str, status: u16, body: &str) {
        self.state()
            .bodies
            .insert(url.to_string(), Body::Status(status, body.to_string()));
    }

    pub fn serve_reader<F>(&self, url: &str, factory: F)
    where
        F: Fn() -> Box<dyn Read + Send> + Send + 'static,
    {
        self.state()
            .bodies
            .insert(url.to_string(), Body::Reader(Box::new(factory)));
    }

    pub fn set_revision(&self, repo: &RepoId, revision: &str, commit: &str) {
        self.state()
            .revisions
            .insert((repo.to_string(), revision.to_string()), commit.to_string());
    }

    /// register a regular file under `revision` (resolving to `commit`) and under
    /// `commit` itself: head, bytes and listing entry
    pub fn add_file(
        &self,
        repo: &RepoId,
        revision: &str,
        commit: &str,
        path: &str,
        content: &[u8],
        etag: &str,
    ) {
        self.set_revision(repo, revision, commit);
        self.set_revision(repo, commit, commit);
        for rev in [revision, commit] {
            let req = FileRequest::new(repo.clone(), path, Some(rev)).unwrap();
            let url = file_url(&self.endpoint, &req).unwrap();
            self.serve_head(
                url.as_str(),
                head(
                    200,
                    &url,
                    &[
                        ("etag", format!("\"{}\"", etag).as_str()),
                        ("content-length", content.len().to_string().as_str()),
                        ("x-repo-commit", commit),
                    ],
                ),
            );
            self.serve_bytes(url.as_str(), content);
        }
        self.add_listing_entry(repo, commit, path, content.len() as u64);
    }

    /// register a large-file storage file whose head redirects to the cdn
    pub fn add_lfs_file(
        &self,
        repo: &RepoId,
        revision: &str,
        commit: &str,
        path: &str,
        content: &[u8],
        sha256: &str,
    ) {
        self.set_revision(repo, revision, commit);
        self.set_revision(repo, commit, commit);
        let cdn = Url::parse(&format!("{}/{}?sig=1", CDN, sha256)).unwrap();
        for rev in [revision, commit] {
            let req = FileRequest::new(repo.clone(), path, Some(rev)).unwrap();
            let url = file_url(&self.endpoint, &req).unwrap();
            let mut response = head(
                302,
                &url,
                &[
                    ("etag", "\"pointer\""),
                    ("content-length", "134"),
                    ("x-linked-etag", format!("\"{}\"", sha256).as_str()),
                    ("x-linked-size", content.len().to_string().as_str()),
                    ("x-repo-commit", commit),
                ],
            );
            response.location = Some(cdn.clone());
            self.serve_head(url.as_str(), response);
        }
        self.serve_bytes(cdn.as_str(), content);
        self.add_listing_entry(repo, commit, path, content.len() as u64);
    }

    pub fn add_listing_entry(&self, repo: &RepoId, commit: &str, path: &str, size: u64) {
        self.state()
            .listings
            .entry((repo.to_string(), commit.to_string()))
            .or_default()
            .push(RepoFile {
                path: path.to_string(),
                size,
                oid: None,
            });
    }

    pub fn head_count(&self) -> usize {
        self.state().head_calls
    }

    pub fn get_count(&self) -> usize {
        self.state().get_calls
    }

    pub fn resolve_count(&self) -> usize {
        self.state().resolve_calls
    }

    pub fn list_count(&self) -> usize {
        self.state().list_calls
    }
}

/// build a head response with lowercase header names
pub fn head(status: u16, url: &Url, headers: &[(&str, &str)]) -> HeadResponse {
    let mut map = HeaderMap::new();
    for (k, v) in headers {
        map.insert(
            HeaderName::from_bytes(k.as_bytes()).unwrap(),
            HeaderValue::from_str(v).unwrap(),
        );
    }
    HeadResponse {
        status,
        url: url.clone(),
        location: None,
        headers: map,
    }
}

impl MetadataClient for FakeHub {
    fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn resolve_revision(&self, repo: &RepoId, revision: &str) -> Result<String> {
        let mut state = self.state();
        state.resolve_calls += 1;
        state
            .revisions
            .get(&(repo.to_string(), revision.to_string()))
            .cloned()
            .ok_or_else(|| Error::Remote {
                status: 404,
                url: format!("{}/api/{}/revision/{}", ENDPOINT, repo, revision),
                message: Some(format!("Invalid rev id: {}", revision)),
            })
    }

    fn head(&self, url: &Url) -> Result<HeadResponse> {
        let mut state = self.state();
        state.head_calls += 1;
        Ok(state.heads.get(url.as_str()).cloned().unwrap_or_else(|| {
            head(404, url, &[(HEADER_X_ERROR_CODE, ERROR_CODE_ENTRY_NOT_FOUND)])
        }))
    }
}

impl ListingClient for FakeHub {
    fn list_files<'a>(
        &'a self,
        repo: &RepoId,
        revision: &str,
    ) -> Result<Box<dyn Iterator<Item = Result<RepoFile>> + 'a>> {
        let mut state = self.state();
        state.list_calls += 1;
        let files = state
            .listings
            .get(&(repo.to_string(), revision.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(files.into_iter().map(Ok)))
    }
}

impl ByteSource for FakeHub {
    fn get_bytes(&self, url: &Url, range: Option<ByteRange>) -> Result<ByteResponse> {
        let mut state = self.state();
        state.get_calls += 1;
        let (status, body): (u16, Box<dyn Read + Send>) = match state.bodies.get(url.as_str()) {
            Some(Body::Bytes(bytes)) => match range {
                Some(r) => {
                    let end = (r.end as usize + 1).min(bytes.len());
                    let start = (r.start as usize).min(end);
                    (206, Box::new(Cursor::new(bytes[start..end].to_vec())))
                }
                None => (200, Box::new(Cursor::new(bytes.clone()))),
            },
            Some(Body::Status(status, text)) => {
                (*status, Box::new(Cursor::new(text.clone().into_bytes())))
            }
            Some(Body::Reader(factory)) => (200, factory()),
            None => (404, Box::new(Cursor::new(Vec::new()))),
        };
        Ok(ByteResponse {
            status,
            headers: HeaderMap::new(),
            body,
        })
    }
}

/// reader that hands out its data, then fails like a dropped connection
pub struct FailingReader {
    data: Cursor<Vec<u8>>,
}

impl FailingReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Cursor::new(data),
        }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read(buf)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset mid-body",
            ));
        }
        Ok(n)
    }
}
