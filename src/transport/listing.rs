//! paginated recursive tree listing

use std::collections::VecDeque;

use reqwest::header::{HeaderMap, LINK};
use serde::Deserialize;
use url::Url;

use crate::error::Result;
use crate::transport::{HubClient, RepoFile};

#[derive(Deserialize)]
struct TreeEntry {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    oid: Option<String>,
}

/// lazy iterator over the files of a tree listing, one page at a time
///
/// directories are skipped. after an error the iterator is exhausted.
pub struct TreeListing<'a> {
    client: &'a HubClient,
    next: Option<Url>,
    pending: VecDeque<RepoFile>,
}

impl<'a> TreeListing<'a> {
    pub(crate) fn new(client: &'a HubClient, first_page: Url) -> Self {
        Self {
            client,
            next: Some(first_page),
            pending: VecDeque::new(),
        }
    }

    fn fetch_page(&mut self, url: Url) -> Result<()> {
        let response = self.client.get_api(&url)?;
        self.next = next_page_link(response.headers());
        let entries: Vec<TreeEntry> = serde_json::from_str(&response.text()?)?;
        self.pending.extend(
            entries
                .into_iter()
                .filter(|e| e.kind == "file")
                .map(|e| RepoFile {
                    path: e.path,
                    size: e.size,
                    oid: e.oid,
                }),
        );
        Ok(())
    }
}

impl Iterator for TreeListing<'_> {
    type Item = Result<RepoFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(file) = self.pending.pop_front() {
                return Some(Ok(file));
            }
            let url = self.next.take()?;
            if let Err(e) = self.fetch_page(url) {
                self.next = None;
                return Some(Err(e));
            }
        }
    }
}

/// `next` target of a `Link` header: `<https://...>; rel="next", <...>; rel="prev"`
pub fn next_page_link(headers: &HeaderMap) -> Option<Url> {
    let value = headers.get(LINK)?.to_str().ok()?;
    value.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}
