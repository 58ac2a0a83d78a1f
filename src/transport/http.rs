use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT_ENCODING, AUTHORIZATION, LOCATION, RANGE};
use reqwest::redirect;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transport::{
    api_url, remote_error, ByteRange, ByteResponse, ByteSource, HeadResponse, ListingClient,
    MetadataClient, RepoFile, TreeListing,
};
use crate::types::RepoId;

const USER_AGENT: &str = concat!("hub-cache/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_REDIRECTS: usize = 10;

/// optional bearer token sent to the hub
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    access_token: Option<String>,
}

impl Credentials {
    /// no token: requests are unauthenticated
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_token(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            access_token: (!token.trim().is_empty()).then(|| token.trim().to_string()),
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> Option<String> {
        self.access_token.as_ref().map(|t| format!("Bearer {}", t))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.access_token.is_some() {
            "Some(<redacted>)"
        } else {
            "None"
        };
        f.debug_struct("Credentials")
            .field("access_token", &shown)
            .finish()
    }
}

/// blocking http client for a hub
pub struct HubClient {
    endpoint: Url,
    credentials: Credentials,
    /// follows same-host redirects only, used for metadata
    metadata: Client,
    /// follows every redirect, used for api calls and byte transfer
    transfer: Client,
}

/// builder for [`HubClient`]
#[derive(Debug)]
pub struct HubClientBuilder {
    endpoint: Url,
    credentials: Credentials,
    timeout: Duration,
    user_agent: String,
}

impl HubClientBuilder {
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<HubClient> {
        if self.endpoint.cannot_be_a_base() || self.endpoint.host_str().is_none() {
            return Err(Error::InvalidEndpoint(self.endpoint.to_string()));
        }

        let metadata = Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .redirect(same_host_policy())
            .build()?;
        let transfer = Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(HubClient {
            endpoint: self.endpoint,
            credentials: self.credentials,
            metadata,
            transfer,
        })
    }
}

/// follow a redirect only while it stays on the host it came from
fn same_host_policy() -> redirect::Policy {
    redirect::Policy::custom(|attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let same_host = attempt
            .previous()
            .last()
            .map(|prev| prev.host_str() == attempt.url().host_str())
            .unwrap_or(false);
        if same_host {
            attempt.follow()
        } else {
            attempt.stop()
        }
    })
}

impl HubClient {
    pub fn builder(endpoint: Url) -> HubClientBuilder {
        HubClientBuilder {
            endpoint,
            credentials: Credentials::anonymous(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
        }
    }

    pub fn new(endpoint: Url, credentials: Credentials) -> Result<Self> {
        Self::builder(endpoint).credentials(credentials).build()
    }

    /// client configured from endpoint, token, timeout and user agent settings
    pub fn from_config(config: &Config) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)?;
        let mut builder = Self::builder(endpoint)
            .credentials(config.credentials())
            .timeout(Duration::from_secs(config.timeout_secs));
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder.build()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// attach the bearer token, but only for requests to the hub itself;
    /// cross-host locations are presigned and must not see it
    fn authorize(&self, builder: RequestBuilder, url: &Url) -> RequestBuilder {
        match self.credentials.bearer() {
            Some(bearer) if url.host_str() == self.endpoint.host_str() => {
                builder.header(AUTHORIZATION, bearer)
            }
            _ => builder,
        }
    }

    /// fetch one page of the tree listing api
    pub(crate) fn get_api(&self, url: &Url) -> Result<reqwest::blocking::Response> {
        debug!(%url, "api request");
        let response = self
            .authorize(self.transfer.get(url.clone()), url)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().ok();
            return Err(remote_error(status.as_u16(), url, &headers, body.as_deref()));
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct RevisionInfo {
    sha: String,
}

impl MetadataClient for HubClient {
    fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn resolve_revision(&self, repo: &RepoId, revision: &str) -> Result<String> {
        let url = api_url(&self.endpoint, repo, "revision", revision)?;
        let body = self.get_api(&url)?.text()?;
        let info: RevisionInfo = serde_json::from_str(&body)?;
        debug!(%repo, revision, sha = %info.sha, "resolved revision");
        Ok(info.sha)
    }

    fn head(&self, url: &Url) -> Result<HeadResponse> {
        debug!(%url, "metadata request");
        let response = self
            .authorize(self.metadata.head(url.clone()), url)
            .header(ACCEPT_ENCODING, "identity")
            .send()?;

        let status = response.status();
        let final_url = response.url().clone();
        let location = if status.is_redirection() {
            response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|loc| final_url.join(loc).ok())
        } else {
            None
        };

        Ok(HeadResponse {
            status: status.as_u16(),
            url: final_url,
            location,
            headers: response.headers().clone(),
        })
    }
}

impl ListingClient for HubClient {
    fn list_files<'a>(
        &'a self,
        repo: &RepoId,
        revision: &str,
    ) -> Result<Box<dyn Iterator<Item = Result<RepoFile>> + 'a>> {
        let mut url = api_url(&self.endpoint, repo, "tree", revision)?;
        url.query_pairs_mut()
            .append_pair("recursive", "true")
            .append_pair("expand", "false");
        Ok(Box::new(TreeListing::new(self, url)))
    }
}

impl ByteSource for HubClient {
    fn get_bytes(&self, url: &Url, range: Option<ByteRange>) -> Result<ByteResponse> {
        debug!(%url, ?range, "byte transfer");
        let mut request = self
            .authorize(self.transfer.get(url.clone()), url)
            .header(ACCEPT_ENCODING, "identity");
        if let Some(range) = range {
            request = request.header(RANGE, range.header_value());
        }
        let response = request.send()?;

        Ok(ByteResponse {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            body: Box::new(response),
        })
    }
}
