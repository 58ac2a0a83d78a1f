use std::path::PathBuf;

/// error type for hub cache operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid repository designation: {0}")]
    InvalidRepo(String),

    #[error("invalid file path: {0}")]
    InvalidPath(String),

    #[error("invalid revision: {0}")]
    InvalidRevision(String),

    #[error("invalid hub endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("{path} not found in {repo} at revision {revision}")]
    NotFound {
        repo: String,
        path: String,
        revision: String,
    },

    #[error("{path} at revision {revision} of {repo} is not in the local cache")]
    NotCached {
        repo: String,
        path: String,
        revision: String,
    },

    #[error("malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("remote error {status} for {url}{}", format_remote_message(.message))]
    Remote {
        status: u16,
        url: String,
        message: Option<String>,
    },

    #[error("size mismatch for blob {etag}: expected {expected} bytes, received {actual}")]
    SizeMismatch {
        etag: String,
        expected: u64,
        actual: u64,
    },

    #[error("checksum mismatch for blob {etag}: received content hashes to {actual}")]
    ChecksumMismatch { etag: String, actual: String },

    #[error("invalid glob pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

fn format_remote_message(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {}", m),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_carries_server_message() {
        let err = Error::Remote {
            status: 401,
            url: "https://hub.test/x".into(),
            message: Some("Invalid credentials".into()),
        };
        assert_eq!(
            err.to_string(),
            "remote error 401 for https://hub.test/x: Invalid credentials"
        );

        let err = Error::Remote {
            status: 500,
            url: "https://hub.test/x".into(),
            message: None,
        };
        assert_eq!(err.to_string(), "remote error 500 for https://hub.test/x");
    }

    #[test]
    fn test_not_found_mentions_path_and_revision() {
        let err = Error::NotFound {
            repo: "hello-world".into(),
            path: "README.md".into(),
            revision: "main".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("README.md"));
        assert!(msg.contains("main"));
    }

    #[test]
    fn test_with_path() {
        let res: std::io::Result<()> = Err(std::io::Error::other("boom"));
        let err = res.with_path("/tmp/x").unwrap_err();
        assert!(matches!(err, Error::Io { ref path, .. } if path == &PathBuf::from("/tmp/x")));
    }
}
