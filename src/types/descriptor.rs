use url::Url;

/// what the hub reports about a file, learned from a metadata-only request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentDescriptor {
    /// normalized integrity tag (surrounding quotes stripped)
    pub etag: String,
    /// content size in bytes
    pub size: u64,
    /// commit the revision resolved to, if the hub reported it
    pub commit_hash: Option<String>,
    /// cross-host download location for large-file storage content
    pub direct_location: Option<Url>,
}

impl ContentDescriptor {
    /// true when the etag is a sha256 digest of the content (large-file storage)
    pub fn is_sha256(&self) -> bool {
        self.etag.len() == 64 && self.etag.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

/// strip quote characters from an etag header value
///
/// the hub is inconsistent about quoting (`"abc"`, `W/"abc"`, `abc`), and the
/// blob name must not depend on it.
pub fn normalize_etag(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed);
    trimmed.replace('"', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_etag() {
        assert_eq!(normalize_etag("\"abc123\""), "abc123");
        assert_eq!(normalize_etag("abc123"), "abc123");
        assert_eq!(normalize_etag(" \"abc123\" "), "abc123");
        assert_eq!(normalize_etag("W/\"abc123\""), "abc123");
        assert_eq!(normalize_etag("\"ab\"c\""), "abc");
    }

    #[test]
    fn test_is_sha256() {
        let mut d = ContentDescriptor {
            etag: "a".repeat(64),
            size: 0,
            commit_hash: None,
            direct_location: None,
        };
        assert!(d.is_sha256());

        d.etag = "abc123".into();
        assert!(!d.is_sha256());

        d.etag = "z".repeat(64);
        assert!(!d.is_sha256());
    }
}
