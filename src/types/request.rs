use crate::error::{Error, Result};
use crate::types::RepoId;

/// revision used when the caller gives none
pub const DEFAULT_REVISION: &str = "main";

/// true if the revision is a full 40-char lowercase hex commit id
pub fn is_commit_hash(revision: &str) -> bool {
    revision.len() == 40
        && revision
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// one file of one repository at one revision
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRequest {
    pub repo: RepoId,
    /// relative path inside the repository, without a leading `/`
    pub path: String,
    pub revision: String,
    /// fetch the raw git object (the pointer file for large-file storage content)
    pub raw: bool,
}

impl FileRequest {
    /// build a request, validating path and revision before any network activity
    pub fn new(repo: RepoId, path: &str, revision: Option<&str>) -> Result<Self> {
        let path = normalize_path(path)?;
        let revision = revision.unwrap_or(DEFAULT_REVISION);
        validate_revision(revision)?;
        Ok(Self {
            repo,
            path,
            revision: revision.to_string(),
            raw: false,
        })
    }

    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// same file pinned to another revision
    pub fn at_revision(&self, revision: &str) -> Self {
        Self {
            revision: revision.to_string(),
            ..self.clone()
        }
    }
}

/// trim leading `/` and reject empty, directory-like or traversing paths
pub fn normalize_path(path: &str) -> Result<String> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        return Err(Error::InvalidPath(format!("{:?} is not a file path", path)));
    }
    if trimmed.contains('\0') || trimmed.contains('\\') {
        return Err(Error::InvalidPath(format!(
            "{:?} contains an illegal character",
            path
        )));
    }
    for component in trimmed.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(Error::InvalidPath(format!(
                "{:?} contains an empty, '.' or '..' component",
                path
            )));
        }
    }
    Ok(trimmed.to_string())
}

/// revisions become directory names under `snapshots/` and `refs/`
pub fn validate_revision(revision: &str) -> Result<()> {
    if revision.is_empty() {
        return Err(Error::InvalidRevision("empty revision".to_string()));
    }
    if revision.starts_with('/') || revision.ends_with('/') {
        return Err(Error::InvalidRevision(format!(
            "revision cannot start or end with '/': {}",
            revision
        )));
    }
    if revision.contains('\0') || revision.contains('\\') {
        return Err(Error::InvalidRevision(format!(
            "revision contains an illegal character: {}",
            revision
        )));
    }
    for component in revision.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(Error::InvalidRevision(format!(
                "revision cannot contain empty, '.' or '..' components: {}",
                revision
            )));
        }
    }
    Ok(())
}
