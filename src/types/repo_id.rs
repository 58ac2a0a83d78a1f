use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// kind of hub repository
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RepoKind {
    #[default]
    Model,
    Dataset,
    Space,
}

impl RepoKind {
    /// singular name, as used in designations and listings
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoKind::Model => "model",
            RepoKind::Dataset => "dataset",
            RepoKind::Space => "space",
        }
    }

    /// plural name, as used in api routes and storage folders
    pub fn plural(&self) -> &'static str {
        match self {
            RepoKind::Model => "models",
            RepoKind::Dataset => "datasets",
            RepoKind::Space => "spaces",
        }
    }

    /// prefix for file routes on the hub; models live at the root
    pub fn url_prefix(&self) -> Option<&'static str> {
        match self {
            RepoKind::Model => None,
            other => Some(other.plural()),
        }
    }

    fn from_plural(s: &str) -> Option<Self> {
        match s {
            "models" => Some(RepoKind::Model),
            "datasets" => Some(RepoKind::Dataset),
            "spaces" => Some(RepoKind::Space),
            _ => None,
        }
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// identity of a hub repository
///
/// parsed once from a designation such as `org/name`, `datasets/org/name`
/// or `spaces/org/name`; a bare designation is a model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepoId {
    kind: RepoKind,
    name: String,
}

impl RepoId {
    /// build an id from an explicit kind and name
    pub fn new(kind: RepoKind, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { kind, name })
    }

    pub fn model(name: impl Into<String>) -> Result<Self> {
        Self::new(RepoKind::Model, name)
    }

    pub fn dataset(name: impl Into<String>) -> Result<Self> {
        Self::new(RepoKind::Dataset, name)
    }

    pub fn space(name: impl Into<String>) -> Result<Self> {
        Self::new(RepoKind::Space, name)
    }

    pub fn kind(&self) -> RepoKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// cache folder name: `{kind}s--{name}` with `/` replaced by `--`
    pub fn storage_folder(&self) -> String {
        format!("{}--{}", self.kind.plural(), self.name.replace('/', "--"))
    }

    /// parse a storage folder name back into an id
    pub fn from_storage_folder(folder: &str) -> Option<Self> {
        let (kind, rest) = folder.split_once("--")?;
        let kind = RepoKind::from_plural(kind)?;
        Self::new(kind, rest.replace("--", "/")).ok()
    }
}

impl FromStr for RepoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((prefix, rest)) => match RepoKind::from_plural(prefix) {
                Some(kind) => Self::new(kind, rest),
                None => Self::new(RepoKind::Model, s),
            },
            None => Self::new(RepoKind::Model, s),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.url_prefix() {
            Some(prefix) => write!(f, "{}/{}", prefix, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// hub names are at most `namespace/name`; `--` is reserved as the folder separator
fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Err(Error::InvalidRepo(format!("{} ({})", name, reason)));

    if name.is_empty() {
        return invalid("empty name");
    }
    if name.split('/').count() > 2 {
        return invalid("expected at most one '/'");
    }
    if name.contains("--") {
        return invalid("'--' is reserved");
    }
    for segment in name.split('/') {
        if segment.is_empty() {
            return invalid("empty segment");
        }
        if segment == "." || segment == ".." {
            return invalid("'.' and '..' are not allowed");
        }
        if segment.chars().any(|c| c.is_whitespace() || c == '\\' || c == '\0') {
            return invalid("illegal character");
        }
    }
    Ok(())
}
