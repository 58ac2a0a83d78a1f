mod descriptor;
mod repo_id;
mod request;

pub use descriptor::{normalize_etag, ContentDescriptor};
pub use repo_id::{RepoId, RepoKind};
pub use request::{
    is_commit_hash, normalize_path, validate_revision, FileRequest, DEFAULT_REVISION,
};
