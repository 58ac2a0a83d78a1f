//! high-level operations on the download cache

mod download;
mod scan;
mod sync;

pub use download::{download_file, ensure_file_cached, fetch_descriptor, CacheOptions, CachedFile};
pub use scan::{scan_cache, CacheReport, RepoReport, RevisionReport};
pub use sync::{synchronize_repository, FailurePolicy, SyncFailure, SyncOptions, SyncReport};
