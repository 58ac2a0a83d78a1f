//! hubcache - content-addressed download cache for a model/dataset hub
//!
//! keeps files fetched from a hugging face style hub on disk so that the same
//! content is never downloaded twice, while every revision of a repository
//! keeps its own stable view of its files.
//!
//! # Layout
//!
//! ```text
//! <cache root>/models--org--name/
//!   blobs/<etag>                                one file per distinct content
//!   refs/main                                   commit `main` last resolved to
//!   snapshots/<commit>/<path> -> ../../blobs/<etag>
//! ```
//!
//! - **Blob**: file content named by its etag; present only once complete
//! - **Snapshot pointer**: relative symlink from a revision's path to a blob
//! - **Ref**: symbolic revision (branch, tag) to commit mapping
//!
//! a commit's snapshot never changes, so a pointer that exists for a commit
//! hash is served without asking the hub.
//!
//! # Example usage
//!
//! ```no_run
//! use hubcache::{ops, CacheDir, Config, FileRequest, HubClient, RepoId};
//!
//! let config = Config::from_env();
//! let client = HubClient::from_config(&config).unwrap();
//! let cache: CacheDir = config.cache();
//!
//! // fetch one file
//! let repo: RepoId = "openai-community/gpt2".parse().unwrap();
//! let request = FileRequest::new(repo.clone(), "config.json", None).unwrap();
//! let file = ops::ensure_file_cached(&client, &cache, &request, Default::default()).unwrap();
//! println!("{}", file.pointer.display());
//!
//! // mirror a whole revision
//! let report = ops::synchronize_repository(&client, &cache, &repo, Some("main"), &Default::default()).unwrap();
//! println!("{}", report.snapshot.display());
//! ```

mod blob;
mod cache;
mod config;
mod error;
mod refs;
mod resolver;
mod snapshot;

#[cfg(test)]
mod testing;

pub mod ops;
pub mod transport;
pub mod types;

pub use blob::{ensure_blob, is_incomplete, source_url, BlobOutcome};
pub use cache::{relative_blob_target, CacheDir, RepoStorage};
pub use config::{Config, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS};
pub use error::{Error, Result};
pub use refs::{list_refs, read_ref, resolve_local, write_ref};
pub use resolver::{descriptor_from_response, resolve_descriptor};
pub use snapshot::{fast_path, link, resolve_pointer};
pub use transport::{Credentials, HubClient};
pub use types::{ContentDescriptor, FileRequest, RepoId, RepoKind};
