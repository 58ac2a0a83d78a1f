//! hubcache CLI - fetch hub files into the local content-addressed cache

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hubcache::ops::{
    ensure_file_cached, fetch_descriptor, scan_cache, synchronize_repository, CacheOptions,
    FailurePolicy, SyncOptions,
};
use hubcache::{CacheDir, Config, FileRequest, HubClient, RepoId};

#[derive(Parser)]
#[command(name = "hubcache")]
#[command(about = "content-addressed download cache for model and dataset hubs")]
#[command(version)]
struct Cli {
    /// toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// cache root (default: HF_HUB_CACHE, HF_HOME/hub or ~/.cache/huggingface/hub)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// hub base url
    #[arg(long, global = true, env = "HF_ENDPOINT")]
    endpoint: Option<String>,

    /// access token
    #[arg(long, global = true, env = "HF_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// more logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// cache a single file and print its snapshot path
    Download {
        /// repository, e.g. `org/name` or `datasets/org/name`
        repo: String,

        /// file path inside the repository
        path: String,

        /// branch, tag or commit
        #[arg(short, long)]
        revision: Option<String>,

        /// fetch the raw git object instead of large-file content
        #[arg(long)]
        raw: bool,

        /// only use what is already cached
        #[arg(long)]
        offline: bool,
    },

    /// show etag, size and commit of a remote file
    Info {
        /// repository
        repo: String,

        /// file path inside the repository
        path: String,

        /// branch, tag or commit
        #[arg(short, long)]
        revision: Option<String>,

        #[arg(long)]
        raw: bool,
    },

    /// cache every file of a repository revision
    Snapshot {
        /// repository
        repo: String,

        /// branch, tag or commit
        #[arg(short, long)]
        revision: Option<String>,

        /// only files matching these globs
        #[arg(long)]
        include: Vec<String>,

        /// skip files matching these globs
        #[arg(long)]
        exclude: Vec<String>,

        /// keep going after a file fails
        #[arg(long)]
        keep_going: bool,
    },

    /// list cached repositories
    Scan,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hubcache={level}")));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// file config, then environment, then flags
fn load_config(cli: &Cli) -> hubcache::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .with_env();

    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.trim_end_matches('/').to_string();
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    Ok(config)
}

fn run(cli: Cli) -> hubcache::Result<ExitCode> {
    let config = load_config(&cli)?;
    let cache = config.cache();

    match cli.command {
        Commands::Download {
            repo,
            path,
            revision,
            raw,
            offline,
        } => {
            let request = FileRequest::new(repo.parse()?, &path, revision.as_deref())?.raw(raw);
            let client = HubClient::from_config(&config)?;
            let options = CacheOptions {
                local_only: offline,
            };
            let file = ensure_file_cached(&client, &cache, &request, options)?;
            println!("{}", file.pointer.display());
        }

        Commands::Info {
            repo,
            path,
            revision,
            raw,
        } => {
            let request = FileRequest::new(repo.parse()?, &path, revision.as_deref())?.raw(raw);
            let client = HubClient::from_config(&config)?;
            let descriptor = fetch_descriptor(&client, &request)?;

            println!("etag {}", descriptor.etag);
            println!("size {}", descriptor.size);
            if let Some(commit) = &descriptor.commit_hash {
                println!("commit {}", commit);
            }
            if let Some(location) = &descriptor.direct_location {
                println!("location {}", location);
            }
        }

        Commands::Snapshot {
            repo,
            revision,
            include,
            exclude,
            keep_going,
        } => {
            let repo: RepoId = repo.parse()?;
            let client = HubClient::from_config(&config)?;
            let options = SyncOptions {
                failure_policy: if keep_going {
                    FailurePolicy::Continue
                } else {
                    FailurePolicy::Abort
                },
                include,
                exclude,
            };
            let report =
                synchronize_repository(&client, &cache, &repo, revision.as_deref(), &options)?;

            for failure in &report.failures {
                eprintln!("failed {}: {}", failure.path, failure.error);
            }
            println!("{}", report.snapshot.display());
            if !report.is_complete() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Scan => print_scan(&cache)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn print_scan(cache: &CacheDir) -> hubcache::Result<()> {
    let report = scan_cache(cache)?;

    for repo in &report.repos {
        println!(
            "{} {} ({} blobs, {} bytes)",
            repo.repo.kind(),
            repo.repo.name(),
            repo.blobs,
            repo.blob_bytes
        );
        for rev in &repo.revisions {
            let refs = if rev.refs.is_empty() {
                String::new()
            } else {
                format!(" [{}]", rev.refs.join(", "))
            };
            println!("  {} {} files{}", rev.revision, rev.files, refs);
            if rev.broken > 0 {
                println!("    {} broken pointers", rev.broken);
            }
        }
        if repo.incomplete > 0 {
            println!(
                "  {} incomplete downloads ({} bytes)",
                repo.incomplete, repo.incomplete_bytes
            );
        }
    }
    println!(
        "{} repositories, {} bytes in {}",
        report.repos.len(),
        report.size_on_disk(),
        cache.path().display()
    );
    Ok(())
}
