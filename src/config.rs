use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::CacheDir;
use crate::error::{IoResultExt, Result};
use crate::transport::Credentials;

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// cache configuration, optionally stored as toml
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// base url of the hub
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// cache root; resolved from the environment when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// access token sent as a bearer credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// per-request timeout
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            cache_dir: None,
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// defaults overridden by `HF_ENDPOINT`, `HF_TOKEN` and the cache variables
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// fill unset fields from the environment; env wins for the endpoint
    pub fn with_env(mut self) -> Self {
        if let Some(endpoint) = non_empty_var("HF_ENDPOINT") {
            self.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if self.token.is_none() {
            self.token = non_empty_var("HF_TOKEN");
        }
        if self.cache_dir.is_none() {
            self.cache_dir = env_cache_dir();
        }
        self
    }

    /// cache root: configured value, else environment, else `~/.cache/huggingface/hub`
    pub fn cache(&self) -> CacheDir {
        let root = self
            .cache_dir
            .clone()
            .or_else(env_cache_dir)
            .unwrap_or_else(|| home_cache_base().join("huggingface").join("hub"));
        CacheDir::new(root)
    }

    pub fn credentials(&self) -> Credentials {
        match &self.token {
            Some(token) => Credentials::from_token(token.clone()),
            None => Credentials::anonymous(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// `HF_HUB_CACHE`, then `HF_HOME/hub`, then `XDG_CACHE_HOME/huggingface/hub`
fn env_cache_dir() -> Option<PathBuf> {
    if let Some(dir) = non_empty_var("HF_HUB_CACHE") {
        return Some(PathBuf::from(dir));
    }
    if let Some(home) = non_empty_var("HF_HOME") {
        return Some(PathBuf::from(home).join("hub"));
    }
    non_empty_var("XDG_CACHE_HOME").map(|xdg| PathBuf::from(xdg).join("huggingface").join("hub"))
}

fn home_cache_base() -> PathBuf {
    dirs_next::home_dir()
        .map(|home| home.join(".cache"))
        .unwrap_or_else(|| PathBuf::from(".cache"))
}
