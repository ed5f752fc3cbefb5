//! config
//!
//! Store configuration: repository coordinates, target branch, credential.
//!
//! # Sources
//!
//! A [`StoreConfig`] is either built in code ([`StoreConfig::new`]) or
//! loaded from a TOML file plus the environment ([`StoreConfig::load`]).
//!
//! Config files are searched in order:
//! 1. The explicit path passed to `load`
//! 2. `$GITKV_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/gitkv/config.toml`
//! 4. `~/.gitkv/config.toml`
//!
//! # Credential Precedence
//!
//! 1. `$GITKV_TOKEN`
//! 2. `$GITHUB_PERSONAL_ACCESS_TOKEN`
//! 3. `token` in the config file
//!
//! # Example
//!
//! ```
//! use gitkv::config::{Credential, StoreConfig};
//! use gitkv::types::BranchName;
//!
//! let config = StoreConfig::new("octocat", "kv-data", Credential::new("ghp_xxx"))
//!     .unwrap()
//!     .with_branch(BranchName::new("settings").unwrap());
//!
//! assert_eq!(config.branch().as_str(), "settings");
//! assert_eq!(config.root_branch().as_str(), "main");
//! ```

pub mod schema;

pub use schema::FileConfig;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::host::github::{parse_github_url, DEFAULT_API_BASE};
use crate::types::BranchName;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "GITKV_CONFIG";

/// Environment variables checked for a credential, in order.
pub const TOKEN_ENVS: [&str; 2] = ["GITKV_TOKEN", "GITHUB_PERSONAL_ACCESS_TOKEN"];

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("missing required config value: {0}")]
    Missing(&'static str),

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("not a GitHub remote: {0}")]
    InvalidRemote(String),
}

/// A bearer credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Resolved configuration for one store instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    owner: String,
    repo: String,
    branch: BranchName,
    root_branch: BranchName,
    api_base: String,
    credential: Credential,
}

impl StoreConfig {
    /// Create a config for `owner/repo` targeting the default branch.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if owner or repo are empty or
    /// contain `/`.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        credential: Credential,
    ) -> Result<Self, ConfigError> {
        let owner = owner.into();
        let repo = repo.into();
        schema::validate_segment("owner", &owner)?;
        schema::validate_segment("repo", &repo)?;

        Ok(Self {
            owner,
            repo,
            branch: BranchName::main(),
            root_branch: BranchName::main(),
            api_base: DEFAULT_API_BASE.to_string(),
            credential,
        })
    }

    /// Create a config from a GitHub remote URL.
    ///
    /// # Example
    ///
    /// ```
    /// use gitkv::config::{Credential, StoreConfig};
    ///
    /// let config = StoreConfig::from_remote_url(
    ///     "git@github.com:octocat/kv-data.git",
    ///     Credential::new("token"),
    /// ).unwrap();
    /// assert_eq!(config.owner(), "octocat");
    /// assert_eq!(config.repo(), "kv-data");
    /// ```
    pub fn from_remote_url(url: &str, credential: Credential) -> Result<Self, ConfigError> {
        let (owner, repo) =
            parse_github_url(url).ok_or_else(|| ConfigError::InvalidRemote(url.to_string()))?;
        Self::new(owner, repo, credential)
    }

    /// Set the branch reads and writes target.
    pub fn with_branch(mut self, branch: BranchName) -> Self {
        self.branch = branch;
        self
    }

    /// Set the branch new branches are created from.
    pub fn with_root_branch(mut self, root_branch: BranchName) -> Self {
        self.root_branch = root_branch;
        self
    }

    /// Point at a different API base (GitHub Enterprise, test servers).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` unless the URL is http(s).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Result<Self, ConfigError> {
        let api_base = api_base.into();
        schema::validate_api_base(&api_base)?;
        self.api_base = api_base.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Load configuration from a file and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or
    /// parsed, or if owner, repo, or credential are missing from every
    /// source.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match Self::find_config_file(path) {
            Some(path) => Self::read_file(&path)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Combine a parsed file with environment lookups.
    ///
    /// `env` is consulted for the credential variables in [`TOKEN_ENVS`].
    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        file.validate()?;

        let token = TOKEN_ENVS
            .iter()
            .find_map(|key| env(key).filter(|v| !v.is_empty()))
            .or(file.token)
            .ok_or(ConfigError::Missing("token"))?;

        let owner = file.owner.ok_or(ConfigError::Missing("owner"))?;
        let repo = file.repo.ok_or(ConfigError::Missing("repo"))?;

        let mut config = Self::new(owner, repo, Credential::new(token))?;
        if let Some(branch) = file.branch {
            config = config.with_branch(branch);
        }
        if let Some(root_branch) = file.root_branch {
            config = config.with_root_branch(root_branch);
        }
        if let Some(api_base) = file.api_base {
            config = config.with_api_base(api_base)?;
        }
        Ok(config)
    }

    fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            candidates.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg_home).join("gitkv/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".gitkv/config.toml"));
        }

        candidates.into_iter().find(|path| path.exists())
    }

    fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        FileConfig::parse(&text).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    pub fn root_branch(&self) -> &BranchName {
        &self.root_branch
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Repoint the target branch in place.
    pub(crate) fn set_branch(&mut self, branch: BranchName) {
        self.branch = branch;
    }
}
