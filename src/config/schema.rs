//! config::schema
//!
//! On-disk configuration format.
//!
//! # Example
//!
//! ```toml
//! owner = "octocat"
//! repo = "kv-data"
//! branch = "settings"
//! root_branch = "main"
//! api_base = "https://api.github.com"
//! token = "ghp_..."
//! ```
//!
//! Every field is optional in the file; required values may come from the
//! environment instead (see [`super::StoreConfig::resolve`]).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::types::BranchName;

/// Store configuration as written in a TOML file.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Repository owner (user or organization)
    pub owner: Option<String>,

    /// Repository name
    pub repo: Option<String>,

    /// Branch that reads and writes target
    pub branch: Option<BranchName>,

    /// Branch new branches are forked from
    pub root_branch: Option<BranchName>,

    /// API base URL (GitHub Enterprise)
    pub api_base: Option<String>,

    /// Personal access token. Environment variables take precedence.
    pub token: Option<String>,
}

impl std::fmt::Debug for FileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("root_branch", &self.root_branch)
            .field("api_base", &self.api_base)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

impl FileConfig {
    /// Parse a TOML document.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Validate the values present in the file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(owner) = &self.owner {
            validate_segment("owner", owner)?;
        }
        if let Some(repo) = &self.repo {
            validate_segment("repo", repo)?;
        }
        if let Some(api_base) = &self.api_base {
            validate_api_base(api_base)?;
        }
        Ok(())
    }
}

/// Owner and repo names become URL path segments.
pub(crate) fn validate_segment(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue(format!("{} cannot be empty", field)));
    }
    if value.contains('/') || value.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidValue(format!(
            "invalid {} '{}': must not contain '/' or whitespace",
            field, value
        )));
    }
    Ok(())
}

pub(crate) fn validate_api_base(value: &str) -> Result<(), ConfigError> {
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        return Err(ConfigError::InvalidValue(format!(
            "invalid api_base '{}': must start with http:// or https://",
            value
        )));
    }
    Ok(())
}
