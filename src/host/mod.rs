//! host
//!
//! Abstraction for the git-hosting service the store writes through.
//!
//! # Modules
//!
//! - `traits`: The [`GitHost`] trait, [`HostError`], and wire-level types
//! - [`github`]: GitHub implementation over the REST git data API
//! - [`mock`]: In-memory host for deterministic testing
//!
//! # Example
//!
//! ```ignore
//! use gitkv::host::github::GitHubHost;
//! use gitkv::host::GitHost;
//!
//! let host = GitHubHost::new(credential, "owner", "repo");
//! let head = host.branch_head(&BranchName::new("main")?).await?;
//! ```

pub mod github;
pub mod mock;
mod traits;

pub use traits::*;
