//! gitkv - A key-value store persisted as commits on a GitHub branch
//!
//! Keys are repository paths and values are UTF-8 file contents. Writes are
//! staged locally, grouped into commits, and pushed through the GitHub git
//! data API as real commits on a branch, so the history of every key is
//! ordinary git history.
//!
//! # Architecture
//!
//! - [`store`] - Staging, local commits, the push pipeline, reads, branches
//!   and pull requests
//! - [`host`] - The git-hosting API the store is built on (GitHub, in-memory mock)
//! - [`config`] - Repository, branch and credential configuration
//! - [`types`] - Validated branch names, object ids and repository paths
//! - [`error`] - Store error taxonomy
//!
//! # Correctness Invariants
//!
//! 1. Each local commit becomes exactly one remote commit whose parent is the
//!    branch head it was built on
//! 2. Branch refs only move forward
//! 3. A failed push loses no queued commit, and a retry never re-applies a
//!    commit that already landed
//! 4. Reads return only data that was pushed
//!
//! # Example
//!
//! ```no_run
//! use gitkv::config::StoreConfig;
//! use gitkv::store::{GitKvStore, KvStore};
//!
//! # async fn run() -> Result<(), gitkv::error::StoreError> {
//! let config = StoreConfig::load(None)?;
//! let mut store = GitKvStore::from_config(config);
//!
//! store.add("users/1.json", r#"{"name":"ada"}"#)?;
//! store.add("users/2.json", r#"{"name":"grace"}"#)?;
//! store.commit("Add users")?;
//! store.push().await?;
//!
//! let _user = store.get("users/1.json").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod store;
pub mod types;

pub use config::{Credential, StoreConfig};
pub use error::{Result, StoreError};
pub use host::{GitHost, HostError};
pub use store::{GitKvStore, KvStore};
