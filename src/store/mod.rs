//! store
//!
//! The key-value store: stage writes, group them into commits, push them to
//! a branch on the host, and read files back.
//!
//! # Architecture
//!
//! ```text
//! add ──► StagingArea.changes ──commit──► StagingArea.commits
//!                                               │
//!                                             push
//!                                               ▼
//!                               PushPipeline ──► GitHost (blobs, tree,
//!                                                commit, ref update)
//! get ──────────────────────────────────────────► GitHost (file content)
//! ```
//!
//! A [`GitKvStore`] owns its configuration, its host client and its
//! staging area. Writes take `&mut self`, so one instance never runs two
//! pushes at once. Separate instances share nothing.
//!
//! # Example
//!
//! ```
//! use gitkv::config::{Credential, StoreConfig};
//! use gitkv::host::mock::MockHost;
//! use gitkv::store::{GitKvStore, KvStore};
//!
//! # tokio_test::block_on(async {
//! let config = StoreConfig::new("octocat", "kv-data", Credential::new("token")).unwrap();
//! let mut store = GitKvStore::new(config, MockHost::new());
//!
//! store.set("users/1.json", "{\"name\":\"ada\"}", "Add user 1").await.unwrap();
//! assert_eq!(store.get("users/1.json").await.unwrap(), "{\"name\":\"ada\"}");
//! # });
//! ```

mod branch;
mod pull_request;
mod push;
mod read;
mod stage;

pub use branch::BranchManager;
pub use push::PushPipeline;
pub use stage::StagingArea;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::Result;
use crate::host::github::GitHubHost;
use crate::host::{Creation, GitHost};
use crate::types::{BranchName, Change, Commit, RepoPath};

/// A versioned key-value store addressed by repository paths.
///
/// Values are UTF-8 text. Nothing is visible to `get` until it has been
/// committed and pushed.
#[async_trait]
pub trait KvStore: Send {
    /// Stage `data` at `path`. A leading `/` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` for an empty path.
    fn add(&mut self, path: &str, data: &str) -> Result<()>;

    /// Snapshot everything staged into one queued commit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if nothing is staged.
    fn commit(&mut self, message: &str) -> Result<Commit>;

    /// Push every queued commit to the current branch, creating the branch
    /// from the root branch if needed. Returns how many commits were pushed.
    async fn push(&mut self) -> Result<usize>;

    /// `add`, `commit` and `push` in one call. Returns the new commit.
    ///
    /// Commits queued earlier are pushed along with it.
    async fn set(&mut self, path: &str, data: &str, message: &str) -> Result<Commit>;

    /// Read the file at `path` on the current branch.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the host has no file there.
    async fn get(&self, path: &str) -> Result<String>;

    /// Target another branch for later pushes and reads. Local only.
    fn change_branch(&mut self, branch: &str) -> Result<()>;
}

/// [`KvStore`] backed by a [`GitHost`].
pub struct GitKvStore<H: GitHost> {
    config: StoreConfig,
    host: H,
    staging: StagingArea,
}

impl GitKvStore<GitHubHost> {
    /// Store talking to GitHub with the credential in `config`.
    pub fn from_config(config: StoreConfig) -> Self {
        let host = GitHubHost::from_config(&config);
        Self::new(config, host)
    }
}

impl<H: GitHost> GitKvStore<H> {
    pub fn new(config: StoreConfig, host: H) -> Self {
        debug!(
            owner = config.owner(),
            repo = config.repo(),
            branch = %config.branch(),
            host = host.name(),
            "opened store"
        );
        Self {
            config,
            host,
            staging: StagingArea::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The branch pushes and reads target.
    pub fn branch(&self) -> &BranchName {
        self.config.branch()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Changes staged since the last commit.
    pub fn staged_changes(&self) -> &[Change] {
        self.staging.changes()
    }

    /// Commits queued for push, oldest first.
    pub fn staged_commits(&self) -> &[Commit] {
        self.staging.commits()
    }

    /// Queued commits already applied to the current branch by a push that
    /// later failed. A retry to the same branch skips them.
    pub fn confirmed_commits(&self) -> usize {
        self.staging.confirmed_on(self.config.branch())
    }

    /// Create `branch` from `root` (default: the configured root branch)
    /// unless it already exists.
    pub async fn ensure_branch(&self, branch: &str, root: Option<&str>) -> Result<Creation<()>> {
        let branch = BranchName::new(branch)?;
        let root = match root {
            Some(root) => BranchName::new(root)?,
            None => self.config.root_branch().clone(),
        };
        BranchManager::new(&self.host)
            .ensure_branch(&branch, &root)
            .await
    }

    /// Delete `branch` on the host. `main` and `master` are refused.
    pub async fn delete_branch(&self, branch: &str) -> Result<()> {
        let branch = BranchName::new(branch)?;
        BranchManager::new(&self.host).delete_branch(&branch).await
    }

    /// Open a pull request from the current branch into `base`.
    ///
    /// Returns the pull request URL, or an empty string when one is already
    /// open for the same branches.
    pub async fn open_pull_request(&self, title: &str, body: &str, base: &str) -> Result<String> {
        let base = BranchName::new(base)?;
        pull_request::open_pull_request(&self.host, self.config.branch(), &base, title, body).await
    }
}

#[async_trait]
impl<H: GitHost> KvStore for GitKvStore<H> {
    fn add(&mut self, path: &str, data: &str) -> Result<()> {
        let path = RepoPath::new(path)?;
        debug!(%path, bytes = data.len(), "staged change");
        self.staging.add(Change::new(path, data));
        Ok(())
    }

    fn commit(&mut self, message: &str) -> Result<Commit> {
        let commit = self.staging.commit(message)?;
        debug!(
            msg = message,
            changes = commit.changes.len(),
            queued = self.staging.commits().len(),
            "queued commit"
        );
        Ok(commit)
    }

    async fn push(&mut self) -> Result<usize> {
        PushPipeline::new(&self.host, self.config.branch(), self.config.root_branch())
            .run(&mut self.staging)
            .await
    }

    async fn set(&mut self, path: &str, data: &str, message: &str) -> Result<Commit> {
        self.add(path, data)?;
        let commit = self.commit(message)?;
        self.push().await?;
        Ok(commit)
    }

    async fn get(&self, path: &str) -> Result<String> {
        let path = RepoPath::new(path)?;
        read::read_file(&self.host, self.config.branch(), &path).await
    }

    fn change_branch(&mut self, branch: &str) -> Result<()> {
        let branch = BranchName::new(branch)?;
        info!(from = %self.config.branch(), to = %branch, "changed branch");
        self.config.set_branch(branch);
        Ok(())
    }
}
