//! store::push
//!
//! Replays queued commits onto the host, one remote commit per local one.
//!
//! # Algorithm
//!
//! For each pending commit, oldest first:
//!
//! 1. Read the branch head and its tree.
//! 2. Create one blob per effective change (last write per path wins),
//!    concurrently.
//! 3. Create a tree from the head's tree plus those blobs.
//! 4. Create a commit with the head as its only parent.
//! 5. Fast-forward the branch to it.
//!
//! Commits go strictly one after another; each builds on the head the
//! previous one produced. After a commit's ref update succeeds it is marked
//! confirmed for that branch, so a retry to the same branch resumes from the
//! first commit that did not land. A push to a different branch replays the
//! whole queue.

use futures::future::try_join_all;
use tracing::{debug, info, instrument, warn};

use super::branch::BranchManager;
use super::stage::StagingArea;
use crate::error::{Result, StoreError};
use crate::host::{BlobEncoding, FileMode, GitHost, HostError, TreeEntry};
use crate::types::{BranchName, Commit, Oid};

/// Pushes the staging queue to one branch.
pub struct PushPipeline<'a, H: GitHost + ?Sized> {
    host: &'a H,
    branch: &'a BranchName,
    root_branch: &'a BranchName,
}

impl<'a, H: GitHost + ?Sized> PushPipeline<'a, H> {
    pub fn new(host: &'a H, branch: &'a BranchName, root_branch: &'a BranchName) -> Self {
        Self {
            host,
            branch,
            root_branch,
        }
    }

    /// Push every pending commit in `staging`.
    ///
    /// Returns the number of commits cleared from the queue. On failure the
    /// queue is kept and commits that already landed stay confirmed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` for any host failure, including a
    /// rejected non-fast-forward ref update.
    #[instrument(skip_all, fields(branch = %self.branch, pending = staging.pending(self.branch).len()))]
    pub async fn run(&self, staging: &mut StagingArea) -> Result<usize> {
        BranchManager::new(self.host)
            .ensure_branch(self.branch, self.root_branch)
            .await?;

        let pending: Vec<Commit> = staging.pending(self.branch).to_vec();
        let total = pending.len();
        for (idx, commit) in pending.iter().enumerate() {
            let sha = self.push_commit(commit).await.map_err(|e| {
                warn!(commit = idx + 1, total, error = %e, "push stopped");
                StoreError::remote(
                    format!("failed to push commit {} of {} to '{}'", idx + 1, total, self.branch),
                    e,
                )
            })?;
            staging.mark_confirmed(self.branch);
            debug!(sha = %sha.short(7), msg = %commit.message, "commit landed");
        }

        let pushed = staging.finish_push();
        if pushed > 0 {
            info!(pushed, "push complete");
        }
        Ok(pushed)
    }

    async fn push_commit(&self, commit: &Commit) -> std::result::Result<Oid, HostError> {
        let head = self.host.branch_head(self.branch).await?;
        let base_tree = self.host.get_commit(&head).await?.tree;

        let changes = commit.effective_changes();
        let blobs = try_join_all(
            changes
                .iter()
                .map(|change| self.host.create_blob(&change.data, BlobEncoding::Utf8)),
        )
        .await?;

        let entries: Vec<TreeEntry> = changes
            .iter()
            .zip(blobs)
            .map(|(change, sha)| TreeEntry {
                path: change.path.clone(),
                mode: FileMode::Regular,
                sha,
            })
            .collect();

        let tree = self.host.create_tree(&base_tree, &entries).await?;
        let sha = self
            .host
            .create_commit(&commit.message, &tree, std::slice::from_ref(&head))
            .await?;
        self.host.update_branch(self.branch, &sha).await?;
        Ok(sha)
    }
}
