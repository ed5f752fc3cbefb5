//! store::stage
//!
//! In-memory staging of writes and local commits.
//!
//! # Invariants
//!
//! - `commit` moves every staged change into one new [`Commit`], or fails
//!   and moves nothing.
//! - Queued commits keep creation order.
//! - The confirmed mark counts queued commits already applied to one named
//!   branch. It only applies to pushes to that same branch, and it resets
//!   when the queue is cleared.

use chrono::Utc;

use crate::error::{Result, StoreError};
use crate::types::{BranchName, Change, Commit};

/// Staged changes and the queue of commits awaiting push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingArea {
    changes: Vec<Change>,
    commits: Vec<Commit>,
    /// Branch the leading queued commits landed on, and how many.
    confirmed: Option<(BranchName, usize)>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a change. Same-path changes are all kept.
    pub fn add(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Snapshot all staged changes into a queued commit stamped with now.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if nothing is staged.
    pub fn commit(&mut self, message: &str) -> Result<Commit> {
        self.commit_at(message, Utc::now().timestamp_millis())
    }

    pub(crate) fn commit_at(&mut self, message: &str, timestamp: i64) -> Result<Commit> {
        if self.changes.is_empty() {
            return Err(StoreError::Validation("No changes to commit".into()));
        }

        let commit = Commit {
            message: message.to_string(),
            changes: std::mem::take(&mut self.changes),
            timestamp,
        };
        self.commits.push(commit.clone());
        Ok(commit)
    }

    /// Changes staged since the last commit.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Every queued commit, including ones already confirmed remotely.
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// Queued commits not yet applied to `branch`.
    pub fn pending(&self, branch: &BranchName) -> &[Commit] {
        &self.commits[self.confirmed_on(branch)..]
    }

    /// How many queued commits are already applied to `branch`.
    ///
    /// Commits confirmed on another branch do not count.
    pub fn confirmed_on(&self, branch: &BranchName) -> usize {
        match &self.confirmed {
            Some((confirmed_branch, count)) if confirmed_branch == branch => *count,
            _ => 0,
        }
    }

    /// Record that the next commit pending for `branch` was applied there.
    ///
    /// A mark held for a different branch is replaced.
    pub(crate) fn mark_confirmed(&mut self, branch: &BranchName) {
        let count = (self.confirmed_on(branch) + 1).min(self.commits.len());
        self.confirmed = Some((branch.clone(), count));
    }

    /// Drop the fully pushed queue and return its length.
    pub(crate) fn finish_push(&mut self) -> usize {
        let pushed = self.commits.len();
        self.commits.clear();
        self.confirmed = None;
        pushed
    }
}
