//! store::branch
//!
//! Branch lifecycle on the host: idempotent creation and guarded deletion.
//!
//! Selecting which branch the store targets is local state and lives on
//! the store itself (`change_branch`).

use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::host::{Creation, GitHost};
use crate::types::BranchName;

/// Creates and deletes branches through a host.
pub struct BranchManager<'a, H: GitHost + ?Sized> {
    host: &'a H,
}

impl<'a, H: GitHost + ?Sized> BranchManager<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Make sure `branch` exists, forking it from `root`'s head if not.
    ///
    /// An existing branch is left untouched and reported as
    /// [`Creation::AlreadyExists`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if `root` cannot be read or the host
    /// rejects the creation for any other reason.
    pub async fn ensure_branch(
        &self,
        branch: &BranchName,
        root: &BranchName,
    ) -> Result<Creation<()>> {
        let root_head = self
            .host
            .branch_head(root)
            .await
            .map_err(|e| StoreError::remote(format!("failed to read head of '{}'", root), e))?;

        let outcome = self
            .host
            .create_branch(branch, &root_head)
            .await
            .map_err(|e| StoreError::remote(format!("failed to create branch '{}'", branch), e))?;

        match outcome {
            Creation::Created(()) => {
                info!(%branch, %root, sha = %root_head.short(7), "created branch")
            }
            Creation::AlreadyExists => debug!(%branch, "branch already exists"),
        }
        Ok(outcome)
    }

    /// Delete `branch` on the host.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ProtectedBranch` for `main` and `master` without
    /// contacting the host, and `StoreError::Remote` if the host does not
    /// confirm the deletion.
    pub async fn delete_branch(&self, branch: &BranchName) -> Result<()> {
        if branch.is_protected() {
            return Err(StoreError::ProtectedBranch(branch.to_string()));
        }

        self.host
            .delete_branch(branch)
            .await
            .map_err(|e| StoreError::remote(format!("failed to delete branch '{}'", branch), e))?;
        info!(%branch, "deleted branch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{FailOn, MockHost};
    use crate::host::HostError;

    fn branch(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    #[tokio::test]
    async fn ensure_branch_creates_from_root_head() {
        let host = MockHost::new();
        let root_head = host.head_of("main").unwrap();

        let outcome = BranchManager::new(&host)
            .ensure_branch(&branch("data"), &branch("main"))
            .await
            .unwrap();

        assert!(outcome.is_created());
        assert_eq!(host.head_of("data"), Some(root_head));
    }

    #[tokio::test]
    async fn ensure_branch_is_idempotent() {
        let host = MockHost::new();
        let manager = BranchManager::new(&host);
        manager
            .ensure_branch(&branch("data"), &branch("main"))
            .await
            .unwrap();
        host.seed_files("data", &[("a", "1")], "advance");
        let advanced = host.head_of("data");

        let outcome = manager
            .ensure_branch(&branch("data"), &branch("main"))
            .await
            .unwrap();

        assert_eq!(outcome, Creation::AlreadyExists);
        assert_eq!(host.head_of("data"), advanced);
    }

    #[tokio::test]
    async fn ensure_branch_propagates_other_failures() {
        let host = MockHost::new().fail_on(FailOn::CreateBranch(HostError::Api {
            status: 500,
            message: "boom".into(),
        }));

        let err = BranchManager::new(&host)
            .ensure_branch(&branch("data"), &branch("main"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Remote { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn ensure_branch_missing_root_is_remote_error() {
        let host = MockHost::new();
        let err = BranchManager::new(&host)
            .ensure_branch(&branch("data"), &branch("master"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.host_error(),
            Some(HostError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn protected_branches_never_reach_host() {
        let host = MockHost::with_root_branch("master");
        let manager = BranchManager::new(&host);

        for name in ["main", "master"] {
            let err = manager.delete_branch(&branch(name)).await.unwrap_err();
            assert!(matches!(err, StoreError::ProtectedBranch(_)));
        }
        assert_eq!(host.count("delete_branch"), 0);
    }

    #[tokio::test]
    async fn delete_branch_removes_ref() {
        let host = MockHost::new();
        host.seed_files("data", &[("a", "1")], "seed");

        BranchManager::new(&host)
            .delete_branch(&branch("data"))
            .await
            .unwrap();

        assert!(host.head_of("data").is_none());
    }

    #[tokio::test]
    async fn delete_missing_branch_is_remote_error() {
        let host = MockHost::new();
        let err = BranchManager::new(&host)
            .delete_branch(&branch("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Remote { .. }));
    }
}
