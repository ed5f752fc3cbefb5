//! store::read
//!
//! Reads go straight to the host. Staged and unpushed data is not visible.

use tracing::{debug, instrument};

use crate::error::{Result, StoreError};
use crate::host::{GitHost, HostError};
use crate::types::{BranchName, RepoPath};

/// Fetch and decode the file at `path` on `branch`.
#[instrument(skip_all, fields(branch = %branch, path = %path))]
pub(crate) async fn read_file<H: GitHost + ?Sized>(
    host: &H,
    branch: &BranchName,
    path: &RepoPath,
) -> Result<String> {
    let file = host.file_content(path, branch).await.map_err(|e| match e {
        HostError::NotFound(_) => StoreError::NotFound {
            path: path.to_string(),
        },
        other => StoreError::remote(format!("failed to get '{}'", path), other),
    })?;

    let data = file
        .decode()
        .map_err(|e| StoreError::remote(format!("failed to decode '{}'", path), e))?;
    debug!(%branch, %path, sha = %file.sha.short(7), bytes = data.len(), "read file");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{FailOn, MockHost};

    fn path(p: &str) -> RepoPath {
        RepoPath::new(p).unwrap()
    }

    #[tokio::test]
    async fn reads_committed_file() {
        let host = MockHost::new();
        host.seed_files("main", &[("users/1.json", "{\"name\":\"ada\"}")], "seed");

        let data = read_file(&host, &BranchName::main(), &path("users/1.json"))
            .await
            .unwrap();

        assert_eq!(data, "{\"name\":\"ada\"}");
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let host = MockHost::new();
        let err = read_file(&host, &BranchName::main(), &path("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { path } if path == "nope"));
    }

    #[tokio::test]
    async fn directory_is_not_found() {
        let host = MockHost::new();
        host.seed_files("main", &[("dir/file", "x")], "seed");
        let err = read_file(&host, &BranchName::main(), &path("dir"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn other_failures_are_remote() {
        let host = MockHost::new().fail_on(FailOn::FileContent(HostError::RateLimited));
        let err = read_file(&host, &BranchName::main(), &path("a"))
            .await
            .unwrap_err();
        assert_eq!(err.host_error(), Some(&HostError::RateLimited));
    }
}
