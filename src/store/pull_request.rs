//! store::pull_request

use tracing::{debug, info, instrument};

use crate::error::{Result, StoreError};
use crate::host::{CreatePullRequest, Creation, GitHost};
use crate::types::BranchName;

/// Open a pull request from `head` into `base`.
///
/// Returns the pull request URL, or an empty string if one is already open
/// for the pair.
#[instrument(skip_all, fields(head = %head, base = %base))]
pub(crate) async fn open_pull_request<H: GitHost + ?Sized>(
    host: &H,
    head: &BranchName,
    base: &BranchName,
    title: &str,
    body: &str,
) -> Result<String> {
    let request = CreatePullRequest {
        head: head.clone(),
        base: base.clone(),
        title: title.to_string(),
        body: (!body.is_empty()).then(|| body.to_string()),
    };

    let outcome = host.create_pull_request(request).await.map_err(|e| {
        StoreError::remote(
            format!("failed to open pull request '{}' -> '{}'", head, base),
            e,
        )
    })?;

    match outcome {
        Creation::Created(pr) => {
            info!(%head, %base, number = pr.number, url = %pr.url, "opened pull request");
            Ok(pr.url)
        }
        Creation::AlreadyExists => {
            debug!(%head, %base, "pull request already open");
            Ok(String::new())
        }
    }
}
