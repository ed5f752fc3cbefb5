//! host::github
//!
//! GitHub host implementation over the REST git data API.
//!
//! # Design
//!
//! Each [`GitHost`] operation maps onto one REST call:
//!
//! | operation | endpoint | success |
//! |---|---|---|
//! | `branch_head` | `GET git/ref/heads/{branch}` | 200 |
//! | `create_branch` | `POST git/refs` | 201 |
//! | `delete_branch` | `DELETE git/refs/heads/{branch}` | 204 |
//! | `get_commit` | `GET git/commits/{sha}` | 200 |
//! | `create_blob` | `POST git/blobs` | 201 |
//! | `create_tree` | `POST git/trees` | 201 |
//! | `create_commit` | `POST git/commits` | 201 |
//! | `update_branch` | `PATCH git/refs/heads/{branch}` | 200 |
//! | `file_content` | `GET contents/{path}?ref={branch}` | 200 |
//! | `create_pull_request` | `POST pulls` | 201 |
//!
//! `contents` does not inline files over 1 MB (`"encoding": "none"`); those
//! are fetched again through `GET git/blobs/{sha}`.
//!
//! GitHub reports duplicates on ref and PR creation as 422 with a
//! recognisable message; those become [`Creation::AlreadyExists`].
//!
//! # Rate Limiting
//!
//! A 429 (or a 403 with an exhausted rate-limit header) becomes
//! `HostError::RateLimited`. There is no automatic retry.
//!
//! # Example
//!
//! ```ignore
//! use gitkv::config::Credential;
//! use gitkv::host::github::GitHubHost;
//!
//! let host = GitHubHost::new(Credential::new("ghp_xxx"), "octocat", "kv-data");
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{
    BlobEncoding, CommitInfo, CreatePullRequest, Creation, FileContent, GitHost, HostError,
    PullRequest, TreeEntry,
};
use crate::config::{Credential, StoreConfig};
use crate::types::{BranchName, Oid, RepoPath};

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "gitkv";

/// Message GitHub returns when creating a ref that exists.
const REF_EXISTS_MESSAGE: &str = "Reference already exists";

/// Message GitHub returns when a PR for the same head/base is open.
const PR_EXISTS_MESSAGE: &str = "A pull request already exists";

/// GitHub host scoped to one repository.
pub struct GitHubHost {
    client: Client,
    credential: Credential,
    /// Repository owner (user or organization)
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
}

// Custom Debug to avoid exposing the credential
impl std::fmt::Debug for GitHubHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubHost")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubHost {
    /// Create a host for `owner/repo` on github.com.
    pub fn new(credential: Credential, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            credential,
            owner: owner.into(),
            repo: repo.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Create a host from a resolved store configuration.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.credential().clone(), config.owner(), config.repo())
            .with_api_base(config.api_base())
    }

    /// Use a custom API base (e.g., `https://github.example.com/api/v3`).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Get the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, HostError> {
        let token = self.credential.expose();
        if token.is_empty() {
            return Err(HostError::AuthRequired);
        }

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| HostError::AuthFailed("credential is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    ///
    /// Each segment is percent-encoded; segments containing `/` are split
    /// so branch names and file paths keep their hierarchy.
    fn repo_url(&self, segments: &[&str]) -> Result<Url, HostError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| HostError::Network(format!("invalid API base '{}': {}", self.api_base, e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| HostError::Network(format!("API base '{}' cannot be a base", self.api_base)))?;
            path.pop_if_empty()
                .extend(["repos", self.owner.as_str(), self.repo.as_str()]);
            for segment in segments {
                path.extend(segment.split('/'));
            }
        }
        Ok(url)
    }

    /// Attach headers and send.
    async fn send(&self, request: RequestBuilder) -> Result<Response, HostError> {
        request
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| HostError::Network(e.to_string()))
    }

    /// Require `expected` and parse the JSON body.
    async fn blob_content(&self, sha: &Oid) -> Result<FileContent, HostError> {
        let url = self.repo_url(&["git/blobs", sha.as_str()])?;
        let response = self.send(self.client.get(url)).await?;
        let blob: GitHubBlob = self.expect_json(response, StatusCode::OK).await?;
        Ok(FileContent {
            encoding: content_encoding(Some(&blob.encoding), sha.as_str())?,
            sha: blob.sha,
            content: blob.content,
        })
    }

    async fn expect_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
        expected: StatusCode,
    ) -> Result<T, HostError> {
        let status = response.status();
        if status != expected {
            return Err(self.error_from(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| HostError::Decode(format!("failed to parse response: {}", e)))
    }

    /// Map an unsuccessful (or unexpected) response to a `HostError`.
    async fn error_from(&self, response: Response) -> HostError {
        let status = response.status();
        let rate_limited = response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0");

        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.full_message(),
            Err(_) => "Unknown error".to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => HostError::AuthFailed("Invalid or expired token".into()),
            StatusCode::FORBIDDEN if rate_limited => HostError::RateLimited,
            StatusCode::FORBIDDEN => HostError::AuthFailed(format!("Permission denied: {}", message)),
            StatusCode::NOT_FOUND => HostError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => HostError::RateLimited,
            _ if status.is_server_error() => HostError::Api {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ if status.is_success() => HostError::Api {
                status: status.as_u16(),
                message: format!("unexpected status {}", status.as_u16()),
            },
            _ => HostError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }
}

/// Whether `err` is GitHub's 422 "already exists" answer for `needle`.
fn is_already_exists(err: &HostError, needle: &str) -> bool {
    matches!(err, HostError::Api { status: 422, message } if message.contains(needle))
}

fn content_encoding(encoding: Option<&str>, what: &str) -> Result<BlobEncoding, HostError> {
    match encoding {
        Some("base64") => Ok(BlobEncoding::Base64),
        Some("utf-8") | Some("utf8") => Ok(BlobEncoding::Utf8),
        other => Err(HostError::Decode(format!(
            "unsupported content encoding {:?} for {}",
            other, what
        ))),
    }
}

#[async_trait]
impl GitHost for GitHubHost {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn branch_head(&self, branch: &BranchName) -> Result<Oid, HostError> {
        let url = self.repo_url(&["git/ref/heads", branch.as_str()])?;
        debug!(%branch, "fetching branch head");
        let response = self.send(self.client.get(url)).await?;
        let reference: GitHubRef = self.expect_json(response, StatusCode::OK).await?;
        Ok(reference.object.sha)
    }

    async fn create_branch(
        &self,
        branch: &BranchName,
        sha: &Oid,
    ) -> Result<Creation<()>, HostError> {
        let url = self.repo_url(&["git/refs"])?;
        let ref_path = branch.ref_path();
        let body = CreateRefBody {
            ref_name: &ref_path,
            sha: sha.as_str(),
        };
        debug!(%branch, sha = %sha.short(7), "creating branch");

        let response = self.send(self.client.post(url).json(&body)).await?;
        if response.status() == StatusCode::CREATED {
            return Ok(Creation::Created(()));
        }
        let err = self.error_from(response).await;
        if is_already_exists(&err, REF_EXISTS_MESSAGE) {
            Ok(Creation::AlreadyExists)
        } else {
            Err(err)
        }
    }

    async fn delete_branch(&self, branch: &BranchName) -> Result<(), HostError> {
        let url = self.repo_url(&["git/refs/heads", branch.as_str()])?;
        debug!(%branch, "deleting branch");
        let response = self.send(self.client.delete(url)).await?;
        if response.status() == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(self.error_from(response).await)
        }
    }

    async fn get_commit(&self, sha: &Oid) -> Result<CommitInfo, HostError> {
        let url = self.repo_url(&["git/commits", sha.as_str()])?;
        let response = self.send(self.client.get(url)).await?;
        let commit: GitHubCommit = self.expect_json(response, StatusCode::OK).await?;
        Ok(CommitInfo {
            sha: commit.sha,
            tree: commit.tree.sha,
        })
    }

    async fn create_blob(&self, content: &str, encoding: BlobEncoding) -> Result<Oid, HostError> {
        let url = self.repo_url(&["git/blobs"])?;
        let body = CreateBlobBody {
            content,
            encoding: encoding.as_str(),
        };
        let response = self.send(self.client.post(url).json(&body)).await?;
        let blob: GitHubSha = self.expect_json(response, StatusCode::CREATED).await?;
        Ok(blob.sha)
    }

    async fn create_tree(&self, base_tree: &Oid, entries: &[TreeEntry]) -> Result<Oid, HostError> {
        let url = self.repo_url(&["git/trees"])?;
        let body = CreateTreeBody {
            base_tree: base_tree.as_str(),
            tree: entries
                .iter()
                .map(|entry| TreeEntryBody {
                    path: entry.path.as_str(),
                    mode: entry.mode.as_str(),
                    kind: "blob",
                    sha: entry.sha.as_str(),
                })
                .collect(),
        };
        let response = self.send(self.client.post(url).json(&body)).await?;
        let tree: GitHubSha = self.expect_json(response, StatusCode::CREATED).await?;
        Ok(tree.sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &Oid,
        parents: &[Oid],
    ) -> Result<Oid, HostError> {
        let url = self.repo_url(&["git/commits"])?;
        let body = CreateCommitBody {
            message,
            tree: tree.as_str(),
            parents: parents.iter().map(Oid::as_str).collect(),
        };
        let response = self.send(self.client.post(url).json(&body)).await?;
        let commit: GitHubSha = self.expect_json(response, StatusCode::CREATED).await?;
        Ok(commit.sha)
    }

    async fn update_branch(&self, branch: &BranchName, sha: &Oid) -> Result<(), HostError> {
        let url = self.repo_url(&["git/refs/heads", branch.as_str()])?;
        let body = UpdateRefBody {
            sha: sha.as_str(),
            force: false,
        };
        debug!(%branch, sha = %sha.short(7), "updating branch");
        let response = self.send(self.client.patch(url).json(&body)).await?;
        let _: GitHubRef = self.expect_json(response, StatusCode::OK).await?;
        Ok(())
    }

    async fn file_content(
        &self,
        path: &RepoPath,
        branch: &BranchName,
    ) -> Result<FileContent, HostError> {
        let mut url = self.repo_url(&["contents", path.as_str()])?;
        url.query_pairs_mut().append_pair("ref", branch.as_str());

        let response = self.send(self.client.get(url)).await?;
        let contents: GitHubContents = self.expect_json(response, StatusCode::OK).await?;

        let file = match contents {
            GitHubContents::Entry(entry) if entry.kind == "file" => entry,
            GitHubContents::Entry(entry) => {
                return Err(HostError::NotFound(format!("{} is a {}", path, entry.kind)))
            }
            GitHubContents::Listing(entries) => {
                return Err(HostError::NotFound(format!(
                    "{} is a directory with {} entries",
                    path,
                    entries.len()
                )))
            }
        };

        // Files over 1 MB come back without inline content.
        if file.encoding.as_deref() == Some("none") {
            debug!(%path, sha = %file.sha.short(7), "content not inlined, fetching blob");
            return self.blob_content(&file.sha).await;
        }

        Ok(FileContent {
            encoding: content_encoding(file.encoding.as_deref(), path.as_str())?,
            sha: file.sha,
            content: file.content.unwrap_or_default(),
        })
    }

    async fn create_pull_request(
        &self,
        request: CreatePullRequest,
    ) -> Result<Creation<PullRequest>, HostError> {
        let url = self.repo_url(&["pulls"])?;
        let body = CreatePrBody {
            head: request.head.as_str(),
            base: request.base.as_str(),
            title: &request.title,
            body: request.body.as_deref(),
        };
        debug!(head = %request.head, base = %request.base, "opening pull request");

        let response = self.send(self.client.post(url).json(&body)).await?;
        if response.status() != StatusCode::CREATED {
            let err = self.error_from(response).await;
            return if is_already_exists(&err, PR_EXISTS_MESSAGE) {
                Ok(Creation::AlreadyExists)
            } else {
                Err(err)
            };
        }

        let pr: GitHubPullRequest = response
            .json()
            .await
            .map_err(|e| HostError::Decode(format!("failed to parse response: {}", e)))?;
        Ok(Creation::Created(PullRequest {
            number: pr.number,
            url: pr.html_url,
        }))
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

#[derive(Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    ref_name: &'a str,
    sha: &'a str,
}

#[derive(Serialize)]
struct UpdateRefBody<'a> {
    sha: &'a str,
    force: bool,
}

#[derive(Serialize)]
struct CreateBlobBody<'a> {
    content: &'a str,
    encoding: &'a str,
}

#[derive(Serialize)]
struct CreateTreeBody<'a> {
    base_tree: &'a str,
    tree: Vec<TreeEntryBody<'a>>,
}

#[derive(Serialize)]
struct TreeEntryBody<'a> {
    path: &'a str,
    mode: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    sha: &'a str,
}

#[derive(Serialize)]
struct CreateCommitBody<'a> {
    message: &'a str,
    tree: &'a str,
    parents: Vec<&'a str>,
}

#[derive(Serialize)]
struct CreatePrBody<'a> {
    head: &'a str,
    base: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

/// GitHub error response format.
///
/// Validation failures put the useful text in `errors[].message`.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
    #[serde(default)]
    errors: Vec<GitHubErrorDetail>,
}

#[derive(Deserialize)]
struct GitHubErrorDetail {
    message: Option<String>,
}

impl GitHubErrorResponse {
    fn full_message(self) -> String {
        let details: Vec<String> = self.errors.into_iter().filter_map(|e| e.message).collect();
        if details.is_empty() {
            self.message
        } else {
            format!("{}: {}", self.message, details.join("; "))
        }
    }
}

#[derive(Deserialize)]
struct GitHubSha {
    sha: Oid,
}

#[derive(Deserialize)]
struct GitHubRef {
    object: GitHubSha,
}

#[derive(Deserialize)]
struct GitHubCommit {
    sha: Oid,
    tree: GitHubSha,
}

/// `contents` answers with an object for files and an array for directories.
#[derive(Deserialize)]
#[serde(untagged)]
enum GitHubContents {
    Entry(GitHubContentEntry),
    Listing(Vec<IgnoredAny>),
}

#[derive(Deserialize)]
struct GitHubContentEntry {
    #[serde(rename = "type")]
    kind: String,
    sha: Oid,
    encoding: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct GitHubBlob {
    sha: Oid,
    encoding: String,
    content: String,
}

#[derive(Deserialize)]
struct GitHubPullRequest {
    number: u64,
    html_url: String,
}

// --------------------------------------------------------------------------
// URL Parsing
// --------------------------------------------------------------------------

/// Parse a GitHub remote URL to extract owner and repo.
///
/// Supports both SSH and HTTPS formats:
/// - `git@github.com:owner/repo.git`
/// - `https://github.com/owner/repo.git`
/// - `https://github.com/owner/repo`
///
/// # Example
///
/// ```
/// use gitkv::host::github::parse_github_url;
///
/// let (owner, repo) = parse_github_url("git@github.com:octocat/hello-world.git").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// ```
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("http://github.com/"))?;
    let rest = rest.strip_suffix(".git").unwrap_or(rest);

    let (owner, repo) = rest.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}
