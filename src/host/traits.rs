//! host::traits
//!
//! The git-hosting API surface the store is built on.
//!
//! # Design
//!
//! The store never speaks HTTP itself. Everything it needs from the host
//! (refs, blobs, trees, commits, file contents, pull requests) goes through
//! the [`GitHost`] trait, so the push pipeline stays independent of one
//! host's status-code conventions.
//!
//! Operations that create a named resource (a branch ref, a pull request)
//! return [`Creation`], which separates "created" from "already exists".
//! Both are successes from the caller's point of view; the host
//! implementation is responsible for recognising its own "already exists"
//! responses.

use async_trait::async_trait;
use base64::Engine;
use thiserror::Error;

use crate::types::{BranchName, Oid, RepoPath};

/// Errors from host operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// No credential was configured.
    #[error("authentication required")]
    AuthRequired,

    /// The credential was rejected or lacks permissions.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// The host answered with an unexpected status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the host
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),

    /// A response could not be interpreted.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Outcome of creating a named resource.
///
/// Failure is carried by the surrounding `Result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Creation<T> {
    /// The resource was created by this call.
    Created(T),
    /// The resource was already there; nothing was changed.
    AlreadyExists,
}

impl<T> Creation<T> {
    /// Whether this call created the resource.
    pub fn is_created(&self) -> bool {
        matches!(self, Creation::Created(_))
    }

    /// The created value, if any.
    pub fn created(self) -> Option<T> {
        match self {
            Creation::Created(value) => Some(value),
            Creation::AlreadyExists => None,
        }
    }
}

/// A commit as seen by the host: its id and the tree it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: Oid,
    pub tree: Oid,
}

/// File mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileMode {
    /// `100644`
    #[default]
    Regular,
    /// `100755`
    Executable,
}

impl FileMode {
    /// Octal mode string as used in git trees.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
        }
    }
}

/// A single entry for a new tree layered on a base tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: RepoPath,
    pub mode: FileMode,
    pub sha: Oid,
}

/// Encoding of blob content on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlobEncoding {
    #[default]
    Utf8,
    Base64,
}

impl BlobEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobEncoding::Utf8 => "utf-8",
            BlobEncoding::Base64 => "base64",
        }
    }

    /// Decode `content` in this encoding into UTF-8 text.
    pub fn decode(&self, content: &str) -> Result<String, HostError> {
        match self {
            BlobEncoding::Utf8 => Ok(content.to_string()),
            BlobEncoding::Base64 => {
                let compact: String = content
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(compact)
                    .map_err(|e| HostError::Decode(format!("invalid base64 content: {}", e)))?;
                String::from_utf8(bytes)
                    .map_err(|e| HostError::Decode(format!("content is not UTF-8: {}", e)))
            }
        }
    }
}

/// File content as returned by the host, still in transport encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    /// Blob id of the file.
    pub sha: Oid,
    /// Transport encoding of `content`.
    pub encoding: BlobEncoding,
    /// Raw content as sent by the host.
    pub content: String,
}

impl FileContent {
    /// Decode the transport content into UTF-8 text.
    ///
    /// Base64 content may contain line breaks (GitHub wraps at 60 columns).
    ///
    /// # Example
    ///
    /// ```
    /// use gitkv::host::{BlobEncoding, FileContent};
    /// use gitkv::types::Oid;
    ///
    /// let file = FileContent {
    ///     sha: Oid::new("a".repeat(40)).unwrap(),
    ///     encoding: BlobEncoding::Base64,
    ///     content: "aGVsbG8g\nd29ybGQ=\n".into(),
    /// };
    /// assert_eq!(file.decode().unwrap(), "hello world");
    /// ```
    pub fn decode(&self) -> Result<String, HostError> {
        self.encoding.decode(&self.content)
    }
}

/// Request to open a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePullRequest {
    /// Branch with the changes.
    pub head: BranchName,
    /// Branch to merge into.
    pub base: BranchName,
    pub title: String,
    pub body: Option<String>,
}

/// A pull request opened on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    /// Canonical web URL.
    pub url: String,
}

/// Git-hosting API client scoped to one repository.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the push pipeline issues blob
/// creations for one commit concurrently.
///
/// # Errors
///
/// Every method returns `HostError` on failure. Callers decide which
/// failures are fatal; the store wraps all of them as remote errors.
#[async_trait]
pub trait GitHost: Send + Sync {
    /// Host name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Current head commit of a branch.
    ///
    /// Fails with `NotFound` if the branch does not exist.
    async fn branch_head(&self, branch: &BranchName) -> Result<Oid, HostError>;

    /// Create `refs/heads/<branch>` pointing at `sha`.
    async fn create_branch(&self, branch: &BranchName, sha: &Oid)
        -> Result<Creation<()>, HostError>;

    /// Delete `refs/heads/<branch>`.
    ///
    /// Succeeds only when the host confirms the deletion.
    async fn delete_branch(&self, branch: &BranchName) -> Result<(), HostError>;

    /// Look up a commit's tree.
    async fn get_commit(&self, sha: &Oid) -> Result<CommitInfo, HostError>;

    /// Store a blob and return its id.
    async fn create_blob(&self, content: &str, encoding: BlobEncoding) -> Result<Oid, HostError>;

    /// Create a tree from `base_tree` plus `entries`. Entries replace
    /// same-path entries of the base tree; everything else is kept.
    async fn create_tree(&self, base_tree: &Oid, entries: &[TreeEntry]) -> Result<Oid, HostError>;

    /// Create a commit object.
    async fn create_commit(
        &self,
        message: &str,
        tree: &Oid,
        parents: &[Oid],
    ) -> Result<Oid, HostError>;

    /// Move a branch to `sha`.
    async fn update_branch(&self, branch: &BranchName, sha: &Oid) -> Result<(), HostError>;

    /// Content of the file at `path` on `branch`.
    ///
    /// Fails with `NotFound` if the path does not exist or is a directory.
    async fn file_content(
        &self,
        path: &RepoPath,
        branch: &BranchName,
    ) -> Result<FileContent, HostError>;

    /// Open a pull request.
    async fn create_pull_request(
        &self,
        request: CreatePullRequest,
    ) -> Result<Creation<PullRequest>, HostError>;
}
