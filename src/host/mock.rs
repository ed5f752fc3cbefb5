//! host::mock
//!
//! In-memory git host for deterministic testing.
//!
//! # Design
//!
//! `MockHost` keeps a small content-addressed object store (blobs, flat
//! trees, commits) and a ref table, so a pushed commit chain can be
//! inspected after the fact: parents, messages, file contents. Object ids
//! are SHA-256 over the serialized object, so identical content always
//! gets the same id.
//!
//! Like GitHub, it refuses ref updates that are not fast-forwards and
//! reports duplicate refs and pull requests as "already exists".
//!
//! Failures can be injected per operation, optionally after a number of
//! successful calls, and every call is recorded.
//!
//! # Example
//!
//! ```
//! use gitkv::host::mock::MockHost;
//! use gitkv::host::GitHost;
//! use gitkv::types::BranchName;
//!
//! # tokio_test::block_on(async {
//! let host = MockHost::new();
//! let head = host.branch_head(&BranchName::main()).await.unwrap();
//! assert_eq!(host.commit_message(&head).as_deref(), Some("Initial commit"));
//! # });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use sha2::{Digest, Sha256};

use super::traits::{
    BlobEncoding, CommitInfo, CreatePullRequest, Creation, FileContent, GitHost, HostError,
    PullRequest, TreeEntry,
};
use crate::types::{BranchName, Oid, RepoPath};

/// Mock host for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockHost {
    inner: Arc<Mutex<MockHostInner>>,
}

#[derive(Debug)]
struct MockHostInner {
    blobs: HashMap<Oid, String>,
    /// Flat trees: full path -> blob id.
    trees: HashMap<Oid, BTreeMap<String, Oid>>,
    commits: HashMap<Oid, MockCommit>,
    refs: HashMap<String, Oid>,
    pulls: Vec<MockPull>,
    fail_on: Option<ArmedFailure>,
    operations: Vec<MockOperation>,
}

#[derive(Debug, Clone)]
struct MockCommit {
    tree: Oid,
    parents: Vec<Oid>,
    message: String,
}

#[derive(Debug, Clone)]
struct MockPull {
    head: String,
    base: String,
    pr: PullRequest,
}

#[derive(Debug)]
struct ArmedFailure {
    fail_on: FailOn,
    /// Matching calls that still succeed before failures start.
    remaining_successes: usize,
}

/// Which operation should fail, and with what error.
#[derive(Debug, Clone)]
pub enum FailOn {
    BranchHead(HostError),
    CreateBranch(HostError),
    DeleteBranch(HostError),
    GetCommit(HostError),
    CreateBlob(HostError),
    CreateTree(HostError),
    CreateCommit(HostError),
    UpdateBranch(HostError),
    FileContent(HostError),
    CreatePullRequest(HostError),
}

impl FailOn {
    fn operation(&self) -> &'static str {
        match self {
            FailOn::BranchHead(_) => "branch_head",
            FailOn::CreateBranch(_) => "create_branch",
            FailOn::DeleteBranch(_) => "delete_branch",
            FailOn::GetCommit(_) => "get_commit",
            FailOn::CreateBlob(_) => "create_blob",
            FailOn::CreateTree(_) => "create_tree",
            FailOn::CreateCommit(_) => "create_commit",
            FailOn::UpdateBranch(_) => "update_branch",
            FailOn::FileContent(_) => "file_content",
            FailOn::CreatePullRequest(_) => "create_pull_request",
        }
    }

    fn error(&self) -> &HostError {
        match self {
            FailOn::BranchHead(e)
            | FailOn::CreateBranch(e)
            | FailOn::DeleteBranch(e)
            | FailOn::GetCommit(e)
            | FailOn::CreateBlob(e)
            | FailOn::CreateTree(e)
            | FailOn::CreateCommit(e)
            | FailOn::UpdateBranch(e)
            | FailOn::FileContent(e)
            | FailOn::CreatePullRequest(e) => e,
        }
    }
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    BranchHead {
        branch: String,
    },
    CreateBranch {
        branch: String,
        sha: Oid,
    },
    DeleteBranch {
        branch: String,
    },
    GetCommit {
        sha: Oid,
    },
    CreateBlob {
        content: String,
    },
    CreateTree {
        base_tree: Oid,
        paths: Vec<String>,
    },
    CreateCommit {
        message: String,
        tree: Oid,
        parents: Vec<Oid>,
    },
    UpdateBranch {
        branch: String,
        sha: Oid,
    },
    FileContent {
        path: String,
        branch: String,
    },
    CreatePullRequest {
        head: String,
        base: String,
        title: String,
    },
}

impl MockOperation {
    /// Operation name, matching the `GitHost` method.
    pub fn name(&self) -> &'static str {
        match self {
            MockOperation::BranchHead { .. } => "branch_head",
            MockOperation::CreateBranch { .. } => "create_branch",
            MockOperation::DeleteBranch { .. } => "delete_branch",
            MockOperation::GetCommit { .. } => "get_commit",
            MockOperation::CreateBlob { .. } => "create_blob",
            MockOperation::CreateTree { .. } => "create_tree",
            MockOperation::CreateCommit { .. } => "create_commit",
            MockOperation::UpdateBranch { .. } => "update_branch",
            MockOperation::FileContent { .. } => "file_content",
            MockOperation::CreatePullRequest { .. } => "create_pull_request",
        }
    }
}

fn object_id(kind: &str, body: &str) -> Oid {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    Oid::new(hex::encode(hasher.finalize())).expect("sha256 hex is a valid object id")
}

impl MockHostInner {
    fn put_blob(&mut self, content: &str) -> Oid {
        let sha = object_id("blob", content);
        self.blobs.insert(sha.clone(), content.to_string());
        sha
    }

    fn put_tree(&mut self, entries: BTreeMap<String, Oid>) -> Oid {
        let body: String = entries
            .iter()
            .map(|(path, sha)| format!("100644 {} {}\n", path, sha))
            .collect();
        let sha = object_id("tree", &body);
        self.trees.insert(sha.clone(), entries);
        sha
    }

    fn put_commit(&mut self, commit: MockCommit) -> Oid {
        let mut body = format!("tree {}\n", commit.tree);
        for parent in &commit.parents {
            body.push_str(&format!("parent {}\n", parent));
        }
        body.push('\n');
        body.push_str(&commit.message);
        let sha = object_id("commit", &body);
        self.commits.insert(sha.clone(), commit);
        sha
    }

    fn is_ancestor(&self, ancestor: &Oid, of: &Oid) -> bool {
        let mut stack = vec![of.clone()];
        while let Some(sha) = stack.pop() {
            if &sha == ancestor {
                return true;
            }
            if let Some(commit) = self.commits.get(&sha) {
                stack.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    fn tree_at(&self, branch: &str) -> Option<&BTreeMap<String, Oid>> {
        let head = self.refs.get(branch)?;
        let commit = self.commits.get(head)?;
        self.trees.get(&commit.tree)
    }
}

impl MockHost {
    /// Create a host whose `main` branch holds one empty root commit.
    pub fn new() -> Self {
        Self::with_root_branch("main")
    }

    /// Create a host whose only branch is `branch`, holding one empty root commit.
    pub fn with_root_branch(branch: &str) -> Self {
        let mut inner = MockHostInner {
            blobs: HashMap::new(),
            trees: HashMap::new(),
            commits: HashMap::new(),
            refs: HashMap::new(),
            pulls: Vec::new(),
            fail_on: None,
            operations: Vec::new(),
        };
        let tree = inner.put_tree(BTreeMap::new());
        let root = inner.put_commit(MockCommit {
            tree,
            parents: Vec::new(),
            message: "Initial commit".to_string(),
        });
        inner.refs.insert(branch.to_string(), root);

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Configure an operation to fail on every call.
    ///
    /// # Example
    ///
    /// ```
    /// use gitkv::host::mock::{FailOn, MockHost};
    /// use gitkv::host::HostError;
    ///
    /// let host = MockHost::new().fail_on(FailOn::CreateBlob(HostError::RateLimited));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.fail_after(fail_on, 0)
    }

    /// Configure an operation to fail once it has succeeded `successes` times.
    pub fn fail_after(self, fail_on: FailOn, successes: usize) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on = Some(ArmedFailure {
                fail_on,
                remaining_successes: successes,
            });
        }
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    /// Number of recorded calls of one operation (e.g. `"create_commit"`).
    pub fn count(&self, operation: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .operations
            .iter()
            .filter(|op| op.name() == operation)
            .count()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.clear();
    }

    /// Current head of a branch (for test verification).
    pub fn head_of(&self, branch: &str) -> Option<Oid> {
        let inner = self.inner.lock().unwrap();
        inner.refs.get(branch).cloned()
    }

    /// Names of all branches.
    pub fn branches(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut names: Vec<String> = inner.refs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Parents of a commit.
    pub fn commit_parents(&self, sha: &Oid) -> Option<Vec<Oid>> {
        let inner = self.inner.lock().unwrap();
        inner.commits.get(sha).map(|c| c.parents.clone())
    }

    /// Message of a commit.
    pub fn commit_message(&self, sha: &Oid) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.commits.get(sha).map(|c| c.message.clone())
    }

    /// First-parent history of a branch, newest first, as commit messages.
    pub fn log(&self, branch: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut messages = Vec::new();
        let mut next = inner.refs.get(branch).cloned();
        while let Some(sha) = next {
            match inner.commits.get(&sha) {
                Some(commit) => {
                    messages.push(commit.message.clone());
                    next = commit.parents.first().cloned();
                }
                None => break,
            }
        }
        messages
    }

    /// Content of a file at a branch head (for test verification).
    pub fn file_at(&self, branch: &str, path: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        let blob = inner.tree_at(branch)?.get(path)?;
        inner.blobs.get(blob).cloned()
    }

    /// Commit `files` directly onto `branch`, creating it from `main` if needed.
    pub fn seed_files(&self, branch: &str, files: &[(&str, &str)], message: &str) -> Oid {
        let mut inner = self.inner.lock().unwrap();
        let head = match inner.refs.get(branch).or_else(|| inner.refs.get("main")) {
            Some(head) => head.clone(),
            None => panic!("mock host has neither '{}' nor 'main'", branch),
        };
        let mut entries = inner.tree_at_commit(&head);
        for (path, content) in files {
            let blob = inner.put_blob(content);
            entries.insert(path.trim_start_matches('/').to_string(), blob);
        }
        let tree = inner.put_tree(entries);
        let sha = inner.put_commit(MockCommit {
            tree,
            parents: vec![head],
            message: message.to_string(),
        });
        inner.refs.insert(branch.to_string(), sha.clone());
        sha
    }

    /// Register an open pull request without recording an operation.
    pub fn seed_pull_request(&self, head: &str, base: &str) -> PullRequest {
        let mut inner = self.inner.lock().unwrap();
        let number = inner.pulls.len() as u64 + 1;
        let pr = PullRequest {
            number,
            url: format!("https://github.com/mock/repo/pull/{}", number),
        };
        inner.pulls.push(MockPull {
            head: head.to_string(),
            base: base.to_string(),
            pr: pr.clone(),
        });
        pr
    }

    /// Pull requests opened so far, oldest first.
    pub fn pull_requests(&self) -> Vec<PullRequest> {
        let inner = self.inner.lock().unwrap();
        inner.pulls.iter().map(|p| p.pr.clone()).collect()
    }

    fn record(&self, op: MockOperation) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);
    }

    /// Check if this call should fail and return the error if so.
    fn check_fail(&self, operation: &str) -> Result<(), HostError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.fail_on.as_mut() {
            Some(armed) if armed.fail_on.operation() == operation => {
                if armed.remaining_successes == 0 {
                    Err(armed.fail_on.error().clone())
                } else {
                    armed.remaining_successes -= 1;
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

impl MockHostInner {
    fn tree_at_commit(&self, sha: &Oid) -> BTreeMap<String, Oid> {
        self.commits
            .get(sha)
            .and_then(|c| self.trees.get(&c.tree))
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

fn unprocessable(message: impl Into<String>) -> HostError {
    HostError::Api {
        status: 422,
        message: message.into(),
    }
}

#[async_trait]
impl GitHost for MockHost {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn branch_head(&self, branch: &BranchName) -> Result<Oid, HostError> {
        self.record(MockOperation::BranchHead {
            branch: branch.to_string(),
        });
        self.check_fail("branch_head")?;

        let inner = self.inner.lock().unwrap();
        inner
            .refs
            .get(branch.as_str())
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("branch {}", branch)))
    }

    async fn create_branch(
        &self,
        branch: &BranchName,
        sha: &Oid,
    ) -> Result<Creation<()>, HostError> {
        self.record(MockOperation::CreateBranch {
            branch: branch.to_string(),
            sha: sha.clone(),
        });
        self.check_fail("create_branch")?;

        let mut inner = self.inner.lock().unwrap();
        if inner.refs.contains_key(branch.as_str()) {
            return Ok(Creation::AlreadyExists);
        }
        if !inner.commits.contains_key(sha) {
            return Err(unprocessable("Object does not exist"));
        }
        inner.refs.insert(branch.to_string(), sha.clone());
        Ok(Creation::Created(()))
    }

    async fn delete_branch(&self, branch: &BranchName) -> Result<(), HostError> {
        self.record(MockOperation::DeleteBranch {
            branch: branch.to_string(),
        });
        self.check_fail("delete_branch")?;

        let mut inner = self.inner.lock().unwrap();
        match inner.refs.remove(branch.as_str()) {
            Some(_) => Ok(()),
            None => Err(unprocessable("Reference does not exist")),
        }
    }

    async fn get_commit(&self, sha: &Oid) -> Result<CommitInfo, HostError> {
        self.record(MockOperation::GetCommit { sha: sha.clone() });
        self.check_fail("get_commit")?;

        let inner = self.inner.lock().unwrap();
        inner
            .commits
            .get(sha)
            .map(|c| CommitInfo {
                sha: sha.clone(),
                tree: c.tree.clone(),
            })
            .ok_or_else(|| HostError::NotFound(format!("commit {}", sha)))
    }

    async fn create_blob(&self, content: &str, encoding: BlobEncoding) -> Result<Oid, HostError> {
        self.record(MockOperation::CreateBlob {
            content: content.to_string(),
        });
        self.check_fail("create_blob")?;

        let text = encoding.decode(content)?;

        let mut inner = self.inner.lock().unwrap();
        Ok(inner.put_blob(&text))
    }

    async fn create_tree(&self, base_tree: &Oid, entries: &[TreeEntry]) -> Result<Oid, HostError> {
        self.record(MockOperation::CreateTree {
            base_tree: base_tree.clone(),
            paths: entries.iter().map(|e| e.path.to_string()).collect(),
        });
        self.check_fail("create_tree")?;

        let mut inner = self.inner.lock().unwrap();
        let mut tree = inner
            .trees
            .get(base_tree)
            .cloned()
            .ok_or_else(|| unprocessable("base_tree is not a valid tree"))?;
        for entry in entries {
            if !inner.blobs.contains_key(&entry.sha) {
                return Err(unprocessable(format!(
                    "tree.sha {} is not a valid blob",
                    entry.sha
                )));
            }
            tree.insert(entry.path.to_string(), entry.sha.clone());
        }
        Ok(inner.put_tree(tree))
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &Oid,
        parents: &[Oid],
    ) -> Result<Oid, HostError> {
        self.record(MockOperation::CreateCommit {
            message: message.to_string(),
            tree: tree.clone(),
            parents: parents.to_vec(),
        });
        self.check_fail("create_commit")?;

        let mut inner = self.inner.lock().unwrap();
        if !inner.trees.contains_key(tree) {
            return Err(unprocessable("Tree SHA does not exist"));
        }
        if let Some(missing) = parents.iter().find(|p| !inner.commits.contains_key(*p)) {
            return Err(unprocessable(format!("Parent SHA {} does not exist", missing)));
        }
        Ok(inner.put_commit(MockCommit {
            tree: tree.clone(),
            parents: parents.to_vec(),
            message: message.to_string(),
        }))
    }

    async fn update_branch(&self, branch: &BranchName, sha: &Oid) -> Result<(), HostError> {
        self.record(MockOperation::UpdateBranch {
            branch: branch.to_string(),
            sha: sha.clone(),
        });
        self.check_fail("update_branch")?;

        let mut inner = self.inner.lock().unwrap();
        let current = inner
            .refs
            .get(branch.as_str())
            .cloned()
            .ok_or_else(|| unprocessable("Reference does not exist"))?;
        if !inner.commits.contains_key(sha) {
            return Err(unprocessable("Object does not exist"));
        }
        if !inner.is_ancestor(&current, sha) {
            return Err(unprocessable("Update is not a fast forward"));
        }
        inner.refs.insert(branch.to_string(), sha.clone());
        Ok(())
    }

    async fn file_content(
        &self,
        path: &RepoPath,
        branch: &BranchName,
    ) -> Result<FileContent, HostError> {
        self.record(MockOperation::FileContent {
            path: path.to_string(),
            branch: branch.to_string(),
        });
        self.check_fail("file_content")?;

        let inner = self.inner.lock().unwrap();
        let not_found = || HostError::NotFound("Not Found".to_string());
        let tree = inner.tree_at(branch.as_str()).ok_or_else(not_found)?;
        let blob = tree.get(path.as_str()).ok_or_else(not_found)?;
        let content = inner.blobs.get(blob).ok_or_else(not_found)?;

        // GitHub wraps base64 content at 60 columns
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        let wrapped: Vec<&str> = encoded
            .as_bytes()
            .chunks(60)
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
            .collect();

        Ok(FileContent {
            sha: blob.clone(),
            encoding: BlobEncoding::Base64,
            content: wrapped.join("\n"),
        })
    }

    async fn create_pull_request(
        &self,
        request: CreatePullRequest,
    ) -> Result<Creation<PullRequest>, HostError> {
        self.record(MockOperation::CreatePullRequest {
            head: request.head.to_string(),
            base: request.base.to_string(),
            title: request.title.clone(),
        });
        self.check_fail("create_pull_request")?;

        {
            let inner = self.inner.lock().unwrap();
            if inner
                .pulls
                .iter()
                .any(|p| p.head == request.head.as_str() && p.base == request.base.as_str())
            {
                return Ok(Creation::AlreadyExists);
            }
            for branch in [&request.head, &request.base] {
                if !inner.refs.contains_key(branch.as_str()) {
                    return Err(unprocessable(format!(
                        "Validation Failed: {} does not exist",
                        branch
                    )));
                }
            }
        }

        Ok(Creation::Created(self.seed_pull_request(
            request.head.as_str(),
            request.base.as_str(),
        )))
    }
}
