//! types
//!
//! Strong types for the store's domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated branch name the store reads from and writes to
//! - [`Oid`] - Object identifier returned by the host (blob, tree, commit)
//! - [`RepoPath`] - Repository-relative file path (the store's "key")
//! - [`Change`] - One staged write
//! - [`Commit`] - A group of changes recorded locally, awaiting push
//!
//! # Examples
//!
//! ```
//! use gitkv::types::{BranchName, Oid, RepoPath};
//!
//! let branch = BranchName::new("data/users").unwrap();
//! assert_eq!(branch.ref_path(), "refs/heads/data/users");
//!
//! let path = RepoPath::new("/users/42.json").unwrap();
//! assert_eq!(path.as_str(), "users/42.json");
//!
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Branch used when none is configured.
pub const DEFAULT_BRANCH: &str = "main";

/// Branches that may never be deleted through the store.
pub const PROTECTED_BRANCHES: [&str; 2] = ["main", "master"];

/// A validated branch name.
///
/// Follows the subset of `git check-ref-format` rules that hosts enforce
/// on ref creation: no empty components, no `..`, `@{`, control characters
/// or any of `` ~^:\?*[`` and space, no leading `.`/`-`, no trailing `/`
/// or `.lock`.
///
/// # Example
///
/// ```
/// use gitkv::types::BranchName;
///
/// let name = BranchName::new("feature/settings").unwrap();
/// assert_eq!(name.as_str(), "feature/settings");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("has space").is_err());
/// assert!(BranchName::new("branch.lock").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let reject = |reason: &str| Err(TypeError::InvalidBranchName(format!("'{name}' {reason}")));

        if name.is_empty() {
            return reject("is empty");
        }
        if name == "@" {
            return reject("is reserved");
        }
        if name.starts_with('-') {
            return reject("starts with '-'");
        }
        if name.ends_with('/') {
            return reject("ends with '/'");
        }
        for pattern in ["..", "@{", "//"] {
            if name.contains(pattern) {
                return reject(&format!("contains '{pattern}'"));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        if let Some(c) = name
            .chars()
            .find(|c| INVALID_CHARS.contains(c) || c.is_ascii_control())
        {
            return reject(&format!("contains {c:?}"));
        }

        for component in name.split('/') {
            if component.starts_with('.') {
                return reject("has a component starting with '.'");
            }
            if component.ends_with(".lock") {
                return reject("has a component ending with '.lock'");
            }
        }

        Ok(())
    }

    /// The conventional default branch, `main`.
    pub fn main() -> Self {
        Self(DEFAULT_BRANCH.to_string())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified ref for this branch (`refs/heads/<branch>`).
    pub fn ref_path(&self) -> String {
        format!("refs/heads/{}", self.0)
    }

    /// Whether this branch is one the store refuses to delete.
    pub fn is_protected(&self) -> bool {
        PROTECTED_BRANCHES.contains(&self.0.as_str())
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A host object identifier (SHA-1 or SHA-256 hex).
///
/// Normalized to lowercase.
///
/// # Example
///
/// ```
/// use gitkv::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a 40 or 64
    /// character hex id.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Abbreviated form, for log output.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A repository-relative file path.
///
/// Leading `/` characters are stripped at construction so `"/a.txt"` and
/// `"a.txt"` name the same key.
///
/// # Example
///
/// ```
/// use gitkv::types::RepoPath;
///
/// assert_eq!(RepoPath::new("//config/app.toml").unwrap().as_str(), "config/app.toml");
/// assert!(RepoPath::new("/").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath(String);

impl RepoPath {
    /// Create a normalized repository path.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPath` if nothing remains after stripping
    /// leading slashes, or the path contains a NUL byte.
    pub fn new(path: impl AsRef<str>) -> Result<Self, TypeError> {
        let trimmed = path.as_ref().trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(TypeError::InvalidPath(format!(
                "'{}' does not name a file",
                path.as_ref()
            )));
        }
        if trimmed.contains('\0') {
            return Err(TypeError::InvalidPath("path contains a NUL byte".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepoPath {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.0
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepoPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single staged write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Where the data lands in the repository.
    pub path: RepoPath,
    /// UTF-8 file content.
    pub data: String,
}

impl Change {
    pub fn new(path: RepoPath, data: impl Into<String>) -> Self {
        Self {
            path,
            data: data.into(),
        }
    }
}

/// A group of changes recorded locally, pushed as exactly one remote commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Commit message used for the remote commit.
    pub message: String,
    /// Changes in staging order. Duplicate paths are kept as staged.
    pub changes: Vec<Change>,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
}

impl Commit {
    /// The changes that end up in the tree: one per path, last write wins.
    ///
    /// Each surviving change keeps the position of its last write.
    ///
    /// # Example
    ///
    /// ```
    /// use gitkv::types::{Change, Commit, RepoPath};
    ///
    /// let p = |s: &str| RepoPath::new(s).unwrap();
    /// let commit = Commit {
    ///     message: "m".into(),
    ///     changes: vec![
    ///         Change::new(p("a"), "1"),
    ///         Change::new(p("b"), "2"),
    ///         Change::new(p("a"), "3"),
    ///     ],
    ///     timestamp: 0,
    /// };
    /// let effective: Vec<_> = commit.effective_changes().iter().map(|c| c.data.as_str()).collect();
    /// assert_eq!(effective, vec!["2", "3"]);
    /// ```
    pub fn effective_changes(&self) -> Vec<&Change> {
        let mut seen: HashSet<&RepoPath> = HashSet::with_capacity(self.changes.len());
        let mut kept: Vec<&Change> = self
            .changes
            .iter()
            .rev()
            .filter(|change| seen.insert(&change.path))
            .collect();
        kept.reverse();
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn valid_branch_names() {
            assert!(BranchName::new("main").is_ok());
            assert!(BranchName::new("kv/users").is_ok());
            assert!(BranchName::new("fix-123").is_ok());
            assert!(BranchName::new("with.dot").is_ok());
        }

        #[test]
        fn invalid_branch_names() {
            for name in [
                "",
                "@",
                "-flag",
                "trailing/",
                "a..b",
                "a@{b",
                "a//b",
                "has space",
                "tilde~",
                "x.lock",
                "foo/.hidden",
                "bell\u{7}",
            ] {
                assert!(BranchName::new(name).is_err(), "{name:?} should be rejected");
            }
        }

        #[test]
        fn protected_branches() {
            assert!(BranchName::new("main").unwrap().is_protected());
            assert!(BranchName::new("master").unwrap().is_protected());
            assert!(!BranchName::new("mainline").unwrap().is_protected());
        }

        #[test]
        fn ref_path() {
            let branch = BranchName::new("test-branch").unwrap();
            assert_eq!(branch.ref_path(), "refs/heads/test-branch");
        }

        #[test]
        fn serde_rejects_invalid() {
            let parsed: Result<BranchName, _> = serde_json::from_str("\"bad name\"");
            assert!(parsed.is_err());
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn accepts_sha1_and_sha256() {
            assert!(Oid::new("a".repeat(40)).is_ok());
            assert!(Oid::new("b".repeat(64)).is_ok());
        }

        #[test]
        fn rejects_bad_length_and_chars() {
            assert!(Oid::new("abc").is_err());
            assert!(Oid::new("z".repeat(40)).is_err());
        }

        #[test]
        fn short_clamps() {
            let oid = Oid::new("c".repeat(40)).unwrap();
            assert_eq!(oid.short(100).len(), 40);
        }
    }

    mod repo_path {
        use super::*;

        #[test]
        fn strips_leading_slashes() {
            assert_eq!(RepoPath::new("/a.txt").unwrap().as_str(), "a.txt");
            assert_eq!(RepoPath::new("a/b.txt").unwrap().as_str(), "a/b.txt");
        }

        #[test]
        fn rejects_empty() {
            assert!(RepoPath::new("").is_err());
            assert!(RepoPath::new("///").is_err());
        }

        #[test]
        fn rejects_nul() {
            assert!(RepoPath::new("a\0b").is_err());
        }
    }

    mod commit {
        use super::*;

        fn change(path: &str, data: &str) -> Change {
            Change::new(RepoPath::new(path).unwrap(), data)
        }

        #[test]
        fn effective_changes_without_duplicates_is_identity() {
            let commit = Commit {
                message: "m".into(),
                changes: vec![change("a", "1"), change("b", "2")],
                timestamp: 0,
            };
            let effective: Vec<Change> = commit.effective_changes().into_iter().cloned().collect();
            assert_eq!(effective, commit.changes);
        }

        #[test]
        fn effective_changes_last_write_wins() {
            let commit = Commit {
                message: "m".into(),
                changes: vec![change("a", "1"), change("/a", "2")],
                timestamp: 0,
            };
            let effective = commit.effective_changes();
            assert_eq!(effective.len(), 1);
            assert_eq!(effective[0].data, "2");
        }

        #[test]
        fn effective_changes_keep_order_of_last_writes() {
            let commit = Commit {
                message: "m".into(),
                changes: vec![
                    change("a", "1"),
                    change("b", "2"),
                    change("a", "3"),
                    change("c", "4"),
                    change("b", "5"),
                ],
                timestamp: 0,
            };
            let effective: Vec<&str> = commit
                .effective_changes()
                .into_iter()
                .map(|c| c.data.as_str())
                .collect();
            assert_eq!(effective, vec!["3", "4", "5"]);
        }

        #[test]
        fn effective_changes_scale_to_many_writes() {
            let changes: Vec<Change> = (0..20_000)
                .map(|i| change(&format!("k{}", i % 100), &i.to_string()))
                .collect();
            let commit = Commit {
                message: "m".into(),
                changes,
                timestamp: 0,
            };
            let effective = commit.effective_changes();
            assert_eq!(effective.len(), 100);
            assert_eq!(effective[0].data, "19900");
            assert_eq!(effective[99].data, "19999");
        }
    }
}
