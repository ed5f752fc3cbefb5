//! Integration tests for the key-value store against the in-memory host.
//!
//! These drive the public `KvStore` API end to end and inspect the
//! resulting remote state through `MockHost`.

use gitkv::config::{Credential, StoreConfig};
use gitkv::host::mock::{FailOn, MockHost, MockOperation};
use gitkv::host::HostError;
use gitkv::store::{GitKvStore, KvStore};
use gitkv::types::BranchName;
use gitkv::StoreError;
use tracing_subscriber::EnvFilter;

fn config() -> StoreConfig {
    StoreConfig::new("octocat", "kv-data", Credential::new("token")).unwrap()
}

/// Route store logs to the test harness; set `RUST_LOG=gitkv=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn store_with(host: MockHost) -> GitKvStore<MockHost> {
    init_tracing();
    GitKvStore::new(config(), host)
}

fn server_error() -> HostError {
    HostError::Api {
        status: 500,
        message: "GitHub server error: boom".into(),
    }
}

// =============================================================================
// Staging and Commits
// =============================================================================

mod staging {
    use super::*;

    #[test]
    fn commit_captures_changes_since_previous_commit() {
        let mut store = store_with(MockHost::new());
        store.add("a.txt", "1").unwrap();
        store.commit("c1").unwrap();
        store.add("b.txt", "2").unwrap();
        store.add("/c.txt", "3").unwrap();

        let commit = store.commit("c2").unwrap();

        let paths: Vec<&str> = commit.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["b.txt", "c.txt"]);
        assert!(store.staged_changes().is_empty());
        assert_eq!(store.staged_commits().len(), 2);
    }

    #[test]
    fn empty_commit_fails_and_keeps_queue() {
        let mut store = store_with(MockHost::new());
        store.add("a.txt", "1").unwrap();
        store.commit("c1").unwrap();

        let err = store.commit("c2").unwrap_err();

        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.staged_commits().len(), 1);
        assert_eq!(store.staged_commits()[0].message, "c1");
    }

    #[test]
    fn staging_never_touches_host() {
        let mut store = store_with(MockHost::new());
        store.add("a.txt", "1").unwrap();
        store.commit("c1").unwrap();
        assert!(store.host().operations().is_empty());
    }
}

// =============================================================================
// Push
// =============================================================================

mod push {
    use super::*;

    #[tokio::test]
    async fn two_commits_chain_on_remote() {
        let mut store = store_with(MockHost::new());
        let root = store.host().head_of("main").unwrap();

        store.add("a.txt", "v1").unwrap();
        store.commit("c1").unwrap();
        store.add("b.txt", "v2").unwrap();
        store.commit("c2").unwrap();

        let pushed = store.push().await.unwrap();

        assert_eq!(pushed, 2);
        assert!(store.staged_commits().is_empty());

        let host = store.host();
        let head = host.head_of("main").unwrap();
        let first = host.commit_parents(&head).unwrap()[0].clone();
        assert_eq!(host.commit_message(&head).as_deref(), Some("c2"));
        assert_eq!(host.commit_message(&first).as_deref(), Some("c1"));
        assert_eq!(host.commit_parents(&first).unwrap(), vec![root]);
        assert_eq!(host.file_at("main", "a.txt").as_deref(), Some("v1"));
        assert_eq!(host.file_at("main", "b.txt").as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn push_keeps_existing_files() {
        let host = MockHost::new();
        host.seed_files("main", &[("keep.txt", "old")], "seed");
        let mut store = store_with(host);

        store.set("new.txt", "fresh", "add new").await.unwrap();

        assert_eq!(store.host().file_at("main", "keep.txt").as_deref(), Some("old"));
        assert_eq!(store.host().file_at("main", "new.txt").as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn push_with_empty_queue_returns_zero() {
        let mut store = store_with(MockHost::new());
        assert_eq!(store.push().await.unwrap(), 0);
        assert_eq!(store.host().count("create_commit"), 0);
    }

    #[tokio::test]
    async fn push_creates_missing_branch_from_root() {
        let mut store = GitKvStore::new(
            config().with_branch(BranchName::new("kv/users").unwrap()),
            MockHost::new(),
        );
        store.set("u/1", "ada", "add ada").await.unwrap();

        let host = store.host();
        assert_eq!(host.log("kv/users"), vec!["add ada", "Initial commit"]);
        assert_eq!(host.log("main"), vec!["Initial commit"]);
    }

    #[tokio::test]
    async fn branch_creation_failure_leaves_queue() {
        let mut store = store_with(MockHost::new().fail_on(FailOn::CreateBranch(server_error())));
        store.add("a.txt", "1").unwrap();
        store.commit("c1").unwrap();

        let err = store.push().await.unwrap_err();

        assert!(matches!(err, StoreError::Remote { .. }));
        assert_eq!(store.host().count("create_commit"), 0);
        assert_eq!(store.staged_commits().len(), 1);
        assert_eq!(store.confirmed_commits(), 0);
    }

    #[tokio::test]
    async fn same_path_last_write_wins() {
        let mut store = store_with(MockHost::new());
        store.add("k", "first").unwrap();
        store.add("other", "x").unwrap();
        store.add("/k", "second").unwrap();
        store.commit("overwrite").unwrap();

        store.push().await.unwrap();

        assert_eq!(store.host().file_at("main", "k").as_deref(), Some("second"));
        assert_eq!(store.host().count("create_blob"), 2);
        let trees: Vec<Vec<String>> = store
            .host()
            .operations()
            .into_iter()
            .filter_map(|op| match op {
                MockOperation::CreateTree { paths, .. } => Some(paths),
                _ => None,
            })
            .collect();
        assert_eq!(trees, vec![vec!["other".to_string(), "k".to_string()]]);
    }

    #[tokio::test]
    async fn retry_after_mid_queue_failure_does_not_duplicate() {
        let host = MockHost::new().fail_after(FailOn::CreateCommit(server_error()), 1);
        let mut store = store_with(host);
        for i in 1..=3 {
            store.add(&format!("k{i}"), &format!("v{i}")).unwrap();
            store.commit(&format!("c{i}")).unwrap();
        }

        let err = store.push().await.unwrap_err();
        assert!(matches!(err, StoreError::Remote { .. }));
        assert_eq!(store.staged_commits().len(), 3);
        assert_eq!(store.confirmed_commits(), 1);
        assert_eq!(store.host().log("main"), vec!["c1", "Initial commit"]);

        store.host().clear_fail_on();
        let pushed = store.push().await.unwrap();

        assert_eq!(pushed, 3);
        assert!(store.staged_commits().is_empty());
        assert_eq!(store.confirmed_commits(), 0);
        assert_eq!(
            store.host().log("main"),
            vec!["c3", "c2", "c1", "Initial commit"]
        );
    }

    #[tokio::test]
    async fn retry_on_another_branch_replays_whole_queue() {
        let host = MockHost::new().fail_after(FailOn::CreateCommit(server_error()), 1);
        let mut store = store_with(host);
        store.add("a", "1").unwrap();
        store.commit("c1").unwrap();
        store.add("b", "2").unwrap();
        store.commit("c2").unwrap();

        store.push().await.unwrap_err();
        assert_eq!(store.host().log("main"), vec!["c1", "Initial commit"]);
        assert_eq!(store.confirmed_commits(), 1);

        store.host().clear_fail_on();
        store.host().seed_files("other", &[("seed", "x")], "other seed");
        store.change_branch("other").unwrap();
        assert_eq!(store.confirmed_commits(), 0);

        let pushed = store.push().await.unwrap();

        assert_eq!(pushed, 2);
        assert_eq!(
            store.host().log("other"),
            vec!["c2", "c1", "other seed", "Initial commit"]
        );
        assert_eq!(store.host().file_at("other", "a").as_deref(), Some("1"));
        assert_eq!(store.host().file_at("other", "b").as_deref(), Some("2"));
        assert_eq!(store.host().log("main"), vec!["c1", "Initial commit"]);
    }

    #[tokio::test]
    async fn retry_after_switching_back_skips_landed_commits() {
        let host = MockHost::new().fail_after(FailOn::CreateCommit(server_error()), 1);
        let mut store = store_with(host);
        store.add("a", "1").unwrap();
        store.commit("c1").unwrap();
        store.add("b", "2").unwrap();
        store.commit("c2").unwrap();
        store.push().await.unwrap_err();

        store.change_branch("other").unwrap();
        store.change_branch("main").unwrap();
        store.host().clear_fail_on();

        assert_eq!(store.confirmed_commits(), 1);
        assert_eq!(store.push().await.unwrap(), 2);
        assert_eq!(store.host().log("main"), vec!["c2", "c1", "Initial commit"]);
    }

    #[tokio::test]
    async fn concurrent_remote_advance_is_built_upon() {
        let mut store = store_with(MockHost::new());
        store.set("a", "1", "mine").await.unwrap();

        store.host().seed_files("main", &[("b", "2")], "someone else");
        store.set("c", "3", "mine again").await.unwrap();

        assert_eq!(
            store.host().log("main"),
            vec!["mine again", "someone else", "mine", "Initial commit"]
        );
        assert_eq!(store.host().file_at("main", "b").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn rejected_ref_update_is_remote_error() {
        let host = MockHost::new().fail_on(FailOn::UpdateBranch(HostError::Api {
            status: 422,
            message: "Update is not a fast forward".into(),
        }));
        let mut store = store_with(host);

        let err = store.set("a", "1", "c1").await.unwrap_err();

        assert!(err.to_string().contains("fast forward"));
        assert_eq!(store.staged_commits().len(), 1);
        assert_eq!(store.host().log("main"), vec!["Initial commit"]);
    }
}

// =============================================================================
// Reads
// =============================================================================

mod read {
    use super::*;

    #[tokio::test]
    async fn get_returns_pushed_content() {
        let mut store = store_with(MockHost::new());
        let json = "{\"name\":\"ada\",\"langs\":[\"en\",\"fr\"]}\n";
        store.set("/users/1.json", json, "add").await.unwrap();

        assert_eq!(store.get("users/1.json").await.unwrap(), json);
        assert_eq!(store.get("/users/1.json").await.unwrap(), json);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = store_with(MockHost::new());
        let err = store.get("missing.txt").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { path } if path == "missing.txt"));
    }

    #[tokio::test]
    async fn unpushed_writes_are_invisible() {
        let mut store = store_with(MockHost::new());
        store.add("draft", "x").unwrap();
        store.commit("draft").unwrap();
        assert!(matches!(
            store.get("draft").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn get_follows_changed_branch() {
        let host = MockHost::new();
        host.seed_files("main", &[("k", "on main")], "seed main");
        host.seed_files("feature", &[("k", "on feature")], "seed feature");
        let mut store = store_with(host);

        assert_eq!(store.get("k").await.unwrap(), "on main");
        store.change_branch("feature").unwrap();
        assert_eq!(store.get("k").await.unwrap(), "on feature");
    }
}

// =============================================================================
// Branches and Pull Requests
// =============================================================================

mod branches {
    use super::*;

    #[tokio::test]
    async fn protected_branches_are_refused() {
        let store = store_with(MockHost::new());
        for name in ["main", "master"] {
            let err = store.delete_branch(name).await.unwrap_err();
            assert!(matches!(err, StoreError::ProtectedBranch(_)));
        }
        assert_eq!(store.host().count("delete_branch"), 0);
        assert!(store.host().head_of("main").is_some());
    }

    #[tokio::test]
    async fn ensure_then_delete() {
        let store = store_with(MockHost::new());

        assert!(store.ensure_branch("tmp", None).await.unwrap().is_created());
        assert!(!store.ensure_branch("tmp", None).await.unwrap().is_created());
        store.delete_branch("tmp").await.unwrap();

        assert_eq!(store.host().branches(), vec!["main".to_string()]);
    }

    #[tokio::test]
    async fn change_branch_redirects_pushes() {
        let mut store = store_with(MockHost::new());
        store.change_branch("staging").unwrap();
        store.set("k", "v", "on staging").await.unwrap();

        assert_eq!(store.host().file_at("staging", "k").as_deref(), Some("v"));
        assert_eq!(store.host().file_at("main", "k"), None);
    }

    #[tokio::test]
    async fn pull_request_from_current_branch() {
        let mut store = store_with(MockHost::new());
        store.change_branch("feature").unwrap();
        store.set("k", "v", "work").await.unwrap();

        let url = store
            .open_pull_request("Merge feature", "Adds k", "main")
            .await
            .unwrap();

        assert!(!url.is_empty());
        assert_eq!(store.host().pull_requests()[0].url, url);
    }

    #[tokio::test]
    async fn duplicate_pull_request_returns_empty() {
        let host = MockHost::new();
        host.seed_files("feature", &[("k", "v")], "work");
        host.seed_pull_request("feature", "main");
        let mut store = store_with(host);
        store.change_branch("feature").unwrap();

        let url = store.open_pull_request("Again", "", "main").await.unwrap();

        assert_eq!(url, "");
    }
}
