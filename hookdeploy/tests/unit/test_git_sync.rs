//! Synchronizer tests against a real local repository.
//!
//! Skipped when `git` is not installed.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use axum::http::StatusCode;

use hookdeploy::deploy::command::ProcessRunner;
use hookdeploy::deploy::git::{GitTransport, RepositoryState, RepositorySynchronizer, SyncTarget};
use hookdeploy::deploy::pipeline::{StatusNotifier, WebhookController};
use hookdeploy::deploy::transcript::DeployLog;
use hookdeploy::models::config::DeployConfig;

use crate::common::{signed_push, SECRET};

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=Deploy Test", "-c", "user.email=deploy@example.com"])
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// Working repository on branch `main` plus a bare remote cloned from it
fn remote(root: &Path) -> (std::path::PathBuf, String) {
    let work = root.join("work");
    std::fs::create_dir(&work).unwrap();
    git(&work, &["init", "-q"]);
    git(&work, &["checkout", "-q", "-b", "main"]);
    std::fs::write(work.join("index.html"), "<h1>v1</h1>").unwrap();
    git(&work, &["add", "."]);
    git(&work, &["commit", "-q", "-m", "v1"]);

    let bare = root.join("remote.git");
    git(root, &["clone", "-q", "--bare", "work", "remote.git"]);
    (work, bare.to_string_lossy().to_string())
}

async fn sync(url: &str, target: &Path) -> (Result<RepositoryState, String>, Vec<String>) {
    let runner = ProcessRunner::new(None);
    let log = DeployLog::default();
    let synchronizer = RepositorySynchronizer::new(&runner, &log, GitTransport::default());
    let result = synchronizer
        .sync(&SyncTarget {
            repository_url: url,
            branch: "main",
            target_dir: target,
        })
        .await
        .map_err(|e| e.to_string());
    (result, log.messages())
}

#[tokio::test]
async fn test_clone_then_incremental_pull() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let (work, url) = remote(tmp.path());
    let target = tmp.path().join("site");

    let (result, messages) = sync(&url, &target).await;
    assert_eq!(result, Ok(RepositoryState::Absent));
    assert!(messages.contains(&"Initial clone completed".to_string()));
    assert_eq!(
        std::fs::read_to_string(target.join("index.html")).unwrap(),
        "<h1>v1</h1>"
    );

    std::fs::write(work.join("about.html"), "<h1>about</h1>").unwrap();
    git(&work, &["add", "."]);
    git(&work, &["commit", "-q", "-m", "v2"]);
    git(&work, &["push", "-q", &url, "main"]);

    let (result, messages) = sync(&url, &target).await;
    assert_eq!(result, Ok(RepositoryState::ExistingCheckout));
    assert!(messages.contains(&"Incremental update completed".to_string()));
    assert!(target.join("about.html").exists());
}

#[tokio::test]
async fn test_init_in_place_keeps_local_files() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let (_work, url) = remote(tmp.path());
    let target = tmp.path().join("site");
    std::fs::create_dir(&target).unwrap();
    std::fs::write(target.join(".env"), "APP_ENV=production").unwrap();

    let (result, _) = sync(&url, &target).await;
    assert_eq!(result, Ok(RepositoryState::NonEmptyNonGit));
    assert!(target.join(".git").exists());
    assert!(target.join("index.html").exists());
    assert_eq!(
        std::fs::read_to_string(target.join(".env")).unwrap(),
        "APP_ENV=production"
    );
}

#[tokio::test]
async fn test_unknown_branch_fails() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let (_work, url) = remote(tmp.path());
    let target = tmp.path().join("site");

    let runner = ProcessRunner::new(None);
    let log = DeployLog::default();
    let synchronizer = RepositorySynchronizer::new(&runner, &log, GitTransport::default());
    let result = synchronizer
        .sync(&SyncTarget {
            repository_url: &url,
            branch: "does-not-exist",
            target_dir: &target,
        })
        .await;

    assert!(result.is_err());
    assert!(log.messages().contains(&"ERROR: Git clone failed".to_string()));
}

#[tokio::test]
async fn test_end_to_end_with_post_commands() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let (_work, url) = remote(tmp.path());
    let hook_dir = tmp.path().join("hook");
    std::fs::create_dir(&hook_dir).unwrap();

    let mut config = DeployConfig::new(url, SECRET, &hook_dir);
    config.target_directory = "../site".into();
    config.post_commands = vec![
        "echo built > {DIR}/built.txt".to_string(),
        "exit 3".to_string(),
        "touch second.txt".to_string(),
    ];
    let controller = WebhookController::new(Arc::new(config), Arc::new(ProcessRunner::new(None)));
    let log = DeployLog::default();

    let outcome = controller
        .handle(&signed_push(), &log, StatusNotifier::default())
        .await;

    let site = tmp.path().join("site");
    assert_eq!(outcome.status, StatusCode::OK);
    assert!(site.join("index.html").exists());
    assert_eq!(
        std::fs::read_to_string(site.join("built.txt")).unwrap().trim(),
        "built"
    );
    assert!(site.join("second.txt").exists());
    assert!(log
        .messages()
        .contains(&"WARNING: Post-deployment command failed: exit 3".to_string()));
}
