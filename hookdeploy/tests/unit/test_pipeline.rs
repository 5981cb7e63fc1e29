//! Webhook controller tests against a recording command runner

use std::sync::Arc;

use axum::http::StatusCode;
use tokio::sync::oneshot;

use hookdeploy::deploy::fsm::WebhookState;
use hookdeploy::deploy::pipeline::{DeploymentOutcome, StatusNotifier, WebhookController};
use hookdeploy::deploy::post::PostDeployReport;
use hookdeploy::deploy::transcript::DeployLog;
use hookdeploy::models::config::{DeployConfig, PLACEHOLDER_DEPLOY_TOKEN};
use hookdeploy::models::deployment::DeploymentRequest;

use crate::common::{config, event, signed_push, FakeRunner, REPO_URL};

async fn handle(
    config: DeployConfig,
    runner: Arc<FakeRunner>,
    request: &DeploymentRequest,
) -> (DeploymentOutcome, Vec<String>) {
    let controller = WebhookController::new(Arc::new(config), runner);
    let log = DeployLog::default();
    let outcome = controller
        .handle(request, &log, StatusNotifier::default())
        .await;
    (outcome, log.messages())
}

#[tokio::test]
async fn test_fresh_clone_then_post_commands() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path());
    config.post_commands = vec!["composer install".to_string(), "php artisan migrate".to_string()];
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, messages) = handle(config, runner.clone(), &signed_push()).await;

    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(outcome.state, WebhookState::Done);
    assert_eq!(runner.git_verbs(), vec!["clone", "submodule"]);
    assert_eq!(
        runner.shell_scripts(),
        vec!["composer install", "php artisan migrate"]
    );

    let clone = &runner.specs()[0];
    let target = tmp.path().join("site");
    assert_eq!(
        clone.get_args(),
        &[
            "clone".to_string(),
            "--recurse-submodules".to_string(),
            "-b".to_string(),
            "main".to_string(),
            REPO_URL.to_string(),
            target.to_string_lossy().to_string(),
        ]
    );
    assert!(clone
        .get_envs()
        .contains(&("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())));

    for spec in runner.specs().iter().filter(|s| s.program() == "sh") {
        assert_eq!(spec.get_current_dir(), Some(target.as_path()));
    }

    assert!(messages.contains(&"Push event signature validated successfully".to_string()));
    assert!(messages.contains(&"Performing initial clone...".to_string()));
    assert_eq!(messages.last().unwrap(), "Deployment completed successfully!");
}

#[tokio::test]
async fn test_empty_directory_is_cloned() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir(tmp.path().join("site")).unwrap();
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, _) = handle(config(tmp.path()), runner.clone(), &signed_push()).await;

    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(runner.git_verbs(), vec!["clone", "submodule"]);
}

#[tokio::test]
async fn test_non_git_directory_is_initialized_in_place() {
    let tmp = tempfile::tempdir().unwrap();
    let site = tmp.path().join("site");
    std::fs::create_dir(&site).unwrap();
    std::fs::write(site.join(".env"), "APP_KEY=local").unwrap();
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, messages) = handle(config(tmp.path()), runner.clone(), &signed_push()).await;

    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(runner.git_verbs(), vec!["init", "remote", "pull", "submodule"]);
    let remote = &runner.specs()[1];
    assert_eq!(remote.get_args(), &["remote", "add", "origin", REPO_URL]);
    assert_eq!(remote.get_current_dir(), Some(site.as_path()));
    assert!(messages.contains(&"Repository initialized".to_string()));
    // existing files are left alone
    assert!(site.join(".env").exists());
}

#[tokio::test]
async fn test_existing_checkout_is_pulled() {
    let tmp = tempfile::tempdir().unwrap();
    let site = tmp.path().join("site");
    std::fs::create_dir_all(site.join(".git")).unwrap();
    let mut config = config(tmp.path());
    config.branch = "production".to_string();
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, _) = handle(config, runner.clone(), &signed_push()).await;

    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(runner.git_verbs(), vec!["pull", "submodule"]);
    assert_eq!(
        runner.specs()[0].get_args(),
        &["pull", "origin", "production"]
    );
    assert_eq!(
        runner.specs()[1].get_args(),
        &["submodule", "update", "--init", "--recursive"]
    );
}

#[tokio::test]
async fn test_post_command_failure_does_not_stop_the_rest() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path());
    config.post_commands = vec![
        "npm ci".to_string(),
        "npm run build".to_string(),
        "systemctl reload nginx".to_string(),
    ];
    let runner = Arc::new(FakeRunner::failing(|spec| {
        spec.program() == "sh" && spec.get_args()[1] == "npm run build"
    }));

    let (outcome, messages) = handle(config, runner.clone(), &signed_push()).await;

    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(outcome.state, WebhookState::Done);
    assert_eq!(runner.shell_scripts().len(), 3);
    assert_eq!(
        outcome.post_deploy,
        Some(PostDeployReport {
            attempted: 3,
            failed: 1
        })
    );
    assert!(messages
        .contains(&"WARNING: Post-deployment command failed: npm run build".to_string()));
    assert!(messages.contains(&"Post-deployment commands completed".to_string()));
    assert_eq!(messages.last().unwrap(), "Deployment completed successfully!");
}

#[tokio::test]
async fn test_clone_failure_skips_post_commands() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path());
    config.post_commands = vec!["touch deployed".to_string()];
    let runner = Arc::new(FakeRunner::failing(|spec| {
        spec.get_args().first().map(String::as_str) == Some("clone")
    }));

    let (outcome, messages) = handle(config, runner.clone(), &signed_push()).await;

    assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(outcome.state, WebhookState::SyncFailed);
    assert!(outcome.error.unwrap().contains("Git clone failed"));
    assert!(outcome.post_deploy.is_none());
    assert_eq!(runner.git_verbs(), vec!["clone"]);
    assert!(runner.shell_scripts().is_empty());
    assert!(messages.contains(&"ERROR: Git clone failed".to_string()));
    assert!(!messages.contains(&"Deployment completed successfully!".to_string()));
}

#[tokio::test]
async fn test_submodule_failure_fails_the_request() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("site").join(".git")).unwrap();
    let runner = Arc::new(FakeRunner::failing(|spec| {
        spec.get_args().first().map(String::as_str) == Some("submodule")
    }));

    let (outcome, messages) = handle(config(tmp.path()), runner.clone(), &signed_push()).await;

    assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(runner.git_verbs(), vec!["pull", "submodule"]);
    assert!(messages.contains(&"ERROR: Git submodule update failed".to_string()));
}

#[tokio::test]
async fn test_dir_placeholder_expands_to_resolved_target() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path());
    config.target_directory = "./releases/../site".into();
    config.post_commands = vec!["chown -R www-data {DIR} && ls {DIR}/public".to_string()];
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, _) = handle(config, runner.clone(), &signed_push()).await;

    let target = tmp.path().join("site");
    let target = target.to_string_lossy();
    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(
        runner.shell_scripts(),
        vec![format!("chown -R www-data {} && ls {}/public", target, target)]
    );
}

#[tokio::test]
async fn test_parent_target_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let hook_dir = tmp.path().join("hook");
    std::fs::create_dir(&hook_dir).unwrap();
    std::fs::write(tmp.path().join("index.php"), "<?php").unwrap();
    let mut config = config(&hook_dir);
    config.target_directory = "..".into();
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, messages) = handle(config, runner.clone(), &signed_push()).await;

    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(runner.git_verbs(), vec!["init", "remote", "pull", "submodule"]);
    assert_eq!(runner.specs()[0].get_current_dir(), Some(tmp.path()));
    assert!(messages.contains(&format!("Target directory: {}", tmp.path().display())));
}

#[tokio::test]
async fn test_ping_touches_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, messages) = handle(config(tmp.path()), runner.clone(), &event("ping")).await;

    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(outcome.state, WebhookState::ShortCircuited);
    assert!(runner.specs().is_empty());
    assert!(!tmp.path().join("site").exists());
    assert_eq!(
        messages,
        vec![
            "GitHub event: ping".to_string(),
            "Ping event received - webhook is working!".to_string()
        ]
    );
}

#[tokio::test]
async fn test_unsupported_event_touches_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, messages) =
        handle(config(tmp.path()), runner.clone(), &event("pull_request")).await;

    assert_eq!(outcome.status, StatusCode::OK);
    assert!(runner.specs().is_empty());
    assert!(messages.contains(&"Unsupported event type: pull_request".to_string()));
}

#[tokio::test]
async fn test_placeholder_token_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path());
    config.deploy_token = PLACEHOLDER_DEPLOY_TOKEN.to_string().into();
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, _) = handle(config, runner.clone(), &signed_push()).await;

    assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        outcome.state,
        WebhookState::Rejected(StatusCode::INTERNAL_SERVER_ERROR)
    );
    assert!(runner.specs().is_empty());
}

#[tokio::test]
async fn test_bad_signature_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let mut request = signed_push();
    request.body = axum::body::Bytes::from_static(b"{\"ref\":\"refs/heads/evil\"}");
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, _) = handle(config(tmp.path()), runner.clone(), &request).await;

    assert_eq!(outcome.status, StatusCode::FORBIDDEN);
    assert!(runner.specs().is_empty());
}

#[tokio::test]
async fn test_url_token_deploys_without_event() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path());
    config.allow_token_deployment = true;
    let request = DeploymentRequest {
        token: Some(crate::common::SECRET.to_string()),
        ..Default::default()
    };
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, messages) = handle(config, runner.clone(), &request).await;

    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(runner.git_verbs(), vec!["clone", "submodule"]);
    assert!(messages.contains(&"Deploy token validated successfully".to_string()));
}

#[tokio::test]
async fn test_missing_ssh_key_fails_before_git() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path());
    config.ssh_key_path = Some("keys/deploy_key".into());
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, messages) = handle(config, runner.clone(), &signed_push()).await;

    assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(outcome.state, WebhookState::PathsFailed);
    assert!(runner.specs().is_empty());
    assert!(messages
        .iter()
        .any(|m| m.starts_with("ERROR: Transport error: SSH key not found")));
}

#[tokio::test]
async fn test_ssh_key_is_applied_to_network_commands() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir(tmp.path().join("keys")).unwrap();
    std::fs::write(tmp.path().join("keys").join("deploy_key"), "KEY").unwrap();
    let mut config = config(tmp.path());
    config.ssh_key_path = Some("./keys/deploy_key".into());
    let runner = Arc::new(FakeRunner::ok());

    let (outcome, messages) = handle(config, runner.clone(), &signed_push()).await;

    let key = tmp.path().join("keys").join("deploy_key");
    let expected = (
        "GIT_SSH_COMMAND".to_string(),
        format!("ssh -i {} -o StrictHostKeyChecking=no", key.display()),
    );
    assert_eq!(outcome.status, StatusCode::OK);
    for spec in runner.specs() {
        assert!(spec.get_envs().contains(&expected), "{}", spec);
    }
    assert!(messages.contains(&format!("Using SSH key: {}", key.display())));
}

#[tokio::test]
async fn test_status_is_notified_before_post_commands_finish() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path());
    config.post_commands = vec!["true".to_string()];
    let controller = WebhookController::new(Arc::new(config), Arc::new(FakeRunner::ok()));
    let log = DeployLog::default();
    let (tx, rx) = oneshot::channel();

    let outcome = controller
        .handle(&signed_push(), &log, StatusNotifier::new(tx))
        .await;

    assert_eq!(rx.await.unwrap(), StatusCode::OK);
    assert_eq!(outcome.status, StatusCode::OK);
}

#[tokio::test]
async fn test_transcript_is_persisted() {
    let tmp = tempfile::tempdir().unwrap();
    let log_file = tmp.path().join("logs").join("deploy.log");
    let mut config = config(tmp.path());
    config.log_file_path = Some(log_file.clone());
    let controller = WebhookController::new(Arc::new(config), Arc::new(FakeRunner::ok()));

    let log = controller.transcript(None);
    controller
        .handle(&event("ping"), &log, StatusNotifier::default())
        .await;

    let contents = std::fs::read_to_string(&log_file).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('['));
    assert!(lines[0].ends_with("] GitHub event: ping"));
}
