//! Webhook controller
//!
//! Runs one request through authentication, path resolution, Git
//! synchronization and post-deploy commands, strictly in that order, and
//! reports the HTTP status as soon as it is settled.

use std::sync::Arc;

use axum::http::StatusCode;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::deploy::auth::{authenticate, AuthOutcome};
use crate::deploy::command::CommandRunner;
use crate::deploy::fsm::{WebhookEvent, WebhookFsm, WebhookState};
use crate::deploy::git::{GitTransport, RepositorySynchronizer, SyncTarget};
use crate::deploy::paths::{resolve_ssh_key, resolve_target_dir};
use crate::deploy::post::{run_post_commands, PostDeployReport};
use crate::deploy::transcript::DeployLog;
use crate::errors::DeployError;
use crate::models::config::DeployConfig;
use crate::models::deployment::DeploymentRequest;

/// Fires the HTTP status once, the moment it is known
#[derive(Debug, Default)]
pub struct StatusNotifier {
    tx: Option<oneshot::Sender<StatusCode>>,
}

impl StatusNotifier {
    pub fn new(tx: oneshot::Sender<StatusCode>) -> Self {
        Self { tx: Some(tx) }
    }

    fn notify(&mut self, status: StatusCode) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(status);
        }
    }
}

/// Result of one request
#[derive(Debug, Clone)]
pub struct DeploymentOutcome {
    pub state: WebhookState,
    pub status: StatusCode,
    pub error: Option<String>,
    pub post_deploy: Option<PostDeployReport>,
}

/// Orchestrates a request end to end
pub struct WebhookController {
    config: Arc<DeployConfig>,
    runner: Arc<dyn CommandRunner>,
}

impl WebhookController {
    pub fn new(config: Arc<DeployConfig>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Transcript writer for one request, persisting to the configured log file
    pub fn transcript(&self, sink: Option<mpsc::UnboundedSender<String>>) -> DeployLog {
        let log = DeployLog::new(self.config.log_file_path.clone());
        match sink {
            Some(sink) => log.with_sink(sink),
            None => log,
        }
    }

    /// Handle `request`, writing the transcript to `log`
    pub async fn handle(
        &self,
        request: &DeploymentRequest,
        log: &DeployLog,
        mut notifier: StatusNotifier,
    ) -> DeploymentOutcome {
        let mut fsm = WebhookFsm::new();

        let post_deploy = match self.drive(&mut fsm, request, log, &mut notifier).await {
            Ok(report) => report,
            Err(e) => {
                // only reachable through an invalid state transition
                error!("Deployment pipeline error: {}", e);
                log.error(e.to_string()).await;
                None
            }
        };

        let status = fsm
            .state()
            .committed_status()
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        notifier.notify(status);

        DeploymentOutcome {
            state: *fsm.state(),
            status,
            error: fsm.error().map(str::to_string),
            post_deploy,
        }
    }

    async fn drive(
        &self,
        fsm: &mut WebhookFsm,
        request: &DeploymentRequest,
        log: &DeployLog,
        notifier: &mut StatusNotifier,
    ) -> Result<Option<PostDeployReport>, DeployError> {
        let config = self.config.as_ref();

        advance(fsm, notifier, WebhookEvent::Authenticate)?;
        match authenticate(config, request, log).await {
            Err(e) => {
                advance(fsm, notifier, WebhookEvent::Reject(e.status_code()))?;
                return Ok(None);
            }
            Ok(AuthOutcome::ShortCircuit(event)) => {
                debug!(event = event.as_str(), "Nothing to deploy");
                advance(fsm, notifier, WebhookEvent::ShortCircuit)?;
                return Ok(None);
            }
            Ok(AuthOutcome::Authorized(mode)) => {
                debug!(?mode, "Deployment authorized");
                advance(fsm, notifier, WebhookEvent::Authorize)?;
            }
        }

        advance(fsm, notifier, WebhookEvent::ResolvePaths)?;
        let base_dir = config.base_dir.as_path();
        log.info(format!("Script directory: {}", base_dir.display()))
            .await;
        let target_dir = resolve_target_dir(base_dir, &config.target_directory);
        log.info(format!("Target directory: {}", target_dir.display()))
            .await;
        log.info(format!("Repository: {}", config.repository_url))
            .await;
        log.info(format!("Branch: {}", config.branch)).await;

        let transport = match &config.ssh_key_path {
            Some(configured) => match resolve_ssh_key(base_dir, configured).await {
                Ok(key) => {
                    log.info(format!("Using SSH key: {}", key.display())).await;
                    GitTransport::with_key(key)
                }
                Err(e) => {
                    log.error(e.to_string()).await;
                    advance(fsm, notifier, WebhookEvent::PathsFailed(e.to_string()))?;
                    return Ok(None);
                }
            },
            None => GitTransport::default(),
        };

        advance(fsm, notifier, WebhookEvent::StartSync)?;
        let synchronizer = RepositorySynchronizer::new(self.runner.as_ref(), log, transport);
        let target = SyncTarget {
            repository_url: &config.repository_url,
            branch: &config.branch,
            target_dir: &target_dir,
        };
        match synchronizer.sync(&target).await {
            Ok(state) => debug!(?state, "Synchronized"),
            Err(e) => {
                advance(fsm, notifier, WebhookEvent::SyncFailed(e.to_string()))?;
                return Ok(None);
            }
        }
        advance(fsm, notifier, WebhookEvent::SyncSucceeded)?;

        advance(fsm, notifier, WebhookEvent::RunPostCommands)?;
        let report = run_post_commands(
            &config.post_commands,
            &target_dir,
            self.runner.as_ref(),
            log,
        )
        .await;

        log.info("Deployment completed successfully!").await;
        advance(fsm, notifier, WebhookEvent::Finish)?;
        Ok(Some(report))
    }
}

fn advance(
    fsm: &mut WebhookFsm,
    notifier: &mut StatusNotifier,
    event: WebhookEvent,
) -> Result<(), DeployError> {
    fsm.process(event)?;
    if let Some(status) = fsm.state().committed_status() {
        notifier.notify(status);
    }
    Ok(())
}
