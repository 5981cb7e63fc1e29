//! Git repository synchronization
//!
//! Brings the target directory to the tip of the remote branch, including
//! submodules. The directory state is inspected fresh on every call.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::deploy::command::{CommandRunner, CommandSpec};
use crate::deploy::transcript::DeployLog;
use crate::errors::DeployError;
use crate::filesys::dir::Dir;

/// State of the target directory before synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    /// Directory does not exist
    Absent,
    /// Directory exists with no entries
    EmptyDirectory,
    /// Directory has files but no `.git`
    NonEmptyNonGit,
    /// `.git` is present
    ExistingCheckout,
}

impl RepositoryState {
    /// Inspect `target`
    pub async fn classify(target: &Path) -> Result<Self, DeployError> {
        let dir = Dir::new(target);
        if !dir.exists().await {
            return Ok(RepositoryState::Absent);
        }
        if dir.contains(".git").await {
            return Ok(RepositoryState::ExistingCheckout);
        }
        if dir.is_empty().await? {
            Ok(RepositoryState::EmptyDirectory)
        } else {
            Ok(RepositoryState::NonEmptyNonGit)
        }
    }
}

/// Git transport options applied to network commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitTransport {
    /// Private key passed to `ssh -i`
    pub ssh_key: Option<PathBuf>,
}

impl GitTransport {
    pub fn with_key(ssh_key: impl Into<PathBuf>) -> Self {
        Self {
            ssh_key: Some(ssh_key.into()),
        }
    }

    /// `GIT_SSH_COMMAND` value, if a key is configured.
    ///
    /// Host-key checking is disabled: the hook runs unattended and cannot
    /// answer a first-connection prompt. This trusts whatever host answers.
    pub fn ssh_command(&self) -> Option<String> {
        self.ssh_key.as_ref().map(|key| {
            format!(
                "ssh -i {} -o StrictHostKeyChecking=no",
                crate::deploy::command::shell_quote(&key.to_string_lossy())
            )
        })
    }

    fn apply(&self, spec: CommandSpec) -> CommandSpec {
        match self.ssh_command() {
            Some(ssh) => spec.env("GIT_SSH_COMMAND", ssh),
            None => spec,
        }
    }
}

/// Remote side of a synchronization
#[derive(Debug, Clone)]
pub struct SyncTarget<'a> {
    pub repository_url: &'a str,
    pub branch: &'a str,
    pub target_dir: &'a Path,
}

/// Runs the Git steps for one request
pub struct RepositorySynchronizer<'a> {
    runner: &'a dyn CommandRunner,
    log: &'a DeployLog,
    transport: GitTransport,
}

impl<'a> RepositorySynchronizer<'a> {
    pub fn new(runner: &'a dyn CommandRunner, log: &'a DeployLog, transport: GitTransport) -> Self {
        Self {
            runner,
            log,
            transport,
        }
    }

    /// Clone, initialize or pull depending on the directory state, then
    /// update submodules. Aborts on the first failing step.
    pub async fn sync(&self, target: &SyncTarget<'_>) -> Result<RepositoryState, DeployError> {
        info!(
            "Syncing Git repository: {} (branch: {}) to {}",
            target.repository_url,
            target.branch,
            target.target_dir.display()
        );

        let state = match RepositoryState::classify(target.target_dir).await {
            Ok(state) => state,
            Err(e) => {
                self.log
                    .error(format!("Cannot inspect target directory: {}", e))
                    .await;
                return Err(e);
            }
        };
        debug!(?state, "Classified target directory");

        match state {
            RepositoryState::Absent | RepositoryState::EmptyDirectory => {
                self.log.info("Performing initial clone...").await;
                self.step(self.clone_command(target), "Git clone failed").await?;
                self.log.info("Initial clone completed").await;
            }
            RepositoryState::NonEmptyNonGit => {
                self.log
                    .info("Target directory is not empty, initializing repository in place...")
                    .await;
                let dir = target.target_dir;
                self.step(git(dir).arg("init"), "Git init failed").await?;
                self.step(
                    git(dir).args(["remote", "add", "origin", target.repository_url]),
                    "Git remote add failed",
                )
                .await?;
                self.step(self.pull_command(target), "Git pull failed").await?;
                self.log.info("Repository initialized").await;
            }
            RepositoryState::ExistingCheckout => {
                self.log.info("Performing incremental update...").await;
                self.step(self.pull_command(target), "Git pull failed").await?;
                self.log.info("Incremental update completed").await;
            }
        }

        self.log.info("Updating submodules...").await;
        self.step(
            self.transport
                .apply(git(target.target_dir).args(["submodule", "update", "--init", "--recursive"])),
            "Git submodule update failed",
        )
        .await?;

        info!("Successfully synced Git repository");
        Ok(state)
    }

    fn clone_command(&self, target: &SyncTarget<'_>) -> CommandSpec {
        let spec = CommandSpec::new("git")
            .env("GIT_TERMINAL_PROMPT", "0")
            .args(["clone", "--recurse-submodules", "-b", target.branch])
            .arg(target.repository_url)
            .arg(target.target_dir.to_string_lossy());
        self.transport.apply(spec)
    }

    fn pull_command(&self, target: &SyncTarget<'_>) -> CommandSpec {
        self.transport
            .apply(git(target.target_dir).args(["pull", "origin", target.branch]))
    }

    async fn step(&self, spec: CommandSpec, failure: &str) -> Result<(), DeployError> {
        match self.runner.run(&spec, self.log).await {
            Ok(result) if result.success() => Ok(()),
            Ok(result) => {
                self.log.error(failure).await;
                Err(DeployError::SyncError(format!(
                    "{} (exit code {})",
                    failure, result.exit_code
                )))
            }
            Err(DeployError::Timeout { command, secs }) => {
                self.log.error(failure).await;
                Err(DeployError::Timeout { command, secs })
            }
            Err(e) => {
                self.log.error(failure).await;
                Err(DeployError::SyncError(format!("{}: {}", failure, e)))
            }
        }
    }
}

/// `git` running inside `dir`, never prompting for credentials
fn git(dir: &Path) -> CommandSpec {
    CommandSpec::new("git")
        .env("GIT_TERMINAL_PROMPT", "0")
        .current_dir(dir)
}
