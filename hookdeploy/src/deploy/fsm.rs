//! Finite State Machine for a single webhook request

use axum::http::StatusCode;

use crate::errors::DeployError;

/// Request state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookState {
    /// Nothing done yet
    Start,

    /// Checking configuration and credentials
    Authenticating,

    /// Request refused
    Rejected(StatusCode),

    /// Answered without deploying (ping, unsupported event)
    ShortCircuited,

    /// Deployment authorized
    Authorized,

    /// Resolving target directory and SSH key
    ResolvingPaths,

    /// Path or transport failure, nothing touched
    PathsFailed,

    /// Git steps running
    Synchronizing,

    /// A Git step failed
    SyncFailed,

    /// Working tree matches the remote
    Synced,

    /// Post-deploy commands running
    RunningPostCommands,

    /// Finished
    Done,
}

impl WebhookState {
    /// HTTP status, once it can no longer change.
    ///
    /// Post-deploy commands never alter the status, so it is fixed as soon as
    /// synchronization succeeds.
    pub fn committed_status(&self) -> Option<StatusCode> {
        match self {
            WebhookState::Rejected(status) => Some(*status),
            WebhookState::ShortCircuited => Some(StatusCode::OK),
            WebhookState::PathsFailed | WebhookState::SyncFailed => {
                Some(StatusCode::INTERNAL_SERVER_ERROR)
            }
            WebhookState::Synced | WebhookState::RunningPostCommands | WebhookState::Done => {
                Some(StatusCode::OK)
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WebhookState::Rejected(_)
                | WebhookState::ShortCircuited
                | WebhookState::PathsFailed
                | WebhookState::SyncFailed
                | WebhookState::Done
        )
    }
}

/// Request event
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    /// Begin authentication
    Authenticate,

    /// Authentication refused with a status
    Reject(StatusCode),

    /// Nothing to deploy
    ShortCircuit,

    /// Authentication passed
    Authorize,

    /// Start path resolution
    ResolvePaths,

    /// Path resolution failed
    PathsFailed(String),

    /// Paths resolved, start Git
    StartSync,

    /// A Git step failed
    SyncFailed(String),

    /// Git finished
    SyncSucceeded,

    /// Start post-deploy commands
    RunPostCommands,

    /// All stages complete
    Finish,
}

/// Request FSM
#[derive(Debug, Clone)]
pub struct WebhookFsm {
    state: WebhookState,
    error: Option<String>,
}

impl WebhookFsm {
    /// Create a new FSM in the start state
    pub fn new() -> Self {
        Self {
            state: WebhookState::Start,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> &WebhookState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: WebhookEvent) -> Result<(), DeployError> {
        let new_state = match (&self.state, &event) {
            (WebhookState::Start, WebhookEvent::Authenticate) => WebhookState::Authenticating,

            // From Authenticating
            (WebhookState::Authenticating, WebhookEvent::Reject(status)) => {
                WebhookState::Rejected(*status)
            }
            (WebhookState::Authenticating, WebhookEvent::ShortCircuit) => {
                WebhookState::ShortCircuited
            }
            (WebhookState::Authenticating, WebhookEvent::Authorize) => WebhookState::Authorized,

            (WebhookState::Authorized, WebhookEvent::ResolvePaths) => WebhookState::ResolvingPaths,

            // From ResolvingPaths
            (WebhookState::ResolvingPaths, WebhookEvent::PathsFailed(err)) => {
                self.error = Some(err.clone());
                WebhookState::PathsFailed
            }
            (WebhookState::ResolvingPaths, WebhookEvent::StartSync) => WebhookState::Synchronizing,

            // From Synchronizing
            (WebhookState::Synchronizing, WebhookEvent::SyncFailed(err)) => {
                self.error = Some(err.clone());
                WebhookState::SyncFailed
            }
            (WebhookState::Synchronizing, WebhookEvent::SyncSucceeded) => WebhookState::Synced,

            (WebhookState::Synced, WebhookEvent::RunPostCommands) => {
                WebhookState::RunningPostCommands
            }
            (WebhookState::RunningPostCommands, WebhookEvent::Finish) => WebhookState::Done,

            // Invalid transitions
            (state, event) => {
                return Err(DeployError::Internal(format!(
                    "Invalid transition: {:?} -> {:?}",
                    state, event
                )));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for WebhookFsm {
    fn default() -> Self {
        Self::new()
    }
}
