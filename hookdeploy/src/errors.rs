//! Error types for the deploy hook

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for the deploy hook
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Missing or placeholder settings. Nothing is touched on disk.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The request did not authorize a deployment.
    #[error("Authentication error: {message}")]
    AuthError { status: StatusCode, message: String },

    /// The SSH key cannot be used for Git transport.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// A Git step exited non-zero or could not be started.
    #[error("Sync error: {0}")]
    SyncError(String),

    /// A post-deploy command failed. Logged, never escalated.
    #[error("Post-deployment command failed: {0}")]
    PostCommandError(String),

    #[error("Command timed out after {secs}s: {command}")]
    Timeout { command: String, secs: u64 },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        DeployError::AuthError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        DeployError::AuthError {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    /// HTTP status reported to the trigger source for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            DeployError::AuthError { status, .. } => *status,
            // post-deploy failures never change the response
            DeployError::PostCommandError(_) => StatusCode::OK,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
