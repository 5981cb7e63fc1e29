//! Trigger authentication
//!
//! Decides whether a request authorizes a deployment. Two modes exist: a URL
//! token (only when enabled in the configuration) and GitHub-style signed push
//! events.

use crate::deploy::signature::{verify_signature, verify_token};
use crate::deploy::transcript::DeployLog;
use crate::errors::DeployError;
use crate::models::config::DeployConfig;
use crate::models::deployment::{DeploymentRequest, EventKind};

/// How an authorized request proved itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// `?token=<secret>`
    Token,
    /// Push event with a valid `X-Hub-Signature-256`
    Signature,
}

/// Result of a successful authentication step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Proceed with the deployment
    Authorized(AuthMode),
    /// Answer 200 without deploying (ping or an event we don't act on)
    ShortCircuit(EventKind),
}

/// Authenticate `request` against `config`.
///
/// Rejections are returned as [`DeployError`] carrying the HTTP status:
/// `ConfigError` (500) or `AuthError` (400/403). Every branch is logged.
pub async fn authenticate(
    config: &DeployConfig,
    request: &DeploymentRequest,
    log: &DeployLog,
) -> Result<AuthOutcome, DeployError> {
    if let Err(e) = config.validate() {
        log.error(e.to_string()).await;
        return Err(e);
    }

    if let Some(reason) = &request.query_error {
        log.error(format!("Malformed query string: {}", reason)).await;
        return Err(DeployError::bad_request("Malformed query string"));
    }

    if config.allow_token_deployment {
        if let Some(token) = &request.token {
            if verify_token(token.as_bytes(), config.token_bytes()) {
                log.info("Deploy token validated successfully").await;
                return Ok(AuthOutcome::Authorized(AuthMode::Token));
            }
            log.error("Invalid deploy token").await;
            return Err(DeployError::forbidden("Invalid deploy token"));
        }
    }

    let event = match request.event_kind() {
        Some(event) => event,
        None => {
            log.error("Missing GitHub event header").await;
            return Err(DeployError::bad_request("Missing GitHub event header"));
        }
    };
    log.info(format!("GitHub event: {}", event.as_str())).await;

    match event {
        EventKind::Ping => {
            log.info("Ping event received - webhook is working!").await;
            Ok(AuthOutcome::ShortCircuit(EventKind::Ping))
        }
        EventKind::Other(name) => {
            log.info(format!("Unsupported event type: {}", name)).await;
            Ok(AuthOutcome::ShortCircuit(EventKind::Other(name)))
        }
        EventKind::Push => {
            let signature = match request.signature.as_deref().filter(|s| !s.is_empty()) {
                Some(signature) => signature,
                None => {
                    log.error("Missing signature for push event").await;
                    return Err(DeployError::bad_request("Missing signature for push event"));
                }
            };

            if !verify_signature(&request.body, signature, config.token_bytes()) {
                log.error("Invalid signature").await;
                return Err(DeployError::forbidden("Invalid signature"));
            }

            log.info("Push event signature validated successfully").await;
            Ok(AuthOutcome::Authorized(AuthMode::Signature))
        }
    }
}
