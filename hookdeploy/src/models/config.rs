//! Deployment configuration model

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::errors::DeployError;

/// Token value shipped in the example configuration. Deployments are refused
/// until it is changed.
pub const PLACEHOLDER_DEPLOY_TOKEN: &str = "your-secret-token-here";

/// Placeholder substituted with the resolved target directory in
/// post-deploy command templates.
pub const DIR_PLACEHOLDER: &str = "{DIR}";

/// Immutable configuration for one deployment target
#[derive(Debug)]
pub struct DeployConfig {
    /// Remote repository URL
    pub repository_url: String,

    /// Branch to deploy
    pub branch: String,

    /// Target directory as configured (absolute, relative to `base_dir`, or `..`)
    pub target_directory: PathBuf,

    /// Private key used for Git's SSH transport
    pub ssh_key_path: Option<PathBuf>,

    /// Shared secret for signatures and URL tokens
    pub deploy_token: SecretString,

    /// Accept `?token=<secret>` as an alternative to a signed push event
    pub allow_token_deployment: bool,

    /// Durable transcript log
    pub log_file_path: Option<PathBuf>,

    /// Post-deploy command templates, run in order
    pub post_commands: Vec<String>,

    /// Upper bound for each external command. `None` waits indefinitely.
    pub command_timeout: Option<Duration>,

    /// Directory relative paths are resolved against
    pub base_dir: PathBuf,
}

impl DeployConfig {
    /// Create a configuration with defaults for everything but the
    /// repository, token and base directory
    pub fn new(
        repository_url: impl Into<String>,
        deploy_token: impl Into<String>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repository_url: repository_url.into(),
            branch: "main".to_string(),
            target_directory: PathBuf::from("./deployment"),
            ssh_key_path: None,
            deploy_token: SecretString::from(deploy_token.into()),
            allow_token_deployment: false,
            log_file_path: None,
            post_commands: Vec::new(),
            command_timeout: None,
            base_dir: base_dir.into(),
        }
    }

    /// Raw secret bytes, for HMAC keys and token comparison
    pub fn token_bytes(&self) -> &[u8] {
        self.deploy_token.expose_secret().as_bytes()
    }

    /// Check the deploy token is set to something other than the placeholder
    pub fn validate_token(&self) -> Result<(), DeployError> {
        let token = self.deploy_token.expose_secret();
        if token.is_empty() {
            return Err(DeployError::ConfigError(
                "Deploy token not configured".to_string(),
            ));
        }
        if token == PLACEHOLDER_DEPLOY_TOKEN {
            return Err(DeployError::ConfigError(
                "Deploy token is still set to the placeholder value".to_string(),
            ));
        }
        Ok(())
    }

    /// Check every setting a deployment depends on
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.repository_url.trim().is_empty() {
            return Err(DeployError::ConfigError(
                "Repository URL not configured".to_string(),
            ));
        }
        if self.branch.trim().is_empty() {
            return Err(DeployError::ConfigError(
                "Branch not configured".to_string(),
            ));
        }
        self.validate_token()
    }
}
