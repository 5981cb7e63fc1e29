//! Settings file management

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;
use crate::models::config::DeployConfig;

/// Deploy hook settings, as stored in the JSON configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Remote repository
    #[serde(default)]
    pub repository: RepositorySettings,

    /// SSH transport
    #[serde(default)]
    pub ssh: SshSettings,

    /// Deployment target and post-deploy commands
    #[serde(default)]
    pub deployment: DeploymentSettings,

    /// Trigger authentication
    #[serde(default)]
    pub security: SecuritySettings,

    /// Transcript and service logging
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Listener
    #[serde(default)]
    pub server: ServerSettings,
}

impl Settings {
    /// Build the immutable deployment configuration.
    ///
    /// Relative paths other than the target directory and SSH key (which are
    /// resolved per request) are anchored to `base_dir` here.
    pub fn to_deploy_config(&self, base_dir: &Path) -> DeployConfig {
        let mut config = DeployConfig::new(
            self.repository.url.clone(),
            self.security.deploy_token.clone(),
            base_dir,
        );
        config.branch = self.repository.branch.clone();
        config.target_directory = PathBuf::from(&self.deployment.target_directory);
        config.ssh_key_path = non_empty(&self.ssh.key_path).map(PathBuf::from);
        config.allow_token_deployment = self.security.allow_token_deployment;
        config.log_file_path = non_empty(&self.logging.log_file).map(|p| {
            let path = PathBuf::from(p);
            if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            }
        });
        config.post_commands = self.deployment.post_commands.clone();
        config.command_timeout = self
            .deployment
            .command_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        config
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn default_true() -> bool {
    true
}

/// Repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySettings {
    /// Clone URL (SSH or HTTPS)
    #[serde(default)]
    pub url: String,

    /// Branch to deploy
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            branch: default_branch(),
        }
    }
}

/// SSH settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SshSettings {
    /// Path to the private key. Empty disables key-based transport.
    #[serde(default)]
    pub key_path: String,
}

/// Deployment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSettings {
    /// Directory that mirrors the remote branch
    #[serde(default = "default_target_directory")]
    pub target_directory: String,

    /// Commands run after a successful sync. `{DIR}` expands to the target.
    #[serde(default)]
    pub post_commands: Vec<String>,

    /// Per-command timeout in seconds
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

fn default_target_directory() -> String {
    "./deployment".to_string()
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            target_directory: default_target_directory(),
            post_commands: Vec::new(),
            command_timeout_secs: None,
        }
    }
}

/// Security settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// Webhook secret, also accepted as a URL token when enabled
    #[serde(default)]
    pub deploy_token: String,

    /// Allow `?token=` triggers. The response status waits for the Git
    /// sync, so slow clones outlast GitHub's 10s delivery timeout; trigger
    /// those with a token from a client that waits longer.
    #[serde(default)]
    pub allow_token_deployment: bool,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Deployment transcript file. Empty disables it.
    #[serde(default)]
    pub log_file: String,

    /// Service log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit service logs as JSON
    #[serde(default)]
    pub json: bool,

    /// Write service logs to stdout
    #[serde(default = "default_true")]
    pub stdout: bool,

    /// Directory for rolling service logs
    #[serde(default)]
    pub service_log_dir: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_file: String::new(),
            log_level: LogLevel::Info,
            json: false,
            stdout: true,
            service_log_dir: None,
        }
    }
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Path of the deployment endpoint
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
        }
    }
}
