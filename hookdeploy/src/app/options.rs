//! Application configuration options

use std::time::Duration;

use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Server configuration
    pub server: ServerOptions,

    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
                webhook_path: settings.server.webhook_path.clone(),
            },
            lifecycle: LifecycleOptions::default(),
        }
    }
}

/// Lifecycle options for the service
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown. In-flight deployments past this
    /// point are abandoned.
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path of the deployment endpoint, in addition to `/`
    pub webhook_path: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            webhook_path: "/webhook".to_string(),
        }
    }
}
