//! Hookdeploy - Entry Point
//!
//! Listens for push notifications and keeps a directory on this host in
//! sync with a remote Git branch.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use hookdeploy::app::options::AppOptions;
use hookdeploy::app::run::run;
use hookdeploy::deploy::paths::absolute_base_dir;
use hookdeploy::diagnostics::{print_report, run_checks};
use hookdeploy::filesys::file::File;
use hookdeploy::logs::{init_logging, LogOptions};
use hookdeploy::storage::settings::Settings;
use hookdeploy::utils::version_info;

use tracing::{error, info, warn};

const DEFAULT_CONFIG_FILE: &str = "config.json";

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to render version: {}", e),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let config_path = PathBuf::from(
        cli_args
            .get("config")
            .map(String::as_str)
            .unwrap_or(DEFAULT_CONFIG_FILE),
    );
    let mut settings = match File::new(&config_path).read_json::<Settings>().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!(
                "Unable to read settings file {}: {}",
                config_path.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    if let Some(host) = cli_args.get("host") {
        settings.server.host = host.clone();
    }
    if let Some(port) = cli_args.get("port") {
        match port.parse() {
            Ok(port) => settings.server.port = port,
            Err(_) => {
                eprintln!("Invalid port: {}", port);
                return ExitCode::FAILURE;
            }
        }
    }

    let base_dir = match cli_args.get("base-dir") {
        Some(dir) => absolute_base_dir(Path::new(dir)),
        None => config_dir(&config_path),
    };
    let config = settings.to_deploy_config(&base_dir);

    // Run diagnostics
    if cli_args.contains_key("check") {
        let results = run_checks(&config).await;
        return if print_report(&results) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.logging.log_level.clone(),
        stdout: settings.logging.stdout,
        log_dir: settings
            .logging
            .service_log_dir
            .as_ref()
            .map(|dir| base_dir.join(dir)),
        json_format: settings.logging.json,
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    // Requests are refused until this is fixed, but the listener still runs
    if let Err(e) = config.validate() {
        warn!("Configuration incomplete, deployments will be refused: {}", e);
    }

    let options = AppOptions::from_settings(&settings);
    info!(
        "Running deploy hook {} for {} ({}) with options: {:?}",
        version_info().version,
        config.repository_url,
        config.branch,
        options
    );
    if let Err(e) = run(options, config, await_shutdown_signal()).await {
        error!("Failed to run the deploy hook: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Directory holding the configuration file, used as the base for relative paths
fn config_dir(config_path: &Path) -> PathBuf {
    let parent = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    absolute_base_dir(&parent)
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
