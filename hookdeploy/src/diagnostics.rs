//! Host and configuration checks for `--check`

use std::path::Path;

use colored::Colorize;
use sysinfo::System;
use tokio::process::Command;

use crate::deploy::paths::{resolve_ssh_key, resolve_target_dir};
use crate::models::config::DeployConfig;

/// Outcome of a single check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
    /// Informational checks never fail the run
    pub required: bool,
}

impl CheckResult {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: detail.into(),
            required: true,
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail: detail.into(),
            required: true,
        }
    }

    fn info(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: detail.into(),
            required: false,
        }
    }
}

/// Run every check against `config`
pub async fn run_checks(config: &DeployConfig) -> Vec<CheckResult> {
    let mut results = vec![CheckResult::info("Host", host_summary())];

    results.push(match config.validate() {
        Ok(()) => CheckResult::pass("Configuration", "valid"),
        Err(e) => CheckResult::fail("Configuration", e.to_string()),
    });

    let base_dir = config.base_dir.as_path();
    let target = resolve_target_dir(base_dir, &config.target_directory);
    results.push(CheckResult::info("Target directory", target.display().to_string()));

    results.push(match &config.ssh_key_path {
        None => CheckResult::info("SSH key", "not configured"),
        Some(configured) => match resolve_ssh_key(base_dir, configured).await {
            Ok(key) => CheckResult::pass("SSH key", key.display().to_string()),
            Err(e) => CheckResult::fail("SSH key", e.to_string()),
        },
    });

    results.push(tool_check("git", "git", &["--version"]).await);
    results.push(tool_check("ssh", "ssh", &["-V"]).await);
    results
}

/// Print the check report. Returns whether every required check passed.
pub fn print_report(results: &[CheckResult]) -> bool {
    println!("Deploy hook diagnostics");
    println!("=======================");
    println!();

    let mut ok = true;
    for result in results {
        let label = if !result.required {
            "INFO".cyan()
        } else if result.passed {
            "PASS".green().bold()
        } else {
            ok = false;
            "FAIL".red().bold()
        };
        println!("[{}] {}: {}", label, result.name, result.detail);
    }

    println!();
    if ok {
        println!("{}", "All required checks passed".green());
    } else {
        println!("{}", "Some required checks failed".red());
    }
    ok
}

fn host_summary() -> String {
    format!(
        "{} ({} {})",
        System::host_name().unwrap_or_else(|| "unknown".to_string()),
        System::name().unwrap_or_else(|| "unknown".to_string()),
        System::os_version().unwrap_or_default(),
    )
}

async fn tool_check(name: &str, program: impl AsRef<Path>, args: &[&str]) -> CheckResult {
    match Command::new(program.as_ref()).args(args).output().await {
        Ok(output) if output.status.success() => {
            // ssh -V reports on stderr
            let text = if output.stdout.is_empty() {
                output.stderr
            } else {
                output.stdout
            };
            let first = String::from_utf8_lossy(&text)
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            CheckResult::pass(name, first)
        }
        Ok(output) => CheckResult::fail(name, format!("exited with {}", output.status)),
        Err(e) => CheckResult::fail(name, format!("not executable: {}", e)),
    }
}
