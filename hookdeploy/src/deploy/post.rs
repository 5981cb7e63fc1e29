//! Post-deploy commands
//!
//! Each command is independent: a failure is logged as a warning and the next
//! command still runs.

use std::path::Path;

use crate::deploy::command::{CommandRunner, CommandSpec};
use crate::deploy::transcript::DeployLog;
use crate::errors::DeployError;
use crate::models::config::DIR_PLACEHOLDER;

/// Summary of a post-deploy run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDeployReport {
    pub attempted: usize,
    pub failed: usize,
}

/// Replace every `{DIR}` in `template` with `target_dir`.
///
/// Substituted text is not scanned again.
pub fn expand_template(template: &str, target_dir: &Path) -> String {
    template.replace(DIR_PLACEHOLDER, &target_dir.to_string_lossy())
}

/// Run every template in order inside `target_dir`
pub async fn run_post_commands(
    templates: &[String],
    target_dir: &Path,
    runner: &dyn CommandRunner,
    log: &DeployLog,
) -> PostDeployReport {
    let mut report = PostDeployReport::default();
    if templates.is_empty() {
        return report;
    }

    log.info("Running post-deployment commands...").await;

    for template in templates {
        let command = expand_template(template, target_dir);
        report.attempted += 1;

        let spec = CommandSpec::shell(command.clone()).current_dir(target_dir);
        let ok = match runner.run(&spec, log).await {
            Ok(result) => result.success(),
            Err(e) => {
                log.warning(e.to_string()).await;
                false
            }
        };

        if !ok {
            report.failed += 1;
            log.warning(DeployError::PostCommandError(command).to_string())
                .await;
        }
    }

    log.info("Post-deployment commands completed").await;
    report
}
