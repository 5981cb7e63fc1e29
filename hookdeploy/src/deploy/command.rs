//! External command execution
//!
//! Commands are built as argument lists and spawned directly; only post-deploy
//! templates go through `sh -c`. Output from stdout and stderr is merged in
//! arrival order and streamed into the transcript line by line.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::deploy::transcript::DeployLog;
use crate::errors::DeployError;

/// A structured command: program, arguments, environment and working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    /// `sh -c <script>`
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_envs(&self) -> &[(String, String)] {
        &self.envs
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }
}

/// Shell-like rendering, for the transcript only. Never executed.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.envs {
            write!(f, "{}={} ", key, shell_quote(value))?;
        }
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Quote a word for display in POSIX shell syntax
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@%+=,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Outcome of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit status; `-1` when the process was terminated by a signal
    pub exit_code: i32,

    /// Merged stdout/stderr lines in arrival order
    pub output_lines: Vec<String>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs commands on behalf of the synchronizer and post-deploy runner
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion, logging every output line to `log`.
    ///
    /// A non-zero exit is returned as `Ok`; callers decide escalation.
    /// `Err` means the command could not be run or timed out.
    async fn run(&self, spec: &CommandSpec, log: &DeployLog) -> Result<CommandResult, DeployError>;
}

/// Spawns real processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec, log: &DeployLog) -> Result<CommandResult, DeployError> {
        log.info(format!("Executing: {}", spec)).await;

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                log.error(format!("Failed to start {}: {}", spec.program, e))
                    .await;
                return Err(DeployError::IoError(e));
            }
        };
        debug!(pid = ?child.id(), program = %spec.program, "Spawned command");

        let stdout = child.stdout.take().map(BufReader::new);
        let stderr = child.stderr.take().map(BufReader::new);
        let mut output_lines = Vec::new();

        let finished = {
            let run = async {
                pump_output(stdout, stderr, log, &mut output_lines).await?;
                child.wait().await
            };
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, run).await.ok(),
                None => Some(run.await),
            }
        };

        let status = match finished {
            Some(status) => status?,
            None => {
                let secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
                kill_process_group(&mut child);
                // reap the child so it doesn't linger as a zombie
                let _ = child.wait().await;
                log.error(format!("Command timed out after {}s, process killed", secs))
                    .await;
                return Err(DeployError::Timeout {
                    command: spec.to_string(),
                    secs,
                });
            }
        };

        let exit_code = status.code().unwrap_or(-1);
        if exit_code != 0 {
            log.error(format!("Command failed with exit code: {}", exit_code))
                .await;
        }

        Ok(CommandResult {
            exit_code,
            output_lines,
        })
    }
}

/// SIGKILL the child's whole process group, so `sh -c` scripts don't leave
/// their own children running. Falls back to killing the child alone.
fn kill_process_group(child: &mut Child) {
    if let Some(pid) = child.id() {
        match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            Ok(()) => return,
            Err(e) => warn!(pid, "Failed to kill process group: {}", e),
        }
    }
    let _ = child.start_kill();
}

async fn pump_output<O, E>(
    mut stdout: Option<O>,
    mut stderr: Option<E>,
    log: &DeployLog,
    lines: &mut Vec<String>,
) -> std::io::Result<()>
where
    O: AsyncBufRead + Unpin,
    E: AsyncBufRead + Unpin,
{
    let mut out_done = stdout.is_none();
    let mut err_done = stderr.is_none();
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();

    while !(out_done && err_done) {
        let line = tokio::select! {
            line = read_line_lossy(&mut stdout, &mut out_buf), if !out_done => {
                let line = line?;
                out_done = line.is_none();
                line
            }
            line = read_line_lossy(&mut stderr, &mut err_buf), if !err_done => {
                let line = line?;
                err_done = line.is_none();
                line
            }
        };

        if let Some(line) = line {
            log.info(format!("  > {}", line)).await;
            lines.push(line);
        }
    }

    Ok(())
}

async fn read_line_lossy<R>(reader: &mut Option<R>, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(None);
    };

    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}
