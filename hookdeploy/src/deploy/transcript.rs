//! Deployment transcript
//!
//! Every line is timestamped, pushed to the HTTP response stream, appended to
//! the durable log file (if configured) and mirrored to `tracing`.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::filesys::file::File;

/// One transcript line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    /// `[<ISO-8601 timestamp>] <message>`
    pub fn format(&self) -> String {
        format!(
            "[{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, false),
            self.message
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Severity {
    Info,
    Warning,
    Error,
}

/// Append-only transcript for a single request
#[derive(Debug, Default)]
pub struct DeployLog {
    sink: Option<mpsc::UnboundedSender<String>>,
    file: Option<File>,
    entries: Mutex<Vec<LogEntry>>,
}

impl DeployLog {
    pub fn new(log_file: Option<PathBuf>) -> Self {
        Self {
            sink: None,
            file: log_file.map(File::new),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Stream formatted lines to `sink` as they are written
    pub fn with_sink(mut self, sink: mpsc::UnboundedSender<String>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.write(Severity::Info, message.into()).await;
    }

    /// Logged with a `WARNING:` prefix
    pub async fn warning(&self, message: impl AsRef<str>) {
        self.write(Severity::Warning, format!("WARNING: {}", message.as_ref()))
            .await;
    }

    /// Logged with an `ERROR:` prefix
    pub async fn error(&self, message: impl AsRef<str>) {
        self.write(Severity::Error, format!("ERROR: {}", message.as_ref()))
            .await;
    }

    /// Snapshot of every message written so far
    pub fn messages(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().map(|e| e.message.clone()).collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .map(|e| e.message.clone())
                .collect(),
        }
    }

    async fn write(&self, severity: Severity, message: String) {
        match severity {
            Severity::Info => info!(target: "transcript", "{}", message),
            Severity::Warning => warn!(target: "transcript", "{}", message),
            Severity::Error => error!(target: "transcript", "{}", message),
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            message,
        };
        let line = entry.format();

        if let Some(sink) = &self.sink {
            // receiver gone means the client disconnected; keep deploying
            let _ = sink.send(line.clone());
        }

        if let Some(file) = &self.file {
            if let Err(e) = file.append_line_locked(&line).await {
                warn!(
                    path = %file.path().display(),
                    error = %e,
                    "Failed to append to deploy log"
                );
            }
        }

        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
