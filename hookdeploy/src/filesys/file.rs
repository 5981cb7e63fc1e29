//! File operations

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::errors::DeployError;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, DeployError> {
        let mut file = fs::File::open(&self.path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;
        Ok(contents)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, DeployError> {
        let contents = self.read_string().await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Append one line under an exclusive `flock`.
    ///
    /// Concurrent writers from other requests or processes interleave at line
    /// granularity. Parent directories are created on demand.
    pub async fn append_line_locked(&self, line: &str) -> Result<(), DeployError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let path = self.path.clone();
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        tokio::task::spawn_blocking(move || append_locked(&path, buf.as_bytes()))
            .await
            .map_err(|e| DeployError::Internal(e.to_string()))?
    }
}

fn append_locked(path: &Path, bytes: &[u8]) -> Result<(), DeployError> {
    use nix::fcntl::{Flock, FlockArg};
    use std::io::Write;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let mut locked = Flock::lock(file, FlockArg::LockExclusive)
        .map_err(|(_, errno)| DeployError::IoError(std::io::Error::from(errno)))?;
    locked.write_all(bytes)?;
    locked.flush()?;
    // lock released on drop
    Ok(())
}
