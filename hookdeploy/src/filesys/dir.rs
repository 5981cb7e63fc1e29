//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::DeployError;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Check whether the directory has no entries at all (hidden files count)
    pub async fn is_empty(&self) -> Result<bool, DeployError> {
        let mut entries = fs::read_dir(&self.path).await?;
        Ok(entries.next_entry().await?.is_none())
    }

    /// Check whether `name` exists inside this directory, as file or directory.
    ///
    /// A `.git` file (worktrees, submodules) counts as much as a `.git` dir.
    pub async fn contains(&self, name: &str) -> bool {
        fs::symlink_metadata(self.path.join(name)).await.is_ok()
    }
}
