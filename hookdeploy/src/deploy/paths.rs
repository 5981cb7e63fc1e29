//! Target directory and SSH key resolution

use std::path::{Component, Path, PathBuf};

use crate::errors::DeployError;
use crate::filesys::file::File;

/// Resolve the configured target directory against `base_dir`.
///
/// A bare `..` means the parent of `base_dir`. Absolute paths are kept as is.
/// The result is lexically normalized but symlinks are not followed.
pub fn resolve_target_dir(base_dir: &Path, configured: &Path) -> PathBuf {
    if configured == Path::new("..") {
        return base_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| base_dir.to_path_buf());
    }
    normalize(&anchor(base_dir, configured))
}

/// Make `base_dir` absolute so resolved paths do not depend on the working
/// directory. Symlinks are resolved when the directory exists.
pub fn absolute_base_dir(base_dir: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(base_dir) {
        return canonical;
    }
    match std::path::absolute(base_dir) {
        Ok(path) => normalize(&path),
        Err(_) => base_dir.to_path_buf(),
    }
}

/// Resolve the SSH key path and make sure the file exists.
///
/// A missing key is a transport error: nothing has been touched yet.
pub async fn resolve_ssh_key(base_dir: &Path, configured: &Path) -> Result<PathBuf, DeployError> {
    let key = normalize(&anchor(base_dir, configured));
    if !File::new(&key).exists().await {
        return Err(DeployError::TransportError(format!(
            "SSH key not found: {}",
            key.display()
        )));
    }
    Ok(key)
}

fn anchor(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
