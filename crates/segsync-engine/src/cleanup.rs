use std::io;
use std::path::{Path, PathBuf};

/// Removes a transient file when dropped, whichever way the scope exits.
///
/// A missing file is not an error: after a successful commit the temporary
/// file has already been renamed away.
#[derive(Debug)]
pub struct RemoveOnDrop {
    path: PathBuf,
}

impl RemoveOnDrop {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        match remove_if_exists(&self.path) {
            Ok(true) => tracing::debug!(path = %self.path.display(), "removed transient file"),
            Ok(false) => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove transient file"
            ),
        }
    }
}

/// Delete `path` if present. Returns whether anything was removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
