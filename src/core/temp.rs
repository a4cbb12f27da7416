//! Scratch files for secret material.
//!
//! [`TempFactory`] writes file-tagged secrets to private (0600) files and
//! removes every one of them on [`TempFactory::cleanup`] or drop. Files go
//! to `/dev/shm` when available so secrets never touch persistent storage;
//! otherwise a private directory is created under the home directory.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile, TempDir};
use tracing::{debug, warn};

use crate::core::constants::{DEVSHM, TEMP_FILE_PREFIX};

/// Allocator for tracked scratch files.
///
/// Mutation requires `&mut self`, so a single owner funnels all pushes.
#[derive(Debug)]
pub struct TempFactory {
    dir: PathBuf,
    /// Present when the scratch directory belongs to this factory.
    owned_dir: Option<TempDir>,
    files: Vec<NamedTempFile>,
}

impl TempFactory {
    /// Create a factory in the best available scratch location.
    ///
    /// # Errors
    ///
    /// Returns error if a private scratch directory cannot be created.
    pub fn new() -> io::Result<Self> {
        Self::in_dir(default_temp_parent())
    }

    /// Create a factory that places files under `parent`.
    ///
    /// The shared-memory mount is used directly; any other parent gets a
    /// private subdirectory that is removed on cleanup.
    ///
    /// # Errors
    ///
    /// Returns error if the private subdirectory cannot be created.
    pub fn in_dir(parent: impl AsRef<Path>) -> io::Result<Self> {
        let parent = parent.as_ref();

        if parent == Path::new(DEVSHM) {
            return Ok(Self {
                dir: parent.to_path_buf(),
                owned_dir: None,
                files: Vec::new(),
            });
        }

        let owned = Builder::new().prefix(".tmp").tempdir_in(parent)?;
        debug!(dir = %owned.path().display(), "created scratch directory");

        Ok(Self {
            dir: owned.path().to_path_buf(),
            owned_dir: Some(owned),
            files: Vec::new(),
        })
    }

    /// Directory holding the scratch files.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    #[cfg(test)]
    fn owns_dir(&self) -> bool {
        self.owned_dir.is_some()
    }

    /// Write `value` to a new tracked file and return its path.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written.
    pub fn push(&mut self, value: &[u8]) -> io::Result<PathBuf> {
        let mut file = Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .tempfile_in(&self.dir)?;
        file.write_all(value)?;
        file.flush()?;

        let path = file.path().to_path_buf();
        self.files.push(file);
        Ok(path)
    }

    /// Paths of every file pushed and not yet cleaned up.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path())
    }

    /// Remove all tracked files and the owned scratch directory.
    ///
    /// Safe to call more than once; failures are logged and skipped.
    pub fn cleanup(&mut self) {
        for file in self.files.drain(..) {
            let path = file.path().to_path_buf();
            if let Err(e) = file.close() {
                warn!(path = %path.display(), error = %e, "failed to remove scratch file");
            }
        }

        if let Some(dir) = self.owned_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(path = %path.display(), error = %e, "failed to remove scratch directory");
            }
        }
    }
}

impl Drop for TempFactory {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Best parent directory for scratch files.
///
/// Prefers the shared-memory mount, then the home directory, then the
/// system temp directory.
pub fn default_temp_parent() -> PathBuf {
    let shm = Path::new(DEVSHM);
    if shm.is_dir() {
        return shm.to_path_buf();
    }

    dirs::home_dir().unwrap_or_else(std::env::temp_dir)
}
