//! Secrets document lookup in parent directories.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::SpecError;

/// Search for `file` in `leaf_dir` and then each of its ancestors.
///
/// # Errors
///
/// Returns `SpecError::AbsoluteRecursePath` for absolute inputs,
/// `SpecError::ReachedRoot` when no ancestor holds the file, and
/// `SpecError::Locate` for any other filesystem error.
pub fn find_in_parent_tree(file: &str, leaf_dir: &Path) -> Result<PathBuf, SpecError> {
    if Path::new(file).is_absolute() {
        return Err(SpecError::AbsoluteRecursePath(file.to_string()));
    }

    let mut dir = leaf_dir;
    loop {
        let candidate = dir.join(file);
        match std::fs::metadata(&candidate) {
            Ok(_) => {
                debug!(path = %candidate.display(), "found secrets document");
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => match dir.parent() {
                Some(parent) => dir = parent,
                None => return Err(SpecError::ReachedRoot(file.to_string())),
            },
            Err(source) => {
                return Err(SpecError::Locate {
                    file: file.to_string(),
                    source,
                })
            }
        }
    }
}
