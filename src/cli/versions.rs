//! Provider versions command.

use tracing::debug;

use crate::core::provider;
use crate::error::Result;

/// Print `--version` output for every installed provider.
pub fn execute() -> Result<()> {
    let dir = provider::default_path()?;
    debug!(dir = %dir.display(), "listing provider versions");

    print!("{}", provider::versions(&dir)?);
    Ok(())
}
