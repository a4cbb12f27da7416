//! Run command.
//!
//! Executes a command with its secrets injected as environment variables.

use crate::core::summon::{run_subprocess, RunConfig};
use crate::error::Result;

/// Run the configured command to completion and return its exit code.
///
/// Builds the async runtime for the duration of the run; the runtime is
/// shut down, and scratch files removed, before this returns.
pub fn execute(config: RunConfig) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_subprocess(config))
}
