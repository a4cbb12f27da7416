//! One-shot provider calls.

use std::process::Stdio;
use tokio::process::Command;
use tracing::trace;

use super::Provider;
use crate::core::types::SecretValue;
use crate::error::ProviderError;

impl Provider {
    /// Fetch one secret by running `provider <secret_path>`.
    ///
    /// Returns stdout with surrounding ASCII whitespace removed; the bytes
    /// in between are kept as they are. On failure the error carries the process
    /// error followed by the provider's trimmed stderr. Holds no shared
    /// state, so calls for different secrets may run concurrently.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Call` if the provider cannot be started or
    /// exits non-zero.
    pub async fn call(&self, secret_path: &str) -> Result<SecretValue, ProviderError> {
        trace!(provider = %self.path.display(), "calling provider");

        let output = Command::new(&self.path)
            .arg(secret_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProviderError::Call(e.to_string()))?;

        if !output.status.success() {
            let mut message = output.status.to_string();
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if !stderr.is_empty() {
                message.push_str(": ");
                message.push_str(stderr);
            }
            return Err(ProviderError::Call(message));
        }

        let stdout = SecretValue::new(output.stdout);
        Ok(SecretValue::new(trim_ascii_whitespace(&stdout).to_vec()))
    }
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
