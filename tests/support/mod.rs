//! Test support utilities for summon integration tests.
//!
//! Provides isolated workspaces, fake providers and helper commands.

#![allow(dead_code)]


#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test environment with isolated temp directories.
///
/// Each test gets its own working dir, home dir and provider dir.
/// No process-global state is mutated; child processes use
/// `.current_dir()` and explicit env vars so tests can run in parallel.
pub struct Test {
    /// Working directory for the summon process
    pub dir: TempDir,
    /// Temporary home directory
    pub home: TempDir,
    /// Provider installation directory (`SUMMON_PROVIDER_PATH`)
    pub providers: TempDir,
}

impl Test {
    /// Create a new empty test environment.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let home = TempDir::new().expect("failed to create temp home");
        let providers = TempDir::new().expect("failed to create provider dir");

        Self {
            dir,
            home,
            providers,
        }
    }

    /// Create a test environment with one provider installed.
    pub fn with_provider(name: &str, body: &str) -> (Self, PathBuf) {
        let t = Self::new();
        let path = t.provider(name, body);
        (t, path)
    }

    /// Install an executable shell-script provider and return its path.
    pub fn provider(&self, name: &str, body: &str) -> PathBuf {
        let path = self.providers.path().join(name);
        fs::write(&path, body).expect("failed to write provider");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
                .expect("failed to make provider executable");
        }

        path
    }

    /// Write a file relative to the working directory.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        fs::write(&path, content).expect("failed to write file");
        path
    }

    /// Absolute path of `rel` inside the working directory.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }
}
