//! Provider executables.
//!
//! A provider is an external program that turns a backend-specific secret
//! path into a secret value. Two invocation strategies are supported:
//!
//! - **Batch**: `provider <secret-path>` once per secret, value on stdout.
//! - **Interactive**: `provider` with no arguments, one secret path per line
//!   on stdin and one base64-encoded answer per line on stdout, in request
//!   order.
//!
//! ## Resolution
//!
//! The provider path comes from the command line, then `SUMMON_PROVIDER`,
//! then the single entry in the provider directory (`SUMMON_PROVIDER_PATH`,
//! `/usr/local/lib/summon`, `<exe dir>/Providers`, `<exe dir>/../lib/summon`).

mod batch;
mod interactive;

pub use interactive::{Interactive, SessionGuard};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::core::constants::{DEFAULT_PROVIDER_DIR, PROVIDER_ENV, PROVIDER_PATH_ENV};
use crate::core::types::{SecretKey, SecretValue};
use crate::error::ProviderError;

/// Outcome of resolving one key.
///
/// An error here affects only this key.
#[derive(Debug)]
pub struct FetchResult {
    pub key: SecretKey,
    pub value: Result<SecretValue, ProviderError>,
}

impl FetchResult {
    pub fn ok(key: impl Into<SecretKey>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Ok(SecretValue::new(value.into())),
        }
    }

    pub fn err(key: impl Into<SecretKey>, error: ProviderError) -> Self {
        Self {
            key: key.into(),
            value: Err(error),
        }
    }
}

/// Caller-supplied replacement for the provider executable.
///
/// Embedders set one on [`RunConfig`](crate::core::summon::RunConfig) to
/// resolve variable secrets in-process. It is called once per secret path,
/// possibly from several threads at a time.
#[derive(Clone)]
pub struct SecretFetcher(Arc<dyn Fn(&str) -> Result<Vec<u8>, ProviderError> + Send + Sync>);

impl SecretFetcher {
    pub fn new<F>(fetch: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<u8>, ProviderError> + Send + Sync + 'static,
    {
        Self(Arc::new(fetch))
    }

    pub fn fetch(&self, secret_path: &str) -> Result<SecretValue, ProviderError> {
        (self.0)(secret_path).map(SecretValue::new)
    }
}

impl std::fmt::Debug for SecretFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretFetcher(..)")
    }
}

/// A resolved, executable provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    path: PathBuf,
}

impl Provider {
    /// Wrap a provider path without validation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the provider from `arg`, `SUMMON_PROVIDER`, or the default
    /// provider directory.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if nothing is configured, the default
    /// directory holds several providers, or the path is not executable.
    pub fn resolve(arg: Option<&str>) -> Result<Self, ProviderError> {
        let candidate = arg
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .or_else(|| std::env::var(PROVIDER_ENV).ok().filter(|v| !v.is_empty()));

        resolve_candidate(candidate, default_path)
    }
}

/// Resolve a provider given an optional explicit candidate.
///
/// `default_dir` is consulted only when it is needed.
pub fn resolve_candidate(
    candidate: Option<String>,
    default_dir: impl Fn() -> Result<PathBuf, ProviderError>,
) -> Result<Provider, ProviderError> {
    let name = match candidate {
        Some(name) => name,
        None => {
            let dir = default_dir()?;
            let mut entries = list_providers(&dir).unwrap_or_default();
            match entries.len() {
                0 => return Err(ProviderError::NotConfigured),
                1 => entries.remove(0),
                _ => return Err(ProviderError::Ambiguous(dir)),
            }
        }
    };

    let path = expand_path(&name, &default_dir)?;
    check_executable(&path)?;

    debug!(provider = %path.display(), "resolved provider");
    Ok(Provider::new(path))
}

/// Bare names live in the provider directory; anything with a path
/// component is taken relative to the working directory.
fn expand_path(
    name: &str,
    default_dir: &impl Fn() -> Result<PathBuf, ProviderError>,
) -> Result<PathBuf, ProviderError> {
    let path = Path::new(name);
    let is_bare = path.file_name().map(|f| f == path.as_os_str()).unwrap_or(false);

    if !is_bare {
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let cwd = std::env::current_dir().map_err(|source| ProviderError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(cwd.join(path));
    }

    Ok(default_dir()?.join(name))
}

fn check_executable(path: &Path) -> Result<(), ProviderError> {
    let metadata = std::fs::metadata(path).map_err(|source| ProviderError::NotFound {
        path: path.to_path_buf(),
        source,
    })?;

    if !metadata.is_file() {
        return Err(ProviderError::NotExecutable(path.to_path_buf()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(ProviderError::NotExecutable(path.to_path_buf()));
        }
    }

    Ok(())
}

/// Directory searched for installed providers.
///
/// # Errors
///
/// Returns `ProviderError::NoProviderDir` when no candidate exists.
pub fn default_path() -> Result<PathBuf, ProviderError> {
    let env_override = std::env::var(PROVIDER_PATH_ENV).ok();
    let exe = std::env::current_exe().ok();
    default_path_from(env_override.as_deref(), exe.as_deref())
}

/// [`default_path`] with its inputs made explicit.
pub fn default_path_from(
    env_override: Option<&str>,
    exe: Option<&Path>,
) -> Result<PathBuf, ProviderError> {
    if let Some(dir) = env_override.filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let system_dir = system_provider_dir();
    if system_dir.is_dir() {
        return Ok(system_dir);
    }

    // Portable installs keep providers next to the binary; Homebrew-style
    // installs keep them in ../lib/summon.
    if let Some(exe_dir) = exe.and_then(Path::parent) {
        let portable = exe_dir.join("Providers");
        if portable.is_dir() {
            return Ok(portable);
        }

        if let Some(base) = exe_dir.parent() {
            let lib = base.join("lib").join("summon");
            if lib.is_dir() {
                return Ok(lib);
            }
        }
    }

    Err(ProviderError::NoProviderDir {
        searched: format!(
            "{}, ${{summon bin dir}}/Providers, ${{summon bin dir}}/../lib/summon, \
             environment variable {}",
            system_dir.display(),
            PROVIDER_PATH_ENV
        ),
    })
}

#[cfg(windows)]
fn system_provider_dir() -> PathBuf {
    let program_files = std::env::var("ProgramW6432")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("C:\\Program Files"));
    program_files
        .join("Cyberark Conjur")
        .join("Summon")
        .join("Providers")
}

#[cfg(not(windows))]
fn system_provider_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PROVIDER_DIR)
}

/// File names of every entry in a provider directory, sorted.
///
/// # Errors
///
/// Returns error if the directory cannot be read.
pub fn list_providers(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}

/// Report `--version` for every provider in `dir`.
///
/// Providers that fail to answer are listed as `unknown version`.
///
/// # Errors
///
/// Returns error if the directory cannot be read.
pub fn versions(dir: &Path) -> std::io::Result<String> {
    let mut report = format!("Provider versions in {}:\n", dir.display());

    for name in list_providers(dir)? {
        let output = std::process::Command::new(dir.join(&name))
            .arg("--version")
            .stdin(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .output();

        match output {
            Ok(out) if out.status.success() => {
                let version = String::from_utf8_lossy(&out.stdout);
                report.push_str(&format!("{} version {}\n", name, version.trim()));
            }
            _ => report.push_str(&format!("{}: unknown version\n", name)),
        }
    }

    Ok(report)
}
