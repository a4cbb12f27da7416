//! Error types.
//!
//! Each concern gets its own enum; [`Error`] folds them together so the
//! binary can map any failure to a single line and exit code 127.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for a summon run.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A secret failed to resolve and was not covered by the ignore policy.
    #[error("Error fetching variable {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems with the secrets document or its location.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("failed to read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse secrets document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("secrets document must be a mapping of KEY: value")]
    NotAMapping,

    #[error("No such environment '{0}' found in secrets file")]
    NoSuchEnvironment(String),

    #[error("Variable {0} not declared!")]
    UndeclaredVariable(String),

    #[error("unknown tag '{tag}' on {key}")]
    UnknownTag { key: String, tag: String },

    #[error("unsupported value for {0}: expected a scalar")]
    InvalidValue(String),

    #[error("file specified ({0}) is an absolute path: will not recurse up")]
    AbsoluteRecursePath(String),

    #[error("unable to locate file specified ({0}): reached root of file system")]
    ReachedRoot(String),

    #[error("unable to locate file specified ({file}): {source}")]
    Locate {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

/// Provider resolution and invocation failures.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Could not resolve a provider!")]
    NotConfigured,

    #[error("More than one provider found in {}, please specify one", .0.display())]
    Ambiguous(PathBuf),

    #[error(
        "No provider directory found. Please set the environment variable \
         SUMMON_PROVIDER_PATH to the directory containing providers. \
         Provider paths searched: {searched}"
    )]
    NoProviderDir { searched: String },

    #[error("provider {}: {source}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("provider {} is not executable", .0.display())]
    NotExecutable(PathBuf),

    #[error("failed to start provider: {0}")]
    Spawn(#[source] std::io::Error),

    /// Batch call failed; carries the process error and the provider's stderr.
    #[error("{0}")]
    Call(String),

    #[error("interactive mode not supported")]
    InteractiveNotSupported,

    #[error("interactive provider session timed out after {0}s")]
    InteractiveTimeout(u64),

    #[error("interactive provider answered {received} of {expected} requests")]
    InteractiveIncomplete { expected: usize, received: usize },

    #[error("provider task failed: {0}")]
    Task(String),
}

/// Subprocess launch and supervision failures.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Enter a subprocess to run!")]
    NoCommand,

    #[error("executable file not found: {program}: {source}")]
    NotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for child: {0}")]
    Wait(#[source] std::io::Error),

    #[error("signal: {0}")]
    Signaled(String),

    /// A terminating signal arrived before the child was started.
    #[error("interrupted by {0} before the subprocess started")]
    Interrupted(String),
}

pub type Result<T> = std::result::Result<T, Error>;
