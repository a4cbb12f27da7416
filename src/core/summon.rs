//! One complete summon run.
//!
//! Parse the secrets document, resolve every secret, materialize the
//! environment, run the child and return its exit code. Scratch files are
//! removed before returning on every path.

use std::collections::HashMap;
use tracing::debug;

use crate::core::constants::{DEFAULT_SECRETS_FILE, SUMMON_ENV_KEY};
use crate::core::env::Env;
use crate::core::locate::find_in_parent_tree;
use crate::core::materialize::{expand_docker_args, materialize, setup_env_file, Materialized};
use crate::core::process::{run_subcommand, ChildIo, SignalRelay};
use crate::core::provider::{Provider, SecretFetcher};
use crate::core::resolve::{resolve_secrets, resolve_secrets_with, IgnorePolicy};
use crate::core::secrets_yml::{self, SecretsMap};
use crate::core::temp::TempFactory;
use crate::error::{Result, RunError, SpecError};

/// Everything needed for one run.
#[derive(Debug)]
pub struct RunConfig {
    /// Child command and its arguments.
    pub args: Vec<String>,
    /// Provider name or path; falls back to `SUMMON_PROVIDER` and the
    /// provider directory.
    pub provider: Option<String>,
    pub filepath: String,
    /// Inline secrets document, used instead of `filepath` when set.
    pub yaml_inline: Option<String>,
    pub subs: HashMap<String, String>,
    pub ignores: Vec<String>,
    pub ignore_all: bool,
    pub environment: Option<String>,
    /// Look for `filepath` in parent directories too.
    pub recurse_up: bool,
    /// Answers variable secrets in-process; no provider is resolved or
    /// run when this is set.
    pub fetcher: Option<SecretFetcher>,
    pub io: ChildIo,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            provider: None,
            filepath: DEFAULT_SECRETS_FILE.to_string(),
            yaml_inline: None,
            subs: HashMap::new(),
            ignores: Vec::new(),
            ignore_all: false,
            environment: None,
            recurse_up: false,
            fetcher: None,
            io: ChildIo::default(),
        }
    }
}

impl RunConfig {
    pub fn new(args: Vec<String>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    fn environment(&self) -> Option<&str> {
        self.environment.as_deref().filter(|e| !e.is_empty())
    }

    fn ignore_policy(&self) -> IgnorePolicy {
        IgnorePolicy {
            ignore_all: self.ignore_all,
            ignores: self.ignores.clone(),
        }
    }
}

/// Load the secrets document named by `config`.
///
/// # Errors
///
/// Returns `SpecError` if the document cannot be found, read or parsed.
pub fn load_secrets(config: &RunConfig) -> std::result::Result<SecretsMap, SpecError> {
    if let Some(inline) = config.yaml_inline.as_deref().filter(|y| !y.is_empty()) {
        return secrets_yml::parse_str(inline, config.environment(), &config.subs);
    }

    if config.recurse_up {
        let cwd = std::env::current_dir().map_err(|source| SpecError::Locate {
            file: config.filepath.clone(),
            source,
        })?;
        let path = find_in_parent_tree(&config.filepath, &cwd)?;
        return secrets_yml::parse_file(path, config.environment(), &config.subs);
    }

    secrets_yml::parse_file(&config.filepath, config.environment(), &config.subs)
}

/// Run the child described by `config` with its secrets injected.
///
/// Returns the child's exit code.
///
/// # Errors
///
/// Returns error for anything that goes wrong before the child exits on
/// its own: a bad secrets document, an unresolvable provider, an
/// unignored fetch failure, a terminating signal before the child
/// starts, or a failure to launch the child.
pub async fn run_subprocess(mut config: RunConfig) -> Result<i32> {
    if config.args.is_empty() {
        return Err(RunError::NoCommand.into());
    }

    let secrets = load_secrets(&config)?;

    // Listen before anything is written to disk.
    let mut relay = SignalRelay::listen();
    let mut temp = TempFactory::new()?;
    debug!(dir = %temp.path().display(), "scratch location");

    let outcome = run_with_secrets(&mut config, &secrets, &mut temp, &mut relay).await;
    temp.cleanup();
    outcome
}

async fn run_with_secrets(
    config: &mut RunConfig,
    secrets: &SecretsMap,
    temp: &mut TempFactory,
    relay: &mut SignalRelay,
) -> Result<i32> {
    let args = std::mem::take(&mut config.args);

    let (args, env) = tokio::select! {
        prepared = prepare(config, args, secrets, temp) => prepared?,
        signal = relay.interrupted() => {
            debug!(signal = %signal, "interrupted while preparing secrets");
            return Err(RunError::Interrupted(signal).into());
        }
    };

    let io = std::mem::take(&mut config.io);
    Ok(run_subcommand(&args, &env, io, relay).await?)
}

/// Resolve and materialize every secret; returns the final command line
/// and environment.
async fn prepare(
    config: &RunConfig,
    mut args: Vec<String>,
    secrets: &SecretsMap,
    temp: &mut TempFactory,
) -> Result<(Vec<String>, Env)> {
    let policy = config.ignore_policy();
    let resolved = match &config.fetcher {
        Some(fetcher) => resolve_secrets_with(secrets, fetcher, &policy).await?,
        None => {
            let provider = || Provider::resolve(config.provider.as_deref());
            resolve_secrets(secrets, provider, &policy).await?
        }
    };

    let Materialized {
        mut env,
        docker_args,
    } = materialize(resolved, secrets, temp)?;

    if let Some(environment) = config.environment() {
        env.insert(SUMMON_ENV_KEY, environment);
    }

    setup_env_file(&mut args, &env, temp)?;
    Ok((expand_docker_args(args, &docker_args), env))
}
