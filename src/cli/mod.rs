//! Command-line interface.

pub mod output;
pub mod run;
pub mod versions;

use clap::{ArgAction, Parser};
use std::collections::HashMap;

use crate::core::constants::{DEFAULT_SECRETS_FILE, PROVIDER_ENV};
use crate::core::summon::RunConfig;
use crate::error::{Result, RunError};

/// Summon - Inject secrets from pluggable providers into a child process.
#[derive(Parser, Debug)]
#[command(
    name = "summon",
    version,
    about = "Parse secrets.yml and export its values to a sub-process environment",
    disable_version_flag = true,
    after_help = "Examples:\n  \
        summon --yaml 'SQL_PASSWORD: !var vault/sql/password' env\n  \
        summon -p keyring.py -D env=prod printenv DB_PASS\n  \
        summon docker run @SUMMONDOCKERARGS myorg/app"
)]
pub struct Cli {
    /// Path to provider for fetching secrets
    #[arg(short, long, env = PROVIDER_ENV)]
    pub provider: Option<String>,

    /// Specify section/environment to parse from secrets.yml
    #[arg(short, long)]
    pub environment: Option<String>,

    /// Path to secrets.yml
    #[arg(short = 'f', value_name = "FILE", default_value = DEFAULT_SECRETS_FILE)]
    pub file: String,

    /// Traverse up the directory tree to find the secrets file
    #[arg(long)]
    pub up: bool,

    /// Substitute $var in the secrets file (repeatable)
    #[arg(short = 'D', value_name = "VAR=VALUE", value_parser = parse_sub)]
    pub subs: Vec<(String, String)>,

    /// Secrets.yml as a literal string
    #[arg(long, value_name = "YAML")]
    pub yaml: Option<String>,

    /// Ignore the specified key if it fails to resolve (repeatable)
    #[arg(short, long, value_name = "KEY")]
    pub ignore: Vec<String>,

    /// Ignore every key that fails to resolve
    #[arg(short = 'I', long)]
    pub ignore_all: bool,

    /// List the versions of every installed provider
    #[arg(short = 'V', long)]
    pub all_provider_versions: bool,

    /// Show debug output on stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Print version
    #[arg(long, action = ArgAction::Version)]
    pub version: Option<bool>,

    /// Command to run, followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// Engine configuration for this invocation.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            provider: self.provider.clone(),
            filepath: self.file.clone(),
            yaml_inline: self.yaml.clone(),
            subs: self.subs.iter().cloned().collect::<HashMap<_, _>>(),
            ignores: self.ignore.clone(),
            ignore_all: self.ignore_all,
            environment: self.environment.clone(),
            recurse_up: self.up,
            ..RunConfig::new(self.command.clone())
        }
    }
}

/// Parse one `-D var=value` substitution.
fn parse_sub(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("invalid substitution '{}': expected VAR=VALUE", raw))
}

/// Dispatch a parsed command line; returns the process exit code.
///
/// # Errors
///
/// Returns error for any failure before the child exits on its own.
pub fn execute(cli: Cli) -> Result<i32> {
    if cli.all_provider_versions {
        versions::execute()?;
        return Ok(0);
    }

    if cli.command.is_empty() {
        return Err(RunError::NoCommand.into());
    }

    run::execute(cli.run_config())
}
