//! Summon - Inject secrets from pluggable providers into a child process.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use summon::cli::output;
use summon::cli::{execute, Cli};
use summon::core::constants::LOG_ENV;
use summon::error::{Error, ProviderError};

/// Exit code for failures before the child runs.
const EXIT_SUMMON_FAILURE: i32 = 127;

fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber with env-filter support
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("summon=debug")
        } else {
            EnvFilter::new("summon=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();

    match execute(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let suggestion = match &e {
                Error::Provider(ProviderError::NotConfigured) => {
                    Some("pass --provider or set SUMMON_PROVIDER")
                }
                Error::Provider(ProviderError::Ambiguous(_)) => {
                    Some("choose one with --provider")
                }
                _ => None,
            };

            output::error(&e.to_string());
            if let Some(hint) = suggestion {
                output::hint(hint);
            }
            std::process::exit(EXIT_SUMMON_FAILURE);
        }
    }
}
