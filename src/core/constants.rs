//! Constants used throughout summon.
//!
//! Centralizes reserved tokens, environment variable names and defaults.

use std::time::Duration;

/// Default secrets document, relative to the working directory.
pub const DEFAULT_SECRETS_FILE: &str = "secrets.yml";

/// Argument token replaced with the path of a generated env file.
pub const ENV_FILE_MAGIC: &str = "@SUMMONENVFILE";

/// Argument token replaced with container-runtime `--env`/`--volume` flags.
pub const DOCKER_ARGS_MAGIC: &str = "@SUMMONDOCKERARGS";

/// Reserved key exposing the active environment section to the child.
pub const SUMMON_ENV_KEY: &str = "SUMMON_ENV";

/// Overrides the provider executable.
pub const PROVIDER_ENV: &str = "SUMMON_PROVIDER";

/// Overrides the provider installation directory.
pub const PROVIDER_PATH_ENV: &str = "SUMMON_PROVIDER_PATH";

/// Log filter directive, read by the binary.
pub const LOG_ENV: &str = "SUMMON_LOG";

/// Default provider installation directory on unix-like systems.
pub const DEFAULT_PROVIDER_DIR: &str = "/usr/local/lib/summon";

/// Shared-memory mount preferred for scratch files. Never removed.
pub const DEVSHM: &str = "/dev/shm";

/// Prefix for scratch files holding secret material.
pub const TEMP_FILE_PREFIX: &str = ".summon";

/// Upper bound for a whole interactive provider session.
pub const INTERACTIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Sections merged underneath the selected environment, first match wins.
pub const COMMON_SECTIONS: &[&str] = &["common", "default"];
