//! Environment materialization.
//!
//! Turns resolved values into final environment entries, spilling
//! file-tagged secrets to scratch files, and expands the `@SUMMONENVFILE`
//! and `@SUMMONDOCKERARGS` placeholders in the child's command line.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use tracing::debug;

use crate::core::constants::{DOCKER_ARGS_MAGIC, ENV_FILE_MAGIC};
use crate::core::env::Env;
use crate::core::secrets_yml::{SecretSpec, SecretsMap};
use crate::core::temp::TempFactory;
use crate::core::types::{SecretKey, SecretValue};

/// Final environment plus the matching container-runtime arguments.
#[derive(Debug, Default)]
pub struct Materialized {
    pub env: Env,
    pub docker_args: Vec<String>,
}

/// Environment value for one resolved secret.
///
/// File-tagged secrets are written byte for byte to a scratch file and
/// replaced by its path.
///
/// # Errors
///
/// Returns error if the scratch file cannot be written.
pub fn format_for_env(
    value: SecretValue,
    spec: &SecretSpec,
    temp: &mut TempFactory,
) -> io::Result<SecretValue> {
    if spec.is_file() {
        let path = temp.push(&value)?;
        return Ok(SecretValue::new(path.to_string_lossy().into_owned().into_bytes()));
    }
    Ok(value)
}

/// Build the environment and docker arguments for every resolved secret.
///
/// Each secret contributes `--env KEY`; file-tagged ones also contribute
/// `--volume PATH:PATH` ahead of it.
///
/// # Errors
///
/// Returns error if a scratch file cannot be written.
pub fn materialize(
    resolved: BTreeMap<SecretKey, SecretValue>,
    secrets: &SecretsMap,
    temp: &mut TempFactory,
) -> io::Result<Materialized> {
    let mut out = Materialized::default();

    for (key, value) in resolved {
        let spec = secrets.get(&key);
        let env_value = match spec {
            Some(spec) => format_for_env(value, spec, temp)?,
            None => value,
        };

        if spec.is_some_and(SecretSpec::is_file) {
            let path = String::from_utf8_lossy(&env_value);
            out.docker_args.push("--volume".to_string());
            out.docker_args.push(format!("{}:{}", path, path));
        }
        out.docker_args.push("--env".to_string());
        out.docker_args.push(key.clone());

        out.env.insert(key, env_value);
    }

    debug!(
        entries = out.env.len(),
        files = temp.files().count(),
        "materialized environment"
    );
    Ok(out)
}

/// Replace `@SUMMONENVFILE` in `args` with the path of a dotenv dump of
/// `env`.
///
/// The file is written once, on the first argument that needs it. Returns
/// its path, or `None` when no argument mentions the placeholder.
///
/// # Errors
///
/// Returns error if the file cannot be written.
pub fn setup_env_file(
    args: &mut [String],
    env: &Env,
    temp: &mut TempFactory,
) -> io::Result<Option<PathBuf>> {
    let mut env_file: Option<PathBuf> = None;

    for arg in args.iter_mut().filter(|a| a.contains(ENV_FILE_MAGIC)) {
        let path = match &env_file {
            Some(path) => path.clone(),
            None => {
                let path = temp.push(&env.to_dotenv())?;
                debug!(path = %path.display(), "wrote env file");
                env_file = Some(path.clone());
                path
            }
        };
        *arg = arg.replace(ENV_FILE_MAGIC, &path.to_string_lossy());
    }

    Ok(env_file)
}

/// Expand `@SUMMONDOCKERARGS` in `args`.
///
/// An argument that is exactly the placeholder becomes the whole list;
/// a placeholder inside a longer argument becomes the list joined by
/// spaces.
pub fn expand_docker_args(args: Vec<String>, docker_args: &[String]) -> Vec<String> {
    let mut expanded = Vec::with_capacity(args.len() + docker_args.len());

    for arg in args {
        if arg == DOCKER_ARGS_MAGIC {
            expanded.extend(docker_args.iter().cloned());
        } else if arg.contains(DOCKER_ARGS_MAGIC) {
            expanded.push(arg.replace(DOCKER_ARGS_MAGIC, &docker_args.join(" ")));
        } else {
            expanded.push(arg);
        }
    }

    expanded
}
