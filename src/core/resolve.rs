//! Secret resolution.
//!
//! Literal secrets resolve to their own text. Variable secrets go to the
//! provider, first through one interactive session and, if that session
//! fails in any way, through one batch call per secret. Every result then
//! passes through the default-value rule and the ignore policy.

use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;

use crate::core::provider::{FetchResult, Provider, SecretFetcher};
use crate::core::secrets_yml::SecretsMap;
use crate::core::types::{SecretKey, SecretValue};
use crate::error::{Error, ProviderError, Result};

/// Which fetch failures are dropped instead of aborting the run.
#[derive(Debug, Clone, Default)]
pub struct IgnorePolicy {
    pub ignore_all: bool,
    pub ignores: Vec<String>,
}

impl IgnorePolicy {
    /// Whether a failure for `key` is dropped.
    ///
    /// List entries match the bare key; `KEY=` is accepted as well.
    pub fn ignores(&self, key: &str) -> bool {
        self.ignore_all
            || self
                .ignores
                .iter()
                .any(|entry| entry == key || entry.strip_suffix('=') == Some(key))
    }
}

/// Split out the secrets that need no provider call.
///
/// Returns the literal results (defaults applied) and the variable
/// secrets still to fetch.
pub fn filter_non_variables(secrets: &SecretsMap) -> (Vec<FetchResult>, SecretsMap) {
    let mut literals = Vec::new();
    let mut variables = SecretsMap::new();

    for (key, spec) in secrets {
        if spec.is_var() {
            variables.insert(key.clone(), spec.clone());
        } else {
            let value = SecretValue::new(spec.path.as_bytes().to_vec());
            literals.push(FetchResult {
                key: key.clone(),
                value: Ok(spec.value_or_default(value)),
            });
        }
    }

    (literals, variables)
}

fn apply_default(result: FetchResult, secrets: &SecretsMap) -> FetchResult {
    let FetchResult { key, value } = result;
    let value = match (value, secrets.get(&key)) {
        (Ok(value), Some(spec)) => Ok(spec.value_or_default(value)),
        (value, _) => value,
    };
    FetchResult { key, value }
}

/// Collect an interactive session's results.
///
/// Any error reported by the session wins over results already received;
/// partial output is discarded in that case.
///
/// # Errors
///
/// Returns the first error the session reports.
pub async fn handle_results_from_provider(
    results: &mut mpsc::Receiver<FetchResult>,
    errors: &mut mpsc::Receiver<ProviderError>,
    secrets: &SecretsMap,
) -> std::result::Result<Vec<FetchResult>, ProviderError> {
    let mut collected = Vec::with_capacity(secrets.len());

    loop {
        tokio::select! {
            biased;

            Some(error) = errors.recv() => return Err(error),

            next = results.recv() => match next {
                Some(result) => collected.push(apply_default(result, secrets)),
                None => break,
            },
        }
    }

    // The session queues its error before closing the result stream.
    if let Ok(error) = errors.try_recv() {
        return Err(error);
    }

    Ok(collected)
}

/// Resolve `secrets` through a single interactive provider session.
///
/// # Errors
///
/// Returns the session's error if the provider does not speak the
/// interactive protocol or breaks it.
pub async fn fetch_interactive(
    provider: &Provider,
    secrets: &SecretsMap,
) -> std::result::Result<Vec<FetchResult>, ProviderError> {
    let mut session = provider.call_interactive(secrets);
    let outcome =
        handle_results_from_provider(&mut session.results, &mut session.errors, secrets).await;
    session.guard.cleanup();
    outcome
}

/// Resolve `secrets` with one concurrent batch call per secret.
///
/// Failures stay attached to their own key.
pub async fn fetch_batch(provider: &Provider, secrets: &SecretsMap) -> Vec<FetchResult> {
    let mut tasks = JoinSet::new();

    for (key, spec) in secrets {
        let provider = provider.clone();
        let key = key.clone();
        let path = spec.path.clone();
        tasks.spawn(async move {
            let value = provider.call(&path).await;
            FetchResult { key, value }
        });
    }

    join_results(tasks, secrets).await
}

/// Resolve `secrets` through a caller-supplied fetcher, one blocking task
/// per secret.
pub async fn fetch_with(fetcher: &SecretFetcher, secrets: &SecretsMap) -> Vec<FetchResult> {
    let mut tasks = JoinSet::new();

    for (key, spec) in secrets {
        let fetcher = fetcher.clone();
        let key = key.clone();
        let path = spec.path.clone();
        tasks.spawn_blocking(move || {
            let value = fetcher.fetch(&path);
            FetchResult { key, value }
        });
    }

    join_results(tasks, secrets).await
}

async fn join_results(mut tasks: JoinSet<FetchResult>, secrets: &SecretsMap) -> Vec<FetchResult> {
    let mut results = Vec::with_capacity(secrets.len());
    let mut task_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(apply_default(result, secrets)),
            Err(e) => task_error = Some(e.to_string()),
        }
    }

    // A task that died took its key with it; report every missing key.
    if let Some(message) = task_error {
        let answered: Vec<SecretKey> = results.iter().map(|r| r.key.clone()).collect();
        for key in secrets.keys().filter(|k| !answered.contains(k)) {
            results.push(FetchResult::err(
                key.clone(),
                ProviderError::Task(message.clone()),
            ));
        }
    }

    results
}

/// Fetch every variable secret, preferring interactive mode.
pub async fn fetch_secrets(provider: &Provider, secrets: &SecretsMap) -> Vec<FetchResult> {
    if secrets.is_empty() {
        return Vec::new();
    }

    match fetch_interactive(provider, secrets).await {
        Ok(results) => {
            debug!(secrets = results.len(), "resolved secrets interactively");
            results
        }
        Err(e) => {
            debug!(error = %e, "interactive session failed, falling back to batch calls");
            fetch_batch(provider, secrets).await
        }
    }
}

/// Apply the ignore policy to merged results.
///
/// Results are visited in key order so the reported failure is stable.
///
/// # Errors
///
/// Returns `Error::Fetch` for the first failure the policy does not cover.
pub fn apply_ignore_policy(
    results: Vec<FetchResult>,
    policy: &IgnorePolicy,
) -> Result<BTreeMap<SecretKey, SecretValue>> {
    let mut sorted = results;
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    let mut resolved = BTreeMap::new();
    for FetchResult { key, value } in sorted {
        match value {
            Ok(value) => {
                resolved.insert(key, value);
            }
            Err(e) if policy.ignores(&key) => {
                debug!(key = %key, error = %e, "ignoring fetch failure");
            }
            Err(source) => return Err(Error::Fetch { key, source }),
        }
    }

    Ok(resolved)
}

/// Resolve every secret to its final value.
///
/// `provider` is only invoked when at least one secret needs it, so runs
/// with literal values only never require a configured provider.
///
/// # Errors
///
/// Returns a provider-resolution error, or `Error::Fetch` for an
/// unignored failure.
pub async fn resolve_secrets<F>(
    secrets: &SecretsMap,
    provider: F,
    policy: &IgnorePolicy,
) -> Result<BTreeMap<SecretKey, SecretValue>>
where
    F: FnOnce() -> std::result::Result<Provider, ProviderError>,
{
    let (mut results, variables) = filter_non_variables(secrets);

    if !variables.is_empty() {
        let provider = provider()?;
        debug!(
            provider = %provider.path().display(),
            variables = variables.len(),
            "fetching variable secrets"
        );
        results.extend(fetch_secrets(&provider, &variables).await);
    }

    apply_ignore_policy(results, policy)
}

/// [`resolve_secrets`] with variable secrets answered by `fetcher`
/// instead of a provider executable.
///
/// # Errors
///
/// Returns `Error::Fetch` for an unignored failure.
pub async fn resolve_secrets_with(
    secrets: &SecretsMap,
    fetcher: &SecretFetcher,
    policy: &IgnorePolicy,
) -> Result<BTreeMap<SecretKey, SecretValue>> {
    let (mut results, variables) = filter_non_variables(secrets);

    if !variables.is_empty() {
        debug!(variables = variables.len(), "fetching variable secrets in-process");
        results.extend(fetch_with(fetcher, &variables).await);
    }

    apply_ignore_policy(results, policy)
}
