//! Persistent provider sessions.
//!
//! The provider is started once with no arguments. A feeder task writes
//! each secret path to its stdin, one per line, and queues the matching
//! key; a reader task decodes one base64 line of stdout per request and
//! pairs it with the next queued key. Responses carry no identifier, so
//! the provider must answer in exactly the order requests were written.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{FetchResult, Provider};
use crate::core::constants::INTERACTIVE_TIMEOUT;
use crate::core::secrets_yml::SecretsMap;
use crate::core::types::SecretKey;
use crate::error::ProviderError;

/// Streams produced by an interactive session.
///
/// `results` closes once every request has been answered. Anything on
/// `errors` means the session is unusable and its results must be
/// discarded. `guard` must outlive both receivers' use.
pub struct Interactive {
    pub results: mpsc::Receiver<FetchResult>,
    pub errors: mpsc::Receiver<ProviderError>,
    pub guard: SessionGuard,
}

/// Owns the provider process and the session's I/O tasks.
///
/// Cleanup closes the pipes and kills the provider; it runs on drop.
#[derive(Default)]
pub struct SessionGuard {
    child: Option<Child>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionGuard {
    pub fn cleanup(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(mut child) = self.child.take() {
            // The provider may already have exited; nothing to report.
            let _ = child.start_kill();
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl Provider {
    /// Start an interactive session resolving every entry of `secrets`.
    ///
    /// Must be called from within a tokio runtime. The whole session is
    /// bounded by a 10 second timeout.
    pub fn call_interactive(&self, secrets: &SecretsMap) -> Interactive {
        let expected = secrets.len();
        let (result_tx, results) = mpsc::channel(expected.max(1));
        let (error_tx, errors) = mpsc::channel(2);
        let mut guard = SessionGuard::default();

        debug!(
            provider = %self.path.display(),
            requests = expected,
            "starting interactive provider session"
        );

        let spawned = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let _ = error_tx.try_send(ProviderError::Spawn(e));
                return Interactive {
                    results,
                    errors,
                    guard,
                };
            }
        };

        let pipes = (child.stdin.take(), child.stdout.take());
        guard.child = Some(child);
        let (Some(stdin), Some(stdout)) = pipes else {
            let _ = error_tx.try_send(ProviderError::InteractiveNotSupported);
            return Interactive {
                results,
                errors,
                guard,
            };
        };

        let requests: Vec<(SecretKey, String)> = secrets
            .iter()
            .map(|(key, spec)| (key.clone(), spec.path.clone()))
            .collect();
        let (queue_tx, queue_rx) = mpsc::channel(expected.max(1));

        guard
            .tasks
            .push(tokio::spawn(feed_requests(stdin, requests, queue_tx, error_tx.clone())));
        guard.tasks.push(tokio::spawn(async move {
            let read = read_responses(stdout, queue_rx, &result_tx, expected);
            let error = match tokio::time::timeout(INTERACTIVE_TIMEOUT, read).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(_) => Some(ProviderError::InteractiveTimeout(
                    INTERACTIVE_TIMEOUT.as_secs(),
                )),
            };
            if let Some(e) = error {
                let _ = error_tx.try_send(e);
            }
            // Dropping the sender closes the result stream after any error
            // has been queued.
            drop(result_tx);
        }));

        Interactive {
            results,
            errors,
            guard,
        }
    }
}

async fn feed_requests(
    mut stdin: ChildStdin,
    requests: Vec<(SecretKey, String)>,
    queue: mpsc::Sender<SecretKey>,
    errors: mpsc::Sender<ProviderError>,
) {
    for (key, path) in requests {
        let line = format!("{}\n", path);
        let written = match stdin.write_all(line.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            debug!(error = %e, "provider rejected interactive request");
            let _ = errors.try_send(ProviderError::InteractiveNotSupported);
            return;
        }

        if queue.send(key).await.is_err() {
            return;
        }
    }

    // Keep stdin open until the session is torn down.
    std::future::pending::<()>().await;
}

async fn read_responses(
    stdout: ChildStdout,
    mut queue: mpsc::Receiver<SecretKey>,
    results: &mpsc::Sender<FetchResult>,
    expected: usize,
) -> Result<(), ProviderError> {
    let mut lines = BufReader::new(stdout).lines();
    let mut received = 0;

    while received < expected {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(_) => return Err(ProviderError::InteractiveNotSupported),
        };

        let decoded = STANDARD
            .decode(line.trim())
            .map_err(|_| ProviderError::InteractiveNotSupported)?;
        let Some(key) = queue.recv().await else {
            return Err(ProviderError::InteractiveNotSupported);
        };

        trace!(key = %key, "interactive response");
        if results.send(FetchResult::ok(key, decoded)).await.is_err() {
            // Nobody is listening any more.
            return Ok(());
        }
        received += 1;
    }

    match received {
        0 => Err(ProviderError::InteractiveNotSupported),
        n if n < expected => Err(ProviderError::InteractiveIncomplete {
            expected,
            received: n,
        }),
        _ => Ok(()),
    }
}
