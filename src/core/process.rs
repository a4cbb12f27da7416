//! Child process execution.
//!
//! The child runs with the inherited environment plus the assembled
//! entries. Summon stays resident for the child's lifetime so scratch
//! files can be removed afterwards, relaying every signal it receives.

use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::core::env::Env;
use crate::error::RunError;

/// Standard streams for the child; `None` inherits the parent's.
#[derive(Debug, Default)]
pub struct ChildIo {
    pub stdin: Option<Stdio>,
    pub stdout: Option<Stdio>,
    pub stderr: Option<Stdio>,
}

/// Listens for every catchable signal and relays it to the child.
///
/// Listening starts on construction, so a signal that arrives while
/// secrets are still being prepared is observed instead of killing summon
/// with scratch files on disk. Signals received after that point and
/// before the child starts are delivered to it once it is running.
pub struct SignalRelay {
    received: mpsc::UnboundedReceiver<i32>,
    listeners: Vec<JoinHandle<()>>,
}

impl SignalRelay {
    /// Start listening. Must be called from within a tokio runtime.
    pub fn listen() -> Self {
        let (tx, received) = mpsc::unbounded_channel();
        let listeners = signals::listen(&tx);
        debug!(signals = listeners.len(), "listening for signals");
        Self {
            received,
            listeners,
        }
    }

    /// Resolve once a terminating signal (HUP, INT, QUIT or TERM) arrives.
    ///
    /// Meant for the window before the child exists: other signals have
    /// no recipient yet and are dropped. Returns the signal's name.
    pub async fn interrupted(&mut self) -> String {
        while let Some(raw) = self.received.recv().await {
            if signals::is_terminating(raw) {
                return signals::name(raw);
            }
            trace!(signal = %signals::name(raw), "no child yet, dropping signal");
        }
        std::future::pending().await
    }
}

impl Drop for SignalRelay {
    fn drop(&mut self) {
        for task in self.listeners.drain(..) {
            task.abort();
        }
    }
}

/// Run `args` to completion and return its exit code.
///
/// Signals collected by `relay` are forwarded to the child until it
/// exits.
///
/// # Errors
///
/// Returns `RunError` if there is no command, the program is not on
/// `PATH`, it cannot be started or waited on, or it was killed by a
/// signal. A clean non-zero exit is not an error.
pub async fn run_subcommand(
    args: &[String],
    env: &Env,
    io: ChildIo,
    relay: &mut SignalRelay,
) -> Result<i32, RunError> {
    let (program, rest) = args.split_first().ok_or(RunError::NoCommand)?;
    let binary = which::which(program).map_err(|source| RunError::NotFound {
        program: program.clone(),
        source,
    })?;

    let mut command = Command::new(&binary);
    command
        .args(rest)
        .envs(env.vars())
        .stdin(io.stdin.unwrap_or_else(Stdio::inherit))
        .stdout(io.stdout.unwrap_or_else(Stdio::inherit))
        .stderr(io.stderr.unwrap_or_else(Stdio::inherit));

    let mut child = command.spawn().map_err(|source| RunError::Spawn {
        program: program.clone(),
        source,
    })?;
    debug!(program = %binary.display(), pid = ?child.id(), "started child");

    let pid = child.id();
    let waited = loop {
        tokio::select! {
            waited = child.wait() => break waited,
            Some(raw) = relay.received.recv() => {
                if let Some(pid) = pid {
                    trace!(signal = %signals::name(raw), "forwarding signal to child");
                    signals::send(pid, raw);
                }
            }
        }
    };

    match waited {
        Ok(status) => exit_code(status),
        Err(e) => {
            // The child may be only partially reaped; make sure it is gone.
            let _ = child.start_kill();
            Err(RunError::Wait(e))
        }
    }
}

/// Map a child's exit status to a process exit code.
///
/// # Errors
///
/// Returns `RunError::Signaled` when the child did not exit on its own.
pub fn exit_code(status: ExitStatus) -> Result<i32, RunError> {
    if let Some(code) = status.code() {
        trace!(code, "child exited");
        return Ok(code);
    }
    Err(RunError::Signaled(signal_name(status)))
}

#[cfg(unix)]
fn signal_name(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match status.signal() {
        Some(raw) => signals::name(raw),
        None => status.to_string(),
    }
}

#[cfg(not(unix))]
fn signal_name(status: ExitStatus) -> String {
    status.to_string()
}

#[cfg(unix)]
mod signals {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use tokio::signal::unix::{signal, SignalKind};
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::task::JoinHandle;
    use tracing::{trace, warn};

    /// Never relayed: uncatchable, raised by faults in summon itself, or
    /// reporting on summon's own children.
    const SKIPPED: [Signal; 7] = [
        Signal::SIGKILL,
        Signal::SIGSTOP,
        Signal::SIGSEGV,
        Signal::SIGBUS,
        Signal::SIGFPE,
        Signal::SIGILL,
        Signal::SIGCHLD,
    ];

    const TERMINATING: [Signal; 4] = [
        Signal::SIGHUP,
        Signal::SIGINT,
        Signal::SIGQUIT,
        Signal::SIGTERM,
    ];

    /// Raw numbers of every signal summon listens for.
    pub(super) fn catchable() -> Vec<i32> {
        #[allow(unused_mut)]
        let mut raw: Vec<i32> = Signal::iterator()
            .filter(|sig| !SKIPPED.contains(sig))
            .map(|sig| sig as i32)
            .collect();

        #[cfg(target_os = "linux")]
        raw.extend(nix::libc::SIGRTMIN()..=nix::libc::SIGRTMAX());

        raw
    }

    pub(super) fn listen(tx: &UnboundedSender<i32>) -> Vec<JoinHandle<()>> {
        catchable()
            .into_iter()
            .filter_map(|raw| match signal(SignalKind::from_raw(raw)) {
                Ok(mut stream) => {
                    let tx = tx.clone();
                    Some(tokio::spawn(async move {
                        while stream.recv().await.is_some() {
                            if tx.send(raw).is_err() {
                                break;
                            }
                        }
                    }))
                }
                Err(e) => {
                    warn!(signal = %name(raw), error = %e, "cannot listen for signal");
                    None
                }
            })
            .collect()
    }

    pub(super) fn is_terminating(raw: i32) -> bool {
        Signal::try_from(raw).is_ok_and(|sig| TERMINATING.contains(&sig))
    }

    pub(super) fn name(raw: i32) -> String {
        Signal::try_from(raw)
            .map(|sig| sig.as_str().to_string())
            .unwrap_or_else(|_| raw.to_string())
    }

    pub(super) fn send(pid: u32, raw: i32) {
        let target = Pid::from_raw(pid as i32);
        let sent = match Signal::try_from(raw) {
            Ok(sig) => kill(target, sig),
            Err(_) => send_raw(target, raw),
        };
        if let Err(e) = sent {
            trace!(signal = %name(raw), error = %e, "child did not take signal");
        }
    }

    /// Real-time signals have no `Signal` variant.
    #[cfg(target_os = "linux")]
    fn send_raw(target: Pid, raw: i32) -> nix::Result<()> {
        // SAFETY: kill(2) takes plain integers and touches no memory.
        let rc = unsafe { nix::libc::kill(target.as_raw(), raw) };
        nix::errno::Errno::result(rc).map(drop)
    }

    #[cfg(not(target_os = "linux"))]
    fn send_raw(_: Pid, _: i32) -> nix::Result<()> {
        Err(nix::errno::Errno::EINVAL)
    }
}

#[cfg(not(unix))]
mod signals {
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::task::JoinHandle;

    pub(super) fn listen(_: &UnboundedSender<i32>) -> Vec<JoinHandle<()>> {
        Vec::new()
    }

    pub(super) fn is_terminating(_: i32) -> bool {
        false
    }

    pub(super) fn name(raw: i32) -> String {
        raw.to_string()
    }

    pub(super) fn send(_: u32, _: i32) {}
}
