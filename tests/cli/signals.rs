//! Tests for signal forwarding to the child.

#![cfg(unix)]

use crate::support::*;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

fn spawn_summon(t: &Test, args: &[&str]) -> Child {
    #[allow(deprecated)]
    let binary = assert_cmd::cargo::cargo_bin("summon");
    Command::new(binary)
        .env("HOME", t.home.path())
        .env("SUMMON_PROVIDER_PATH", t.providers.path())
        .env("NO_COLOR", "1")
        .env_remove("SUMMON_PROVIDER")
        .env_remove("SUMMON_LOG")
        .current_dir(t.dir.path())
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap()
}

fn wait_for(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !path.exists() {
        assert!(Instant::now() < deadline, "{} never appeared", path.display());
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn send(signal: &str, pid: u32) {
    let status = Command::new("kill")
        .args([&format!("-{}", signal), &pid.to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

/// Child script that records `$F`, traps `signal` and waits for it.
fn trapping_child(t: &Test, signal: &str) -> String {
    format!(
        "trap 'echo caught > {marker}; exit 0' {signal}; printf '%s' \"$F\" > {secret}; \
         touch {ready}; while true; do sleep 0.1; done",
        marker = t.path("caught").display(),
        secret = t.path("secret-path").display(),
        ready = t.path("ready").display(),
    )
}

/// Deliver `signal` to summon while its child runs; the child must get it
/// and the file-backed secret must be gone afterwards.
fn assert_forwarded(signal: &str) {
    let t = Test::new();
    let script = trapping_child(&t, signal);

    let mut summon = spawn_summon(&t, &["--yaml", "F: !file topsecret", "sh", "-c", &script]);
    wait_for(&t.path("ready"));
    send(signal, summon.id());

    let status = summon.wait().unwrap();
    assert_eq!(status.code(), Some(0), "signal {signal}");
    assert_eq!(std::fs::read_to_string(t.path("caught")).unwrap(), "caught\n");

    let secret = std::fs::read_to_string(t.path("secret-path")).unwrap();
    assert!(!Path::new(&secret).exists(), "{secret} left behind after {signal}");
}

#[test]
fn test_term_is_forwarded_to_child() {
    assert_forwarded("TERM");
}

#[test]
fn test_user_signal_is_forwarded_to_child() {
    assert_forwarded("USR2");
}

#[cfg(target_os = "linux")]
#[test]
fn test_signal_outside_job_control_is_forwarded() {
    let pwr = nix::sys::signal::Signal::SIGPWR as i32;
    assert_forwarded(&pwr.to_string());
}

#[cfg(target_os = "linux")]
#[test]
fn test_realtime_signal_is_forwarded() {
    let rt = nix::libc::SIGRTMIN() + 2;
    assert_forwarded(&rt.to_string());
}

#[test]
fn test_term_while_fetching_aborts_cleanly() {
    let t = Test::new();
    let ready = t.path("fetching");
    let provider = t.provider(
        "slow",
        &format!(
            "#!/bin/sh\ntouch {}\nexec sleep 30\n",
            ready.display()
        ),
    );

    let mut summon = spawn_summon(
        &t,
        &[
            "-p",
            &provider.to_string_lossy(),
            "--yaml",
            "A: !var a",
            "sh",
            "-c",
            "touch ran",
        ],
    );
    wait_for(&ready);
    let started = Instant::now();
    send("TERM", summon.id());

    let output = summon.wait_with_output().unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(output.status.code(), Some(SUMMON_FAILURE));
    assert!(String::from_utf8_lossy(&output.stderr).contains("interrupted by SIGTERM"));
    assert!(!t.path("ran").exists());
}
