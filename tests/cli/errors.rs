//! Tests for error handling and CLI flags.

use crate::support::*;

#[test]
fn test_no_command_fails() {
    let t = Test::new();

    let output = t.cmd().args(["--yaml", "FOO: bar"]).output().unwrap();
    assert_summon_failure(&output);
    assert_stderr_contains(&output, "Enter a subprocess to run!");
}

#[test]
fn test_help() {
    let t = Test::new();

    let output = t.cmd().arg("--help").output().unwrap();
    assert_success(&output);
    assert_stdout_contains(&output, "Usage");
    assert_stdout_contains(&output, "--all-provider-versions");
}

#[test]
fn test_version_flag() {
    let t = Test::new();

    let output = t.cmd().arg("--version").output().unwrap();
    assert_success(&output);
    assert_stdout_contains(&output, env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_missing_program() {
    let t = Test::new();

    let output = t.run_yaml("FOO: bar", &["summon-no-such-program-anywhere"]);
    assert_summon_failure(&output);
    assert_stderr_contains(&output, "summon-no-such-program-anywhere");
}

#[test]
fn test_missing_secrets_file() {
    let t = Test::new();

    let output = t.cmd().args(["printenv"]).output().unwrap();
    assert_summon_failure(&output);
    assert_stderr_contains(&output, "secrets.yml");
}

#[test]
fn test_unknown_environment() {
    let t = Test::new();

    let output = t
        .cmd()
        .args(["--yaml", "dev:\n  FOO: bar", "-e", "staging", "printenv"])
        .output()
        .unwrap();
    assert_summon_failure(&output);
    assert_stderr_contains(&output, "No such environment 'staging' found in secrets file");
}

#[test]
fn test_undeclared_substitution() {
    let t = Test::new();

    let output = t.run_yaml("FOO: $missing", &["printenv", "FOO"]);
    assert_summon_failure(&output);
    assert_stderr_contains(&output, "Variable missing not declared!");
}

#[test]
fn test_malformed_substitution_flag() {
    let t = Test::new();

    let output = t
        .cmd()
        .args(["-D", "no-equals-sign", "--yaml", "FOO: bar", "printenv"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert_stderr_contains(&output, "VAR=VALUE");
}

#[test]
fn test_unknown_tag() {
    let t = Test::new();

    let output = t.run_yaml("FOO: !nonsense value", &["printenv", "FOO"]);
    assert_summon_failure(&output);
    assert_stderr_contains(&output, "unknown tag");
}
