//! Tests for provider resolution and the provider protocols.

use crate::support::*;

#[cfg(unix)]
#[test]
fn test_single_installed_provider_is_default() {
    let (t, _) = Test::with_provider("batch", BATCH_PROVIDER);

    let output = t.run_yaml("MYVAR: !var a/path", &["printenv", "MYVAR"]);
    assert_success(&output);
    assert_eq!(stdout(&output), "mysecret\n");
}

#[cfg(unix)]
#[test]
fn test_bare_provider_name_resolves_in_provider_dir() {
    let t = Test::new();
    t.provider("batch", BATCH_PROVIDER);
    t.provider("dual", DUAL_PROVIDER);

    let output = t
        .cmd()
        .args(["-p", "dual", "--yaml", "MYVAR: !var a/path", "printenv", "MYVAR"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(stdout(&output), "value-of-a/path\n");
}

#[cfg(unix)]
#[test]
fn test_provider_from_environment_variable() {
    let (t, provider) = Test::with_provider("dual", DUAL_PROVIDER);

    let output = t
        .cmd()
        .env("SUMMON_PROVIDER", &provider)
        .args(["--yaml", "MYVAR: !var from/env", "printenv", "MYVAR"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(stdout(&output), "value-of-from/env\n");
}

#[cfg(unix)]
#[test]
fn test_several_installed_providers_are_ambiguous() {
    let t = Test::new();
    t.provider("one", BATCH_PROVIDER);
    t.provider("two", BATCH_PROVIDER);

    let output = t.run_yaml("MYVAR: !var a/path", &["printenv", "MYVAR"]);
    assert_summon_failure(&output);
    assert_stderr_contains(&output, "More than one provider found");
}

#[test]
fn test_no_provider_installed() {
    let t = Test::new();

    let output = t.run_yaml("MYVAR: !var a/path", &["printenv", "MYVAR"]);
    assert_summon_failure(&output);
    assert_stderr_contains(&output, "Could not resolve a provider!");
}

#[test]
fn test_literal_only_run_needs_no_provider() {
    let t = Test::new();

    let output = t
        .cmd()
        .env("SUMMON_PROVIDER", "/nonexistent/provider")
        .args(["--yaml", "FOO: bar", "printenv", "FOO"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(stdout(&output), "bar\n");
}

#[cfg(unix)]
#[test]
fn test_interactive_session_is_used() {
    let (t, provider) = Test::with_provider("dual", DUAL_PROVIDER);

    let output = t
        .cmd()
        .arg("--verbose")
        .arg("-p")
        .arg(&provider)
        .args(["--yaml", "A: !var one\nB: !var two"])
        .args(["sh", "-c", "echo \"$A $B\""])
        .output()
        .unwrap();

    assert_success(&output);
    assert_eq!(stdout(&output), "value-of-one value-of-two\n");
    assert_stderr_contains(&output, "resolved secrets interactively");
}

#[cfg(unix)]
#[test]
fn test_batch_fallback_for_non_interactive_provider() {
    let (t, provider) = Test::with_provider("batch", BATCH_PROVIDER);

    let output = t
        .cmd()
        .arg("--verbose")
        .arg("-p")
        .arg(&provider)
        .args(["--yaml", "A: !var one\nB: !var two"])
        .args(["sh", "-c", "echo \"$A $B\""])
        .output()
        .unwrap();

    assert_success(&output);
    assert_eq!(stdout(&output), "mysecret mysecret\n");
    assert_stderr_contains(&output, "falling back to batch calls");
}

#[cfg(unix)]
#[test]
fn test_batch_fallback_for_broken_interactive_provider() {
    let (t, provider) = Test::with_provider("broken", BROKEN_INTERACTIVE_PROVIDER);

    let output = t.run_with_provider(
        &provider,
        "A: !var one\nB: !var two",
        &["sh", "-c", "echo \"$A $B\""],
    );
    assert_success(&output);
    assert_eq!(stdout(&output), "batch-one batch-two\n");
}

#[cfg(unix)]
#[test]
fn test_interactive_and_batch_resolve_identically() {
    let t = Test::new();
    let dual = t.provider("dual", DUAL_PROVIDER);
    // Same answers, batch protocol only.
    let batch_only = t.provider(
        "dual-batch",
        "#!/bin/sh\n[ $# -eq 0 ] && exit 1\nprintf 'value-of-%s\\n' \"$1\"\n",
    );
    let yaml = "A: !var x/1\nB: !var y/2\nC: !var:file z/3";
    let command = ["sh", "-c", "echo \"$A $B\"; cat \"$C\""];

    let interactive = t.run_with_provider(&dual, yaml, &command);
    let batch = t.run_with_provider(&batch_only, yaml, &command);

    assert_success(&interactive);
    assert_success(&batch);
    assert_eq!(stdout(&interactive), stdout(&batch));
    assert_eq!(stdout(&interactive), "value-of-x/1 value-of-y/2\nvalue-of-z/3");
}

#[cfg(unix)]
#[test]
fn test_all_provider_versions() {
    let t = Test::new();
    t.provider("testprovider", BATCH_PROVIDER);
    t.provider("testprovider-noversionsupport", NO_VERSION_PROVIDER);

    let output = t.cmd().arg("-V").output().unwrap();
    assert_success(&output);

    let expected = format!(
        "Provider versions in {}:\ntestprovider version 1.2.3\ntestprovider-noversionsupport: unknown version\n",
        t.providers.path().display()
    );
    assert_eq!(stdout(&output), expected);
}
