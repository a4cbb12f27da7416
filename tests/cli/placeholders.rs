//! Tests for the `@SUMMONENVFILE` and `@SUMMONDOCKERARGS` placeholders.

use crate::support::*;

#[cfg(unix)]
#[test]
fn test_env_file_placeholder() {
    let t = Test::new();

    let output = t.run_yaml(
        "FOO: bar\nSPACED: has spaces\nQUOTED: say \"hi\"",
        &["cat", "@SUMMONENVFILE"],
    );
    assert_success(&output);
    assert_eq!(
        stdout(&output),
        "FOO=bar\nQUOTED=\"say \\\"hi\\\"\"\nSPACED=\"has spaces\"\n"
    );
}

#[cfg(unix)]
#[test]
fn test_env_file_placeholder_inside_argument() {
    let t = Test::new();

    let output = t.run_yaml(
        "FOO: bar",
        &[
            "sh",
            "-c",
            "cat \"${1#--env-file=}\"; echo \"$1\"",
            "sh",
            "--env-file=@SUMMONENVFILE",
        ],
    );
    assert_success(&output);

    let out = stdout(&output);
    let mut lines = out.lines();
    assert_eq!(lines.next(), Some("FOO=bar"));
    let arg = lines.next().unwrap();
    assert!(arg.starts_with("--env-file="), "got: {arg}");
    assert!(!arg.contains("@SUMMONENVFILE"));
}

#[cfg(unix)]
#[test]
fn test_env_file_is_written_once_and_removed() {
    let t = Test::new();

    let output = t.run_yaml(
        "FOO: bar",
        &["echo", "@SUMMONENVFILE", "@SUMMONENVFILE"],
    );
    assert_success(&output);

    let out = stdout(&output);
    let paths: Vec<&str> = out.split_whitespace().collect();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0], paths[1]);
    assert!(!std::path::Path::new(paths[0]).exists());
}

#[cfg(unix)]
#[test]
fn test_env_file_includes_summon_env() {
    let t = Test::new();

    let output = t
        .cmd()
        .args(["--yaml", "prod:\n  FOO: bar", "-e", "prod"])
        .args(["cat", "@SUMMONENVFILE"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(stdout(&output), "FOO=bar\nSUMMON_ENV=prod\n");
}

#[cfg(unix)]
#[test]
fn test_docker_args_whole_argument() {
    let t = Test::new();

    let output = t.run_yaml(
        "A: plain\nF: !file data",
        &["printf", "%s\\n", "@SUMMONDOCKERARGS"],
    );
    assert_success(&output);

    let out = stdout(&output);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 6, "got: {out}");
    assert_eq!(&lines[0..3], &["--env", "A", "--volume"]);
    assert_eq!(&lines[4..6], &["--env", "F"]);

    let (host, container) = lines[3].split_once(':').unwrap();
    assert_eq!(host, container);
}

#[cfg(unix)]
#[test]
fn test_docker_args_substring() {
    let t = Test::new();

    let output = t.run_yaml(
        "A: one\nB: two",
        &["echo", "docker run @SUMMONDOCKERARGS image"],
    );
    assert_success(&output);
    assert_eq!(stdout(&output), "docker run --env A --env B image\n");
}

#[cfg(unix)]
#[test]
fn test_docker_args_skip_ignored_failures() {
    let (t, provider) = Test::with_provider("batch", BATCH_PROVIDER);

    let output = t
        .cmd()
        .arg("-p")
        .arg(&provider)
        .args(["--yaml", "OK: !var ok\nERR: !var error", "-I"])
        .args(["echo", "@SUMMONDOCKERARGS"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(stdout(&output), "--env OK\n");
}
