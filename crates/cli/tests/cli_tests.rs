//! CLI integration tests

use std::process::Command;

fn run_cli(args: &[&str]) -> std::process::Output {
    let mut full_args = vec!["run", "-p", "mlops-cli", "--quiet", "--"];
    full_args.extend_from_slice(args);

    Command::new("cargo")
        .args(&full_args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help with every verb listed
#[test]
fn test_cli_help_lists_all_verbs() {
    let output = run_cli(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    for verb in [
        "deploy",
        "status",
        "logs",
        "scale",
        "port-forward",
        "test",
        "delete",
        "restart",
        "watch",
        "metrics",
    ] {
        assert!(stdout.contains(verb), "Should list {verb} command");
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run_cli(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("mlops"), "Should show binary name");
}

/// Unknown verbs print usage and exit non-zero
#[test]
fn test_unknown_verb_fails_with_usage() {
    let output = run_cli(&["frobnicate"]);

    assert!(!output.status.success(), "Unknown verb should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Usage") || stderr.contains("error"),
        "Should show usage or error text"
    );
}

/// `scale` without an argument fails before touching the cluster
#[test]
fn test_scale_missing_argument() {
    let output = run_cli(&["scale"]);

    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should report the missing argument"
    );
}

/// Non-numeric replica counts are rejected locally with exit code 1
#[test]
fn test_scale_rejects_non_numeric() {
    let output = run_cli(&["scale", "abc"]);

    assert_eq!(output.status.code(), Some(1), "Should exit with code 1");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("positive integer"),
        "Should explain the constraint"
    );
}

/// Zero replicas are rejected locally with exit code 1
#[test]
fn test_scale_rejects_zero() {
    let output = run_cli(&["scale", "0"]);

    assert_eq!(output.status.code(), Some(1), "Should exit with code 1");
}

/// Negative replicas are rejected locally with exit code 1
#[test]
fn test_scale_rejects_negative() {
    let output = run_cli(&["scale", "-3"]);

    assert_eq!(output.status.code(), Some(1), "Should exit with code 1");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("positive integer"),
        "Should explain the constraint"
    );
}

/// Test command help shows the load parameters
#[test]
fn test_load_test_help() {
    let output = run_cli(&["test", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Test help should succeed");
    assert!(stdout.contains("--requests"), "Should show requests option");
    assert!(
        stdout.contains("--concurrency"),
        "Should show concurrency option"
    );
    assert!(stdout.contains("--waves"), "Should show waves option");
    assert!(stdout.contains("--url"), "Should show url option");
}

/// Logs command help shows the tail option
#[test]
fn test_logs_help() {
    let output = run_cli(&["logs", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Logs help should succeed");
    assert!(stdout.contains("--tail"), "Should show tail option");
}

/// Port-forward command help shows the port option
#[test]
fn test_port_forward_help() {
    let output = run_cli(&["port-forward", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Port-forward help should succeed");
    assert!(stdout.contains("--port"), "Should show port option");
}

/// Global options are available
#[test]
fn test_global_options() {
    let output = run_cli(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--namespace"), "Should show namespace option");
    assert!(
        stdout.contains("--kubeconfig"),
        "Should show kubeconfig option"
    );
    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
}
