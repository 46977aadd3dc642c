/// Smoke tests to verify the binary runs without panicking
use std::process::Command;

#[test]
fn binary_shows_help() {
    let output = Command::new("cargo")
        .args(["run", "--", "--help"])
        .output()
        .expect("Failed to execute cargo run");

    assert!(
        output.status.success(),
        "Binary failed to run --help: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("guessviz"), "Help output should mention guessviz");
    for sub in ["play", "demo", "mode"] {
        assert!(stdout.contains(sub), "Help output should list {sub}");
    }
}

#[test]
fn binary_shows_version() {
    let output = Command::new("cargo")
        .args(["run", "--", "--version"])
        .output()
        .expect("Failed to execute cargo run");

    assert!(
        output.status.success(),
        "Binary failed to run --version: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn invalid_subcommand_fails_gracefully() {
    let output = Command::new("cargo")
        .args(["run", "--", "nonexistent-command"])
        .output()
        .expect("Failed to execute cargo run");

    assert!(
        !output.status.success(),
        "Invalid subcommand should return error status"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("panicked"), "Should not panic on invalid subcommand");
}

#[test]
fn invalid_mode_is_rejected() {
    let output = Command::new("cargo")
        .args(["run", "--", "demo", "--mode", "sideways"])
        .output()
        .expect("Failed to execute cargo run");

    assert!(!output.status.success(), "Unknown mode should be rejected");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sideways"), "Error should name the bad value");
    assert!(!stderr.contains("panicked"));
}
