//! Integration tests for the progrich CLI binary.

use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Runs the demo binary with an isolated config directory
struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        Self { temp_dir }
    }

    fn config_path(&self, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join("config.toml");
        std::fs::write(&path, content).expect("failed to write config");
        path
    }

    fn demo_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_progrich-demo");
        let mut cmd = Command::new(bin_path);
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.temp_dir.path());
        cmd.env_remove("PROGRICH_CONFIG");
        cmd
    }
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx
        .demo_cmd()
        .arg("--help")
        .output()
        .expect("failed to run progrich-demo");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("nested"));
}

#[test]
fn test_headless_spinner_prints_final_line() {
    let ctx = TestContext::new();
    let output = ctx
        .demo_cmd()
        .args(["spinner", "--delay-ms", "0"])
        .output()
        .expect("failed to run progrich-demo");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Verified"));
}

#[test]
fn test_headless_nested_run() {
    let ctx = TestContext::new();
    let output = ctx
        .demo_cmd()
        .args(["nested", "--epochs", "2", "--steps", "3", "--delay-ms", "0", "--persist"])
        .output()
        .expect("failed to run progrich-demo");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Saved checkpoint 2"));
}

#[test]
fn test_invalid_config_fails() {
    let ctx = TestContext::new();
    let config = ctx.config_path("target = \"printer\"\n");
    let output = ctx
        .demo_cmd()
        .arg("--config")
        .arg(&config)
        .args(["bars", "--delay-ms", "0"])
        .output()
        .expect("failed to run progrich-demo");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load config"));
}

#[test]
fn test_config_file_is_honoured() {
    let ctx = TestContext::new();
    let config = ctx.config_path("completed_on_top = true\nbar_width = 10\n");
    let output = ctx
        .demo_cmd()
        .arg("--config")
        .arg(&config)
        .args(["bars", "-n", "2", "-t", "4", "--delay-ms", "0"])
        .output()
        .expect("failed to run progrich-demo");
    assert!(output.status.success());
}
