//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary data directory, so every invocation in a test sees the
/// durable state left by the previous ones and nothing else.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Journal directory (isolated per test).
  pub fn data_path(&self) -> PathBuf {
    self.temp.path().join("data")
  }

  pub fn journal_path(&self) -> PathBuf {
    self.data_path().join("journal.jsonl")
  }

  /// Get a pre-configured Command for the warren binary.
  ///
  /// Sets environment variables for isolated testing:
  /// - `WARREN_DATA_DIR`: Isolated journal directory
  /// - `WARREN_JOURNAL_SYNC`: `never`, to skip fsync
  pub fn warren_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("warren");
    cmd.env("WARREN_DATA_DIR", self.data_path());
    cmd.env("WARREN_JOURNAL_SYNC", "never");
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// Run `args` and require success.
  pub fn run(&self, args: &[&str]) {
    self.warren_cmd().args(args).assert().success();
  }

  /// `status -o json`, parsed.
  pub fn status(&self) -> serde_json::Value {
    let output = self.warren_cmd().args(["status", "-o", "json"]).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
  }

  /// Names of the user-declared queues.
  pub fn queue_names(&self) -> Vec<String> {
    names(&self.status()["queues"])
  }

  /// Names of the user-declared exchanges.
  pub fn exchange_names(&self) -> Vec<String> {
    names(&self.status()["exchanges"])
  }

  pub fn binding_count(&self) -> usize {
    self.status()["bindings"].as_array().map_or(0, Vec::len)
  }
}

fn names(list: &serde_json::Value) -> Vec<String> {
  list
    .as_array()
    .unwrap()
    .iter()
    .map(|entity| entity["def"]["name"].as_str().unwrap().to_string())
    .collect()
}
