//! Common test utilities for tether integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Environment variables that would leak a real provider into tests
const PROVIDER_VARS: &[&str] = &[
    "LLM_API_KEY",
    "MOONSHOT_API_KEY",
    "LLM_BASE_URL",
    "LLM_MODEL",
    "LLM_TEMPERATURE",
    "TETHER_MAX_STEPS",
    "RUST_LOG",
];

/// Isolated home and working directory for one test
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let config_dir = temp_dir.path().join(".tether");
        std::fs::create_dir_all(&config_dir)?;

        Ok(Self {
            temp_dir,
            config_dir,
        })
    }

    pub fn config_file(&self, name: &str) -> PathBuf {
        self.config_dir.join(name)
    }

    /// A command with HOME and the working directory inside the test env and
    /// no provider credentials
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tether"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.current_dir(self.temp_dir.path());
        for var in PROVIDER_VARS {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Run the agent with `lines` on stdin and parse every stdout line
    pub fn converse(&self, lines: &[Value]) -> anyhow::Result<Vec<Value>> {
        let input: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        self.converse_raw(&input)
    }

    pub fn converse_raw(&self, input: &str) -> anyhow::Result<Vec<Value>> {
        let output = self.command().write_stdin(input.to_string()).output()?;
        anyhow::ensure!(
            output.status.success(),
            "tether exited with {:?}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );

        String::from_utf8(output.stdout)?
            .lines()
            .map(|line| Ok(serde_json::from_str(line)?))
            .collect()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
