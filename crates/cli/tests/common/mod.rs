//! Helpers for running the `granary` binary

#![allow(dead_code)]

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// CLI command builder with timing
pub struct GranaryCommand {
    working_dir: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl GranaryCommand {
    /// Create a new command in the given working directory
    ///
    /// Logging is silenced and the user configuration is redirected into
    /// the working directory.
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        let working_dir = working_dir.as_ref().to_path_buf();
        let mut env = HashMap::new();
        env.insert("GRANARY_LOG".to_string(), "off".to_string());
        env.insert(
            "XDG_CONFIG_HOME".to_string(),
            working_dir.join(".config").display().to_string(),
        );
        Self {
            working_dir,
            args: Vec::new(),
            env,
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn env(&mut self, key: &str, value: &str) -> &mut Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Execute with no terminal attached
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();
        let output = Command::new(env!("CARGO_BIN_EXE_granary"))
            .args(&self.args)
            .current_dir(&self.working_dir)
            .envs(&self.env)
            .env("NO_COLOR", "1")
            .stdin(Stdio::null())
            .output()
            .context("Failed to execute granary")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            elapsed: start.elapsed(),
        })
    }

    pub fn assert_success(&self) -> Result<CommandResult> {
        self.assert_code(0)
    }

    /// Execute and expect the given result code
    pub fn assert_code(&self, code: i32) -> Result<CommandResult> {
        let result = self.execute()?;
        // Exit statuses are truncated to a byte
        anyhow::ensure!(
            result.exit_code == code & 0xff,
            "granary {:?} exited with {} instead of {}\n--- stdout\n{}--- stderr\n{}",
            self.args,
            result.exit_code,
            code,
            result.stdout,
            result.stderr
        );
        Ok(result)
    }
}

/// Captured output of one run
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub elapsed: Duration,
}

impl CommandResult {
    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}

/// Usage: `granary!(dir, "status", "--show-all").assert_success()?;`
#[macro_export]
macro_rules! granary {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::GranaryCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
