//! Command runner abstraction for local Host Agent binaries.
//!
//! `CommandRunner` is the trait the states use to execute programs such as `sldreg`.
//! `ProcessRunner` is the production implementation on top of `tokio::process`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// A program invocation, optionally as another user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Run as this user instead of the current one
    pub runas: Option<String>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn runas(mut self, user: impl Into<String>) -> Self {
        self.runas = Some(user.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Command line for logging
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit code and captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub retcode: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.retcode == 0
    }
}

/// Trait for executing local programs
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion. `Err` means it could not be started at all.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Production runner that spawns processes, switching users through `runuser`
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let current_user = std::env::var("USER").ok();
        match spec.runas.as_deref() {
            Some(user) if current_user.as_deref() != Some(user) => {
                // The environment has to survive the user switch
                let mut cmd = Command::new("runuser");
                cmd.args(["-u", user, "--", "env"]);
                cmd.args(spec.env.iter().map(|(k, v)| format!("{}={}", k, v)));
                cmd.arg(&spec.program);
                cmd.args(&spec.args);
                cmd
            }
            _ => {
                let mut cmd = Command::new(&spec.program);
                cmd.args(&spec.args);
                cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                cmd
            }
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %spec.display(), runas = ?spec.runas, "Executing command");

        let output = Self::command(spec)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to execute: {}", spec.display()))?;

        let output = CommandOutput {
            retcode: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        debug!(retcode = output.retcode, "Command finished");
        tracing::trace!(stdout = %output.stdout, stderr = %output.stderr, "Command output");

        Ok(output)
    }
}
