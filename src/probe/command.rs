//! External command execution with a wall-clock timeout

use crate::error::{AppError, Result};
use crate::logging::ProbeLogger;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Captured output of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub status_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// Why the command failed, or `None` if it exited cleanly
    pub fn failure_reason(&self) -> Option<String> {
        if self.success() {
            return None;
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return Some(stderr.to_string());
        }
        Some(match self.status_code {
            Some(code) => format!("命令退出码 {}", code),
            None => "命令被信号终止".to_string(),
        })
    }
}

/// Runs external programs; swapped for a scripted double in tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, killing it if `timeout` elapses.
    ///
    /// Returns `Err` only when the process cannot be spawned or times out;
    /// a non-zero exit is reported through [`CommandOutput::status_code`].
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput>;
}

/// Spawns real child processes with tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Parsers expect C-locale output
        #[cfg(unix)]
        command.env("LC_ALL", "C");

        let child = command
            .spawn()
            .map_err(|e| AppError::probe_execution(format!("无法启动命令 {}: {}", program, e)))?;

        // Dropping the wait future on timeout drops the child, which kills it
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                status_code: output.status.code(),
            }),
            Ok(Err(e)) => Err(AppError::probe_execution(format!("命令 {} 执行失败: {}", program, e))),
            Err(_) => Err(AppError::timeout(format!(
                "命令执行超时: {} ({}ms)",
                program,
                timeout.as_millis()
            ))),
        }
    }
}

/// A runner paired with command logging
#[derive(Clone)]
pub struct CommandProbe {
    runner: Arc<dyn CommandRunner>,
    logger: ProbeLogger,
}

impl CommandProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, logger: ProbeLogger) -> Self {
        Self { runner, logger }
    }

    pub async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        let started = tokio::time::Instant::now();
        let result = self.runner.run(program, args, timeout).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let status_code = result.as_ref().ok().and_then(|output| output.status_code);
        self.logger.log_command(program, args, status_code, duration_ms).await;
        result
    }
}
