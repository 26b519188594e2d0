use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use plangate_core::{AppError, AppResult};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Exit code and combined stdout/stderr of one shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ShellOutput {
    pub(crate) exit_code: Option<i32>,
    pub(crate) output: String,
}

impl ShellOutput {
    pub(crate) fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Exit code for messages. Signals report `-1`.
    pub(crate) fn code(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }
}

/// Runs `command` with `sh -c` in `dir`, handing every output line to `on_line`.
///
/// Stderr is folded into stdout so lines keep their order. The child is killed
/// when `timeout` elapses.
pub(crate) async fn run_shell(
    command: &str,
    dir: &Path,
    envs: &HashMap<String, String>,
    timeout: Duration,
    mut on_line: impl FnMut(&str) + Send,
) -> AppResult<ShellOutput> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(format!("exec 2>&1\n{command}"))
        .current_dir(dir)
        .envs(envs)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to start {command:?} in {}: {error}",
                dir.display()
            ))
        })?;

    let stdout = child.stdout.take().ok_or_else(|| {
        AppError::Internal(format!("failed to capture output of {command:?}"))
    })?;

    let collect = async {
        let mut segments = BufReader::new(stdout).split(b'\n');
        let mut output = String::new();
        while let Some(segment) = segments.next_segment().await.map_err(|error| {
            AppError::Internal(format!("failed to read output of {command:?}: {error}"))
        })? {
            // Tool output is not guaranteed to be UTF-8.
            let segment = segment.strip_suffix(b"\r").unwrap_or(&segment);
            let line = String::from_utf8_lossy(segment);
            on_line(&line);
            output.push_str(&line);
            output.push('\n');
        }

        let status = child.wait().await.map_err(|error| {
            AppError::Internal(format!("failed to wait for {command:?}: {error}"))
        })?;

        Ok(ShellOutput {
            exit_code: status.code(),
            output,
        })
    };

    tokio::time::timeout(timeout, collect).await.map_err(|_| {
        AppError::Execution(format!(
            "running {command:?} timed out after {}s",
            timeout.as_secs()
        ))
    })?
}
