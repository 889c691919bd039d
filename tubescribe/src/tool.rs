//! Shared plumbing for running the external tools (yt-dlp, ffmpeg).

use std::fmt;
use std::process::Output;
use std::time::Duration;

use tokio::process::Command;

/// Why a tool invocation never produced an exit status.
#[derive(Debug)]
pub(crate) enum ToolFailure {
    /// The binary is not on PATH.
    NotFound,
    /// Spawn error or timeout, with detail.
    Other(String),
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolFailure::NotFound => f.write_str("tool not found"),
            ToolFailure::Other(detail) => f.write_str(detail),
        }
    }
}

/// Run a child process to completion, bounded by `timeout`.
///
/// A non-zero exit is returned as `Ok` and left for the caller to interpret
/// per stage; `Err` means the process never ran to completion at all.
pub(crate) async fn run(
    tool: &'static str,
    cmd: &mut Command,
    timeout: Duration,
) -> std::result::Result<Output, ToolFailure> {
    // Reap the child if the timeout fires and the future is dropped.
    cmd.kill_on_drop(true);

    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(ToolFailure::NotFound),
        Ok(Err(e)) => Err(ToolFailure::Other(format!("failed to run {tool}: {e}"))),
        Err(_) => Err(ToolFailure::Other(format!(
            "{tool} timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

/// Truncated stderr for error messages — external tools can dump huge logs.
pub(crate) fn stderr_snippet(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .chars()
        .take(1000)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_output() {
        let output = run("true", &mut Command::new("true"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.status.success());
    }

    #[tokio::test]
    async fn test_run_missing_binary_is_not_found() {
        let err = run(
            "missing",
            &mut Command::new("tubescribe-no-such-binary"),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolFailure::NotFound));
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = run("sleep", &mut cmd, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
