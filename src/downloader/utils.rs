// Subprocess helpers for provider implementations

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};
use tracing::warn;

use super::errors::DownloadError;

/// Run command to completion with timeout, capturing stdout and stderr
pub async fn run_output_with_timeout(
    program: &str,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        DownloadError::Internal(format!("Failed to capture stdout from {}", program))
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        DownloadError::Internal(format!("Failed to capture stderr from {}", program))
    })?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status) => {
            let status = status?;
            let stdout = join_reader(stdout_task).await?;
            let stderr = join_reader(stderr_task).await?;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            warn!(program, timeout_secs, "process timed out");
            Err(DownloadError::Provider(format!("Timed out after {}s", timeout_secs)))
        }
    }
}

async fn join_reader(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::Internal(format!("reader task failed: {}", e)))?
        .map_err(DownloadError::from)
}

/// Run command, handing each stdout line to `on_line` as it arrives.
///
/// Returns the exit status and everything written to stderr.
pub async fn run_streaming_lines<F>(
    program: &str,
    args: &[String],
    mut on_line: F,
) -> Result<(ExitStatus, String), DownloadError>
where
    F: FnMut(&str) + Send,
{
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child.stdout.take().ok_or_else(|| {
        DownloadError::Internal(format!("Failed to capture stdout from {}", program))
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        DownloadError::Internal(format!("Failed to capture stderr from {}", program))
    })?;

    let stderr_task = tokio::spawn(async move {
        let mut stderr = stderr;
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).trim_end().to_string()
    });

    // Lines are decoded lossily: file paths echoed by the child need not be UTF-8
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        on_line(line.trim_end_matches(['\n', '\r']));
    }

    let status = child.wait().await?;
    let stderr_output = stderr_task.await.unwrap_or_default();
    Ok((status, stderr_output))
}

/// Last meaningful stderr lines, for error messages
pub fn summarize_stderr(stderr: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:"))
        .take(2)
        .collect();

    if !errors.is_empty() {
        return errors.join(" | ");
    }

    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_prefers_error_lines() {
        let stderr = "WARNING: something\nERROR: [youtube] abc: Video unavailable\nmore";
        assert_eq!(
            summarize_stderr(stderr),
            "ERROR: [youtube] abc: Video unavailable"
        );
    }

    #[test]
    fn test_summarize_falls_back_to_last_line() {
        assert_eq!(summarize_stderr("first\nlast one\n\n"), "last one");
        assert_eq!(summarize_stderr(""), "Unknown error");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_streaming_lines_and_stderr() {
        let args = vec![
            "-c".to_string(),
            "echo one; echo two; echo oops >&2; exit 3".to_string(),
        ];
        let mut seen = Vec::new();
        let (status, stderr) = run_streaming_lines("sh", &args, |l| seen.push(l.to_string()))
            .await
            .unwrap();
        assert_eq!(seen, vec!["one", "two"]);
        assert_eq!(stderr, "oops");
        assert_eq!(status.code(), Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_streaming_lines_survive_invalid_utf8() {
        let args = vec!["-c".to_string(), "printf 'a\\n\\377\\nb\\r\\nc'; exit 0".to_string()];
        let mut seen = Vec::new();
        let (status, _) = run_streaming_lines("sh", &args, |l| seen.push(l.to_string()))
            .await
            .unwrap();
        assert!(status.success());
        assert_eq!(seen, vec!["a", "\u{FFFD}", "b", "c"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_timeout() {
        let args = vec!["-c".to_string(), "sleep 5".to_string()];
        let err = run_output_with_timeout("sh", &args, 1).await.unwrap_err();
        assert!(matches!(err, DownloadError::Provider(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let err = run_output_with_timeout("definitely-not-a-real-binary-xyz", &[], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Io(_)));
    }
}
