//! Subprocess seam used by the adapters.
//!
//! Adapters build argument vectors and parse bytes; running the program is
//! behind [`ProcessRunner`] so tests can script provider output.

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::LogSourceError;

/// Runs a program to completion and returns its stdout.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, LogSourceError>;
}

/// [`ProcessRunner`] over `tokio::process`. The child is killed if the
/// future is dropped (fetch timeout).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, LogSourceError> {
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| LogSourceError::Unavailable {
                message: format!("spawn {program}: {err}"),
            })?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(error_from_stderr(program, output.status.code(), &stderr))
    }
}

/// Map a failed invocation to a normalized error.
pub fn error_from_stderr(program: &str, code: Option<i32>, stderr: &str) -> LogSourceError {
    let message = stderr.trim();
    let lower = message.to_ascii_lowercase();
    if lower.contains("no such container") || lower.contains("not found") {
        return LogSourceError::NotFound {
            target: message.to_owned(),
        };
    }
    let code = code.map_or_else(|| "signal".to_owned(), |c| c.to_string());
    if message.is_empty() {
        return LogSourceError::Unavailable {
            message: format!("{program} exited with {code}"),
        };
    }
    LogSourceError::Unavailable {
        message: format!("{program} exited with {code}: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::error_from_stderr;
    use crate::error::LogSourceError;

    #[test]
    fn missing_container_maps_to_not_found() {
        let err = error_from_stderr(
            "curl",
            Some(22),
            "Error: No such container: web\n",
        );
        assert!(matches!(err, LogSourceError::NotFound { .. }), "{err:?}");
    }

    #[test]
    fn empty_stderr_reports_exit_code() {
        let err = error_from_stderr("journalctl", Some(1), "  ");
        assert_eq!(
            err,
            LogSourceError::Unavailable {
                message: "journalctl exited with 1".into()
            }
        );
    }
}
