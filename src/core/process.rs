//! Subprocess launching
//!
//! The orchestrator only needs an argv in and, back, two live byte
//! streams plus a future resolving on exit. [`ProcessLauncher`] is that
//! seam; [`TokioLauncher`] is the real implementation.

use crate::error::{Result, RsyncError};
use futures::future::BoxFuture;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::Command;

/// A live output stream of a subprocess
pub type OutputStream = Pin<Box<dyn AsyncRead + Send>>;

/// How a subprocess ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
}

impl ExitOutcome {
    /// Outcome with the given exit code
    pub fn with_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Whether the process exited with code 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitOutcome {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// A started subprocess
///
/// Dropping `exit` before it resolves must stop the process.
pub struct SpawnedProcess {
    /// Standard output
    pub stdout: OutputStream,
    /// Standard error
    pub stderr: OutputStream,
    /// Resolves once the process has exited
    pub exit: BoxFuture<'static, io::Result<ExitOutcome>>,
}

/// Starts subprocesses for the orchestrator
pub trait ProcessLauncher: Send + Sync {
    /// Start `argv[0]` with the remaining arguments
    fn launch(&self, argv: &[String]) -> Result<SpawnedProcess>;
}

/// Launcher backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl ProcessLauncher for TokioLauncher {
    fn launch(&self, argv: &[String]) -> Result<SpawnedProcess> {
        let (program, args) = argv.split_first().ok_or(RsyncError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RsyncError::spawn(program.as_str(), e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            RsyncError::spawn(program.as_str(), io::Error::other("stdout not captured"))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            RsyncError::spawn(program.as_str(), io::Error::other("stderr not captured"))
        })?;

        tracing::debug!("Spawned {} (pid {:?})", program, child.id());

        Ok(SpawnedProcess {
            stdout: Box::pin(stdout),
            stderr: Box::pin(stderr),
            exit: Box::pin(async move { child.wait().await.map(ExitOutcome::from) }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_exit_outcome() {
        assert!(ExitOutcome::with_code(0).success());
        assert!(!ExitOutcome::with_code(23).success());
        assert!(!ExitOutcome { code: None }.success());
    }

    #[test]
    fn test_empty_argv_rejected() {
        assert!(matches!(TokioLauncher.launch(&[]), Err(RsyncError::EmptyCommand)));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let argv = vec!["/nonexistent/rsync-progress-test-binary".to_string()];
        match TokioLauncher.launch(&argv) {
            Err(RsyncError::Spawn { program, .. }) => assert_eq!(program, argv[0]),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_captures_streams() {
        let argv: Vec<String> = ["sh", "-c", "printf out; printf err >&2; exit 3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut process = TokioLauncher.launch(&argv).unwrap();

        let mut stdout = String::new();
        process.stdout.read_to_string(&mut stdout).await.unwrap();
        let mut stderr = String::new();
        process.stderr.read_to_string(&mut stderr).await.unwrap();
        let outcome = process.exit.await.unwrap();

        assert_eq!(stdout, "out");
        assert_eq!(stderr, "err");
        assert_eq!(outcome, ExitOutcome::with_code(3));
    }
}
