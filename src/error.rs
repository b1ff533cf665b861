//! Error types for rsync-progress
//!
//! Errors fall into three groups: environment problems found by the
//! pre-flight checks, validation problems in the requested options, and
//! execution failures of the rsync subprocess. Output parsing never
//! produces an error; unparseable text simply yields no update.

use crate::command::Phase;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for rsync-progress operations
#[derive(Error, Debug)]
pub enum RsyncError {
    /// `sshpass` is required for password authentication but missing
    #[error("sshpass is not installed (required for password authentication)")]
    SshpassNotFound,

    /// Local rsync binary missing
    #[error("rsync is not installed")]
    RsyncNotFound,

    /// Local rsync is older than the supported minimum
    #[error("rsync {found} is too old, version {required} or newer is required")]
    RsyncVersionTooOld {
        /// Installed version
        found: String,
        /// Minimum supported version
        required: String,
    },

    /// Remote side has no rsync
    #[error("rsync is not installed on '{host}'")]
    RemoteRsyncNotFound {
        /// Remote host
        host: String,
    },

    /// Remote side lacks free space at the target path
    #[error("Insufficient free space on '{host}' at '{path}': {available_kib} KiB available, {required_kib} KiB required")]
    InsufficientSpace {
        /// Remote host
        host: String,
        /// Target path that was checked
        path: PathBuf,
        /// Free space reported by `df`
        available_kib: u64,
        /// Free space required
        required_kib: u64,
    },

    /// Remote shell connection failed
    #[error("Connection error to '{host}': {message}")]
    ConnectionError {
        /// Remote host
        host: String,
        /// ssh error output
        message: String,
    },

    /// No source path given
    #[error("no source given")]
    NoSource,

    /// No destination path given
    #[error("no destination given")]
    NoDestination,

    /// Remote shell configured without a host
    #[error("no remote host given")]
    NoRemoteHost,

    /// Attempted to launch an empty argv
    #[error("no command given")]
    EmptyCommand,

    /// Malformed port in an ssh target
    #[error("invalid SSH port: {0}")]
    InvalidSshPort(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The subprocess could not be started
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// I/O error while supervising the subprocess
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The subprocess exited unsuccessfully
    #[error("rsync {phase} run failed ({}): {stderr}", exit_description(.code))]
    ProcessFailed {
        /// Run that failed
        phase: Phase,
        /// Exit code; `None` when killed by a signal
        code: Option<i32>,
        /// Last lines of the captured stderr
        stderr: String,
    },

    /// Operation cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,
}

/// Broad classification of an [`RsyncError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing tools, old versions, unreachable or full remote
    Environment,
    /// Malformed option combinations, detected before anything runs
    Validation,
    /// Subprocess launch or exit failures
    Execution,
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl RsyncError {
    /// Create a spawn error for `program`
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Create a connection error
    pub fn connection(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionError {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SshpassNotFound
            | Self::RsyncNotFound
            | Self::RsyncVersionTooOld { .. }
            | Self::RemoteRsyncNotFound { .. }
            | Self::InsufficientSpace { .. }
            | Self::ConnectionError { .. } => ErrorCategory::Environment,
            Self::NoSource
            | Self::NoDestination
            | Self::NoRemoteHost
            | Self::EmptyCommand
            | Self::InvalidSshPort(_)
            | Self::ConfigError(_) => ErrorCategory::Validation,
            Self::Spawn { .. } | Self::Io(_) | Self::ProcessFailed { .. } | Self::Cancelled => {
                ErrorCategory::Execution
            }
        }
    }

    /// Check if this error was raised before any subprocess ran
    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    /// Check if this error comes from the environment checks
    pub fn is_environment(&self) -> bool {
        self.category() == ErrorCategory::Environment
    }

    /// Exit code of the failed subprocess, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ProcessFailed { code, .. } => *code,
            _ => None,
        }
    }
}

/// Result type alias for rsync-progress operations
pub type Result<T> = std::result::Result<T, RsyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(RsyncError::RsyncNotFound.category(), ErrorCategory::Environment);
        assert_eq!(RsyncError::NoRemoteHost.category(), ErrorCategory::Validation);
        assert_eq!(RsyncError::Cancelled.category(), ErrorCategory::Execution);
        assert!(RsyncError::NoSource.is_validation());
        assert!(RsyncError::connection("tms", "refused").is_environment());
    }

    #[test]
    fn test_process_failed_message() {
        let err = RsyncError::ProcessFailed {
            phase: Phase::Transfer,
            code: Some(23),
            stderr: "rsync: link_stat failed".to_string(),
        };
        assert_eq!(err.exit_code(), Some(23));
        assert_eq!(
            err.to_string(),
            "rsync transfer run failed (exit code 23): rsync: link_stat failed"
        );

        let killed = RsyncError::ProcessFailed {
            phase: Phase::Discovery,
            code: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_version_message() {
        let err = RsyncError::RsyncVersionTooOld {
            found: "3.0.9".to_string(),
            required: "3.1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "rsync 3.0.9 is too old, version 3.1 or newer is required"
        );
    }
}
