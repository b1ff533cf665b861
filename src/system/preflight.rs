//! Pre-flight environment checks
//!
//! Verifies, before any transfer starts, that the local tools exist and
//! are recent enough, that the remote host is reachable, and that it has
//! rsync and some free space at the target path.

use crate::error::{Result, RsyncError};
use crate::network::{shell_quote, SshTarget};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Oldest rsync that understands `--info=progress2`
pub const MIN_RSYNC_VERSION: RsyncVersion = RsyncVersion {
    major: 3,
    minor: 1,
    patch: 0,
};

/// Free space the remote target must have, in KiB
pub const MIN_FREE_SPACE_KIB: u64 = 10 * 1024;

static VERSION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"rsync\s+version\s+v?(\d+)\.(\d+)(?:\.(\d+))?").expect("valid version pattern")
});

/// An rsync release number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RsyncVersion {
    /// Major release
    pub major: u32,
    /// Minor release
    pub minor: u32,
    /// Patch level, 0 when absent
    pub patch: u32,
}

impl fmt::Display for RsyncVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Extract the version from `rsync --version` output
pub fn parse_rsync_version(output: &str) -> Option<RsyncVersion> {
    let caps = VERSION_LINE.captures(output)?;
    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    Some(RsyncVersion {
        major: number(1)?,
        minor: number(2)?,
        patch: number(3).unwrap_or(0),
    })
}

/// Extract the "Available" column from `df -Pk` output
pub fn parse_df_available_kib(output: &str) -> Option<u64> {
    output
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .last()?
        .split_whitespace()
        .nth(3)?
        .parse()
        .ok()
}

/// Run a local program and return its stdout, or `None` if it failed
async fn probe(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            tracing::debug!("{} exited with {}", program, output.status);
            None
        }
        Err(e) => {
            tracing::debug!("{} could not be run: {}", program, e);
            None
        }
    }
}

/// Check the local tools and, when remote, connectivity
pub async fn check_local(rsync: &str, ssh: Option<&SshTarget>) -> Result<RsyncVersion> {
    if ssh.is_some_and(SshTarget::uses_password) && probe("sshpass", &["-V"]).await.is_none() {
        return Err(RsyncError::SshpassNotFound);
    }

    let output = probe(rsync, &["--version"])
        .await
        .ok_or(RsyncError::RsyncNotFound)?;
    let version = parse_rsync_version(&output).ok_or(RsyncError::RsyncNotFound)?;
    if version < MIN_RSYNC_VERSION {
        return Err(RsyncError::RsyncVersionTooOld {
            found: version.to_string(),
            required: MIN_RSYNC_VERSION.to_string(),
        });
    }
    tracing::debug!("Local rsync {}", version);

    if let Some(ssh) = ssh {
        ssh.run(&["true"]).await?;
        tracing::debug!("Connected to {}", ssh.host);
    }

    Ok(version)
}

/// Check rsync and free space on the remote host
pub async fn check_remote(ssh: &SshTarget, target_path: &Path) -> Result<()> {
    if let Err(e) = ssh.run(&["rsync", "--version"]).await {
        tracing::debug!("Remote rsync probe failed: {}", e);
        return Err(RsyncError::RemoteRsyncNotFound {
            host: ssh.host.clone(),
        });
    }

    let path = shell_quote(&target_path.display().to_string());
    let df = ssh.run(&["df", "-Pk", path.as_str()]).await;
    check_free_space(&ssh.host, target_path, df)
}

/// Judge the outcome of a remote `df -Pk`
///
/// Only a readable figure below [`MIN_FREE_SPACE_KIB`] fails. A target
/// that does not exist yet makes `df` fail, and rsync creates it.
pub fn check_free_space(host: &str, target_path: &Path, df: Result<String>) -> Result<()> {
    let output = match df {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("Could not read free space on {}: {}", host, e);
            return Ok(());
        }
    };

    match parse_df_available_kib(&output) {
        Some(available_kib) if available_kib < MIN_FREE_SPACE_KIB => {
            Err(RsyncError::InsufficientSpace {
                host: host.to_string(),
                path: target_path.to_path_buf(),
                available_kib,
                required_kib: MIN_FREE_SPACE_KIB,
            })
        }
        Some(available_kib) => {
            tracing::debug!("{} KiB free on {}", available_kib, host);
            Ok(())
        }
        None => {
            tracing::warn!("Could not read free space on {}", host);
            Ok(())
        }
    }
}

/// Run every check that applies to the copy
pub async fn check_environment(
    rsync: &str,
    ssh: Option<&SshTarget>,
    target_path: &Path,
) -> Result<()> {
    check_local(rsync, ssh).await?;
    if let Some(ssh) = ssh {
        check_remote(ssh, target_path).await?;
    }
    Ok(())
}
