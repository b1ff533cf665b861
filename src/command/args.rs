//! rsync argument assembly
//!
//! The discovery and transfer runs share every option except the mode
//! flags: discovery adds `--dry-run --stats`, transfer adds `--partial`.
//! Which one applies is decided by the orchestrator through [`Phase`],
//! never by the caller's options.

use crate::error::{Result, RsyncError};
use crate::network::SshTarget;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two runs an invocation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Size discovery: simulate the transfer and print statistics
    Discovery,
    /// The real, data-moving transfer
    Transfer,
}

impl Phase {
    /// Flags that only this phase carries
    pub fn mode_flags(&self) -> &'static [&'static str] {
        match self {
            Phase::Discovery => &["--dry-run", "--stats"],
            Phase::Transfer => &["--partial"],
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Discovery => f.write_str("discovery"),
            Phase::Transfer => f.write_str("transfer"),
        }
    }
}

/// Options shared by both rsync runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsyncOptions {
    /// rsync executable name or path
    pub program: String,
    /// Archive mode (`--archive`)
    pub archive: bool,
    /// Delete extraneous files from destination directories
    pub delete: bool,
    /// Compress file data during the transfer
    pub compress: bool,
    /// Increase rsync's own verbosity
    pub verbose: bool,
    /// Emit whole-transfer progress lines; without it no percentage is available
    pub progress: bool,
    /// Exclusion patterns, passed in order
    pub exclude: Vec<String>,
    /// Remote shell command line for `--rsh`, e.g. `'ssh' '-T'`
    pub remote_shell: Option<String>,
    /// Host the destination lives on when a remote shell is set
    pub remote_host: Option<String>,
    /// Extra raw arguments appended before the paths
    pub additional: Vec<String>,
}

impl Default for RsyncOptions {
    fn default() -> Self {
        Self {
            program: "rsync".to_string(),
            archive: true,
            delete: false,
            compress: true,
            verbose: false,
            progress: true,
            exclude: Vec::new(),
            remote_shell: None,
            remote_host: None,
            additional: Vec::new(),
        }
    }
}

impl RsyncOptions {
    /// Route the transfer through `ssh`, targeting the ssh host
    pub fn with_ssh(mut self, ssh: &SshTarget) -> Self {
        self.remote_host = Some(ssh.host.clone());
        self.remote_shell = Some(ssh.remote_shell());
        self
    }

    /// Build the full argv (program first) for one phase
    ///
    /// Fails before anything is built when there is no source, the
    /// destination is empty, or a remote shell is set without a host.
    pub fn build_args<S: AsRef<str>>(
        &self,
        phase: Phase,
        destination: &str,
        sources: &[S],
    ) -> Result<Vec<String>> {
        if sources.is_empty() {
            return Err(RsyncError::NoSource);
        }
        if destination.is_empty() {
            return Err(RsyncError::NoDestination);
        }

        let mut args = vec![self.program.clone()];

        if self.archive {
            args.push("--archive".to_string());
        }
        if self.delete {
            args.push("--delete".to_string());
        }
        if self.compress {
            args.push("--compress".to_string());
        }
        if self.verbose {
            args.push("--verbose".to_string());
        }
        if self.progress {
            args.push("--info=progress2".to_string());
            args.push("--no-i-r".to_string());
        }

        args.extend(phase.mode_flags().iter().map(|flag| flag.to_string()));

        for pattern in &self.exclude {
            args.push("--exclude".to_string());
            args.push(pattern.clone());
        }

        let mut destination = destination.to_string();
        if let Some(shell) = self.remote_shell.as_deref().filter(|s| !s.is_empty()) {
            let host = self
                .remote_host
                .as_deref()
                .filter(|h| !h.is_empty())
                .ok_or(RsyncError::NoRemoteHost)?;
            args.push("--rsh".to_string());
            args.push(shell.to_string());
            destination = format!("{}:{}", host, destination);
        }

        args.extend(self.additional.iter().cloned());
        args.extend(sources.iter().map(|s| s.as_ref().to_string()));
        args.push(destination);

        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(args: &[String], flag: &str) -> Option<usize> {
        args.iter().position(|a| a == flag)
    }

    #[test]
    fn test_discovery_and_transfer_args() {
        let options = RsyncOptions::default();

        let discovery = options.build_args(Phase::Discovery, "/c", &["/a/b"]).unwrap();
        assert!(position(&discovery, "--dry-run").is_some());
        assert!(position(&discovery, "--stats").is_some());
        assert!(position(&discovery, "--partial").is_none());

        let transfer = options.build_args(Phase::Transfer, "/c", &["/a/b"]).unwrap();
        assert!(position(&transfer, "--partial").is_some());
        assert!(position(&transfer, "--dry-run").is_none());
        assert!(position(&transfer, "--stats").is_none());

        for args in [&discovery, &transfer] {
            assert!(position(args, "/a/b").unwrap() < position(args, "/c").unwrap());
            assert_eq!(args.last().unwrap(), "/c");
        }
    }

    #[test]
    fn test_default_flag_order() {
        let args = RsyncOptions::default()
            .build_args(Phase::Discovery, "/dst", &["/src"])
            .unwrap();
        assert_eq!(
            args,
            vec![
                "rsync",
                "--archive",
                "--compress",
                "--info=progress2",
                "--no-i-r",
                "--dry-run",
                "--stats",
                "/src",
                "/dst",
            ]
        );
    }

    #[test]
    fn test_missing_paths_rejected() {
        let options = RsyncOptions::default();
        let no_sources: [&str; 0] = [];
        assert!(matches!(
            options.build_args(Phase::Transfer, "/dst", &no_sources),
            Err(RsyncError::NoSource)
        ));
        assert!(matches!(
            options.build_args(Phase::Transfer, "", &["/src"]),
            Err(RsyncError::NoDestination)
        ));
    }

    #[test]
    fn test_remote_shell_requires_host() {
        let options = RsyncOptions {
            remote_shell: Some("'ssh' '-T'".to_string()),
            remote_host: None,
            ..Default::default()
        };
        assert!(matches!(
            options.build_args(Phase::Discovery, "/dst", &["/src"]),
            Err(RsyncError::NoRemoteHost)
        ));

        let empty_host = RsyncOptions {
            remote_host: Some(String::new()),
            ..options
        };
        assert!(matches!(
            empty_host.build_args(Phase::Discovery, "/dst", &["/src"]),
            Err(RsyncError::NoRemoteHost)
        ));
    }

    #[test]
    fn test_remote_destination_rewrite() {
        let options = RsyncOptions {
            remote_shell: Some("'ssh' '-T'".to_string()),
            remote_host: Some("tms".to_string()),
            additional: vec!["--bwlimit=1000".to_string()],
            ..Default::default()
        };
        let args = options.build_args(Phase::Transfer, "/data", &["/src"]).unwrap();

        let rsh = position(&args, "--rsh").unwrap();
        assert_eq!(args[rsh + 1], "'ssh' '-T'");
        assert_eq!(args.last().unwrap(), "tms:/data");
        assert!(position(&args, "--bwlimit=1000").unwrap() < position(&args, "/src").unwrap());
    }

    #[test]
    fn test_empty_remote_shell_is_local() {
        let options = RsyncOptions {
            remote_shell: Some(String::new()),
            ..Default::default()
        };
        let args = options.build_args(Phase::Transfer, "/data", &["/src"]).unwrap();
        assert!(position(&args, "--rsh").is_none());
        assert_eq!(args.last().unwrap(), "/data");
    }

    #[test]
    fn test_excludes_keep_order() {
        let options = RsyncOptions {
            exclude: vec!["*.tmp".to_string(), "cache/".to_string(), ".git".to_string()],
            ..Default::default()
        };
        let args = options.build_args(Phase::Transfer, "/dst", &["/src"]).unwrap();
        let values: Vec<&str> = args
            .windows(2)
            .filter(|pair| pair[0] == "--exclude")
            .map(|pair| pair[1].as_str())
            .collect();
        assert_eq!(values, vec!["*.tmp", "cache/", ".git"]);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Discovery.to_string(), "discovery");
        assert_eq!(Phase::Transfer.to_string(), "transfer");
    }
}
