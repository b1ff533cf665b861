//! Remote shell (ssh) command assembly
//!
//! rsync reaches the remote side through `--rsh`, so the ssh invocation is
//! rendered twice: as an argv for running commands directly (pre-flight
//! checks) and as a quoted shell string for rsync.

use crate::error::{Result, RsyncError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// An ssh destination plus the options needed to reach it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshTarget {
    /// ssh config file (`-F`)
    pub config_file: Option<PathBuf>,
    /// Remote host name or address
    pub host: String,
    /// Login user (`-l`)
    pub user: Option<String>,
    /// Port (`-p`)
    pub port: Option<u16>,
    /// Password, fed through `sshpass`
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Identity file (`-i`)
    pub key_file: Option<PathBuf>,
    /// Raw `-o` options
    pub options: Vec<String>,
}

impl SshTarget {
    /// Parse a `[user@]hostname[:port]` target
    pub fn parse(target: &str) -> Result<Self> {
        let (user, rest) = match target.split_once('@') {
            Some((user, rest)) => (Some(user.to_string()), rest),
            None => (None, target),
        };

        let (host, port) = match rest.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| RsyncError::InvalidSshPort(port.to_string()))?;
                (host, Some(port))
            }
            None => (rest, None),
        };

        Ok(Self {
            host: host.to_string(),
            user: user.filter(|u| !u.is_empty()),
            port,
            ..Default::default()
        })
    }

    /// Set the password used through `sshpass`
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = (!password.is_empty()).then_some(password);
        self
    }

    /// Set the identity file
    pub fn with_key_file(mut self, key_file: impl Into<PathBuf>) -> Self {
        self.key_file = Some(key_file.into());
        self
    }

    /// Whether password authentication (and therefore `sshpass`) is used
    pub fn uses_password(&self) -> bool {
        self.password.is_some()
    }

    /// ssh program and connection options, without host or remote command
    fn base_command(&self) -> Vec<String> {
        let mut cmd = Vec::new();
        if let Some(password) = &self.password {
            cmd.extend(["sshpass".to_string(), "-p".to_string(), password.clone()]);
        }
        cmd.push("ssh".to_string());
        cmd.push("-T".to_string());

        if let Some(config_file) = &self.config_file {
            cmd.push("-F".to_string());
            cmd.push(config_file.display().to_string());
        }
        if let Some(user) = &self.user {
            cmd.push("-l".to_string());
            cmd.push(user.clone());
        }
        if let Some(port) = self.port {
            cmd.push("-p".to_string());
            cmd.push(port.to_string());
        }
        if let Some(key_file) = &self.key_file {
            cmd.push("-i".to_string());
            cmd.push(key_file.display().to_string());
        }
        for option in &self.options {
            cmd.push("-o".to_string());
            cmd.push(option.clone());
        }

        cmd
    }

    /// Full argv running `args` on the remote host
    pub fn command<S: AsRef<str>>(&self, args: &[S]) -> Vec<String> {
        let mut cmd = self.base_command();
        if !self.host.is_empty() {
            cmd.push(self.host.clone());
        }
        cmd.extend(args.iter().map(|a| a.as_ref().to_string()));
        cmd
    }

    /// The ssh invocation as a single quoted string for rsync's `--rsh`
    ///
    /// rsync appends the host itself, so the host is left out.
    pub fn remote_shell(&self) -> String {
        self.base_command()
            .iter()
            .map(|word| shell_quote(word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run `args` on the remote host and return its stdout
    pub async fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
        if args.is_empty() {
            return Err(RsyncError::EmptyCommand);
        }
        if self.host.is_empty() {
            return Err(RsyncError::NoRemoteHost);
        }

        let argv = self.command(args);
        tracing::info!("exec: {}", redact(&argv).join(" "));

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RsyncError::connection(&self.host, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RsyncError::connection(&self.host, stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Single-quote a word for a POSIX shell
pub(crate) fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Hide the `sshpass -p` password before logging an argv
pub fn redact(argv: &[String]) -> Vec<String> {
    let mut out = argv.to_vec();
    if out.first().map(String::as_str) == Some("sshpass") && out.get(1).map(String::as_str) == Some("-p") {
        if let Some(password) = out.get_mut(2) {
            *password = "****".to_string();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        let target = SshTarget::parse("root@tms:2222").unwrap();
        assert_eq!(target.user.as_deref(), Some("root"));
        assert_eq!(target.host, "tms");
        assert_eq!(target.port, Some(2222));

        let bare = SshTarget::parse("10.0.0.5").unwrap();
        assert_eq!(bare.user, None);
        assert_eq!(bare.host, "10.0.0.5");
        assert_eq!(bare.port, None);
    }

    #[test]
    fn test_parse_invalid_port() {
        assert!(matches!(
            SshTarget::parse("tms:ssh"),
            Err(RsyncError::InvalidSshPort(p)) if p == "ssh"
        ));
    }

    #[test]
    fn test_command_layout() {
        let mut target = SshTarget::parse("admin@tms:22").unwrap().with_key_file("/keys/id");
        target.options.push("StrictHostKeyChecking=no".to_string());

        assert_eq!(
            target.command(&["rsync", "--version"]),
            vec![
                "ssh", "-T", "-l", "admin", "-p", "22", "-i", "/keys/id",
                "-o", "StrictHostKeyChecking=no", "tms", "rsync", "--version",
            ]
        );
    }

    #[test]
    fn test_password_uses_sshpass() {
        let target = SshTarget::parse("tms").unwrap().with_password("s3cret");
        let cmd = target.command::<&str>(&[]);
        assert_eq!(&cmd[..5], &["sshpass", "-p", "s3cret", "ssh", "-T"]);
        assert_eq!(redact(&cmd)[2], "****");

        let no_password = SshTarget::parse("tms").unwrap().with_password("");
        assert!(!no_password.uses_password());
    }

    #[test]
    fn test_remote_shell_quoting() {
        let target = SshTarget::parse("ops@tms:2200").unwrap();
        assert_eq!(target.remote_shell(), "'ssh' '-T' '-l' 'ops' '-p' '2200'");

        let quoted = SshTarget::parse("tms").unwrap().with_password("it's");
        assert!(quoted.remote_shell().starts_with(r"'sshpass' '-p' 'it'\''s' 'ssh'"));
    }

    #[tokio::test]
    async fn test_run_requires_command_and_host() {
        let target = SshTarget::default();
        assert!(matches!(target.run::<&str>(&[]).await, Err(RsyncError::EmptyCommand)));
        assert!(matches!(target.run(&["true"]).await, Err(RsyncError::NoRemoteHost)));
    }
}
