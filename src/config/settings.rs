//! Configuration settings for rsync-progress
//!
//! Defines the CLI arguments and the copy configuration they resolve to.

use crate::command::RsyncOptions;
use crate::error::{Result, RsyncError};
use crate::network::SshTarget;
use crate::progress::ReportFormat;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default refresh interval of the progress display
pub const DEFAULT_INTERVAL_MS: u64 = 200;

/// rsync-progress - rsync with a live, cumulative progress report
#[derive(Parser, Debug, Clone)]
#[command(name = "rsync-progress")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run rsync with a cumulative progress report")]
#[command(long_about = r#"
rsync-progress runs rsync twice: a dry run with --stats to learn how much
data the copy covers, then the real transfer with --partial. Progress is
reported across both runs, so a resumed transfer starts at the share that
is already in place.

Examples:
  rsync-progress /data/in /data/out                      # Local copy
  rsync-progress a b --host ops@tms:2200 /srv/backup     # Copy to a remote host
  rsync-progress /data/in /data/out --format json        # JSON progress lines
  rsync-progress --host tms check --target /srv/backup   # Only run the checks
"#)]
pub struct CliArgs {
    /// Source paths followed by the destination
    #[arg(value_name = "PATH")]
    pub paths: Vec<String>,

    /// Remote host for the destination ([user@]host[:port])
    #[arg(long, value_name = "TARGET")]
    pub host: Option<String>,

    /// SSH password (uses sshpass)
    #[arg(long, env = "RSYNC_PROGRESS_SSH_PASSWORD", hide_env_values = true)]
    pub ssh_password: Option<String>,

    /// SSH private key path
    #[arg(long, value_name = "PATH")]
    pub ssh_key: Option<PathBuf>,

    /// SSH config file
    #[arg(long, value_name = "PATH")]
    pub ssh_config: Option<PathBuf>,

    /// Extra ssh -o option (repeatable)
    #[arg(long, value_name = "OPTION")]
    pub ssh_option: Vec<String>,

    /// Delete extraneous files from the destination
    #[arg(long)]
    pub delete: bool,

    /// Do not pass --archive
    #[arg(long)]
    pub no_archive: bool,

    /// Do not pass --compress
    #[arg(long)]
    pub no_compress: bool,

    /// Pass --verbose to rsync
    #[arg(long)]
    pub rsync_verbose: bool,

    /// Exclude pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Extra raw rsync argument (repeatable)
    #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
    pub rsync_arg: Vec<String>,

    /// rsync program to run
    #[arg(long, default_value = "rsync", value_name = "PATH")]
    pub rsync_path: String,

    /// Skip the environment checks
    #[arg(long)]
    pub skip_checks: bool,

    /// Progress output format
    #[arg(long, value_enum, default_value = "bar")]
    pub format: ReportFormat,

    /// Progress refresh interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_INTERVAL_MS, value_name = "MS")]
    pub interval_ms: u64,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the environment checks without copying
    #[command(name = "check")]
    Check {
        /// Remote path whose free space is checked
        #[arg(long, default_value = ".")]
        target: PathBuf,
    },
}

impl CliArgs {
    /// Log filter for the `-v` count, used when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// ssh target built from the `--host` and `--ssh-*` options
    pub fn ssh_target(&self) -> Result<Option<SshTarget>> {
        let Some(host) = &self.host else {
            return Ok(None);
        };

        let mut target = SshTarget::parse(host)?;
        if target.host.is_empty() {
            return Err(RsyncError::NoRemoteHost);
        }
        if let Some(password) = &self.ssh_password {
            target = target.with_password(password.as_str());
        }
        if let Some(key) = &self.ssh_key {
            target = target.with_key_file(key);
        }
        target.config_file = self.ssh_config.clone();
        target.options = self.ssh_option.clone();

        Ok(Some(target))
    }
}

/// Configuration of a single copy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// rsync options shared by both runs
    pub options: RsyncOptions,
    /// Remote destination host, if any
    pub ssh: Option<SshTarget>,
    /// Paths to copy
    pub sources: Vec<String>,
    /// Destination path (on the remote host when `ssh` is set)
    pub destination: String,
    /// Progress output format
    pub format: ReportFormat,
    /// Progress refresh interval
    pub interval: Duration,
    /// Skip the environment checks
    pub skip_checks: bool,
}

impl CopyConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let (destination, sources) = match args.paths.split_last() {
            None => return Err(RsyncError::NoSource),
            Some((_, [])) => return Err(RsyncError::NoDestination),
            Some((destination, sources)) => (destination.clone(), sources.to_vec()),
        };

        if args.interval_ms == 0 {
            return Err(RsyncError::config("interval must be greater than zero"));
        }

        let ssh = args.ssh_target()?;
        let mut options = RsyncOptions {
            program: args.rsync_path.clone(),
            archive: !args.no_archive,
            delete: args.delete,
            compress: !args.no_compress,
            verbose: args.rsync_verbose,
            exclude: args.exclude.clone(),
            additional: args.rsync_arg.clone(),
            ..Default::default()
        };
        if let Some(ssh) = &ssh {
            options = options.with_ssh(ssh);
        }

        Ok(Self {
            options,
            ssh,
            sources,
            destination,
            format: args.format,
            interval: Duration::from_millis(args.interval_ms),
            skip_checks: args.skip_checks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("rsync-progress").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_local_copy_config() {
        let config = CopyConfig::from_cli(&parse(&["/a/b", "/a/c", "/dst"])).unwrap();
        assert_eq!(config.sources, vec!["/a/b", "/a/c"]);
        assert_eq!(config.destination, "/dst");
        assert!(config.ssh.is_none());
        assert!(config.options.archive && config.options.compress);
        assert_eq!(config.options.program, "rsync");
        assert_eq!(config.format, ReportFormat::Bar);
        assert_eq!(config.interval, Duration::from_millis(DEFAULT_INTERVAL_MS));
    }

    #[test]
    fn test_missing_paths() {
        assert!(matches!(CopyConfig::from_cli(&parse(&[])), Err(RsyncError::NoSource)));
        assert!(matches!(CopyConfig::from_cli(&parse(&["/a"])), Err(RsyncError::NoDestination)));
    }

    #[test]
    fn test_rsync_flags() {
        let args = parse(&[
            "--delete", "--no-archive", "--no-compress", "--rsync-verbose",
            "--exclude", "*.tmp", "--exclude", ".git",
            "--rsync-arg", "--bwlimit=1000", "--rsync-path", "/opt/rsync",
            "--format", "json", "--interval-ms", "500", "--skip-checks",
            "/src", "/dst",
        ]);
        let config = CopyConfig::from_cli(&args).unwrap();

        assert!(config.options.delete && config.options.verbose);
        assert!(!config.options.archive && !config.options.compress);
        assert_eq!(config.options.exclude, vec!["*.tmp", ".git"]);
        assert_eq!(config.options.additional, vec!["--bwlimit=1000"]);
        assert_eq!(config.options.program, "/opt/rsync");
        assert_eq!(config.format, ReportFormat::Json);
        assert_eq!(config.interval, Duration::from_millis(500));
        assert!(config.skip_checks);
    }

    #[test]
    fn test_remote_config() {
        let args = parse(&[
            "--host", "ops@tms:2200", "--ssh-password", "pw",
            "--ssh-key", "/keys/id", "--ssh-option", "StrictHostKeyChecking=no",
            "/src", "/srv/backup",
        ]);
        let config = CopyConfig::from_cli(&args).unwrap();
        let ssh = config.ssh.as_ref().unwrap();

        assert_eq!(ssh.host, "tms");
        assert_eq!(ssh.user.as_deref(), Some("ops"));
        assert_eq!(ssh.port, Some(2200));
        assert!(ssh.uses_password());
        assert_eq!(ssh.options, vec!["StrictHostKeyChecking=no"]);
        assert_eq!(config.options.remote_host.as_deref(), Some("tms"));
        assert_eq!(config.options.remote_shell, Some(ssh.remote_shell()));
    }

    #[test]
    fn test_invalid_host() {
        let bad_port = parse(&["--host", "tms:ssh", "/src", "/dst"]);
        assert!(matches!(CopyConfig::from_cli(&bad_port), Err(RsyncError::InvalidSshPort(_))));

        let no_host = parse(&["--host", "ops@", "/src", "/dst"]);
        assert!(matches!(CopyConfig::from_cli(&no_host), Err(RsyncError::NoRemoteHost)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let args = parse(&["--interval-ms", "0", "/src", "/dst"]);
        assert!(matches!(CopyConfig::from_cli(&args), Err(RsyncError::ConfigError(_))));
    }

    #[test]
    fn test_check_subcommand() {
        let args = parse(&["--host", "tms", "-v", "check", "--target", "/srv"]);
        match &args.command {
            Some(Commands::Check { target }) => assert_eq!(*target, PathBuf::from("/srv")),
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(args.log_filter(), "info");
        assert!(args.ssh_target().unwrap().is_some());
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(parse(&[]).log_filter(), "warn");
        assert_eq!(parse(&["-vvv"]).log_filter(), "trace");
    }
}
