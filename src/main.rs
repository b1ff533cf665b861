//! rsync-progress CLI - rsync with a cumulative progress report

use clap::Parser;
use rsync_progress::config::{CliArgs, Commands, CopyConfig};
use rsync_progress::core::{CopyReport, RsyncCopier};
use rsync_progress::error::{Result, RsyncError};
use rsync_progress::progress::{summary_line, ProgressReporter, ReportFormat};
use rsync_progress::system::{check_environment, check_local, check_remote};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Handle result
    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        let code = match e {
            RsyncError::Cancelled => 130,
            _ => 1,
        };
        std::process::exit(code);
    }
}

async fn run(args: CliArgs) -> Result<()> {
    // Handle subcommands
    if let Some(command) = &args.command {
        return handle_command(command, &args).await;
    }

    // Build configuration
    let config = CopyConfig::from_cli(&args)?;

    // Print configuration if verbose
    if args.verbose > 0 && config.format == ReportFormat::Bar {
        print_config(&config);
    }

    if !config.skip_checks {
        check_environment(
            &config.options.program,
            config.ssh.as_ref(),
            Path::new(&config.destination),
        )
        .await?;
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping rsync");
            signal_cancel.cancel();
        }
    });

    let report = run_copy(&config, cancel).await?;

    // Print results
    match config.format {
        ReportFormat::Bar => report.print_summary(),
        ReportFormat::Json => match serde_json::to_string(&report) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!("Could not serialize report: {}", e),
        },
        ReportFormat::Quiet => {}
    }

    Ok(())
}

async fn run_copy(config: &CopyConfig, cancel: CancellationToken) -> Result<CopyReport> {
    let mut copier = RsyncCopier::new(config.options.clone()).with_cancellation(cancel);
    let tracker = copier.tracker();
    let mut reporter = ProgressReporter::new(config.format);
    let mut ticker = tokio::time::interval(config.interval);

    let copy = copier.copy(&config.destination, config.sources.as_slice());
    tokio::pin!(copy);

    let result = loop {
        tokio::select! {
            result = &mut copy => break result,
            _ = ticker.tick() => reporter.update(&tracker.snapshot()),
        }
    };

    let snapshot = tracker.snapshot();
    match &result {
        Ok(_) => reporter.finish_success(&snapshot),
        Err(_) => {
            reporter.finish_error(&snapshot);
            if config.format == ReportFormat::Bar {
                eprintln!("Stopped at {}", summary_line(&snapshot));
            }
        }
    }

    result
}

async fn handle_command(command: &Commands, args: &CliArgs) -> Result<()> {
    match command {
        Commands::Check { target } => cmd_check(args, target).await,
    }
}

async fn cmd_check(args: &CliArgs, target: &Path) -> Result<()> {
    let ssh = args.ssh_target()?;

    let version = check_local(&args.rsync_path, ssh.as_ref()).await?;
    println!("Local rsync:  {} (ok)", version);

    if let Some(ssh) = &ssh {
        println!("Connection:   {} (ok)", ssh.host);
        check_remote(ssh, target).await?;
        println!("Remote rsync: ok");
        println!("Free space:   {} (ok)", target.display());
    }

    Ok(())
}

fn print_config(config: &CopyConfig) {
    println!("=== Configuration ===");
    println!("Sources:     {}", config.sources.join(", "));
    println!("Destination: {}", config.destination);
    println!("rsync:       {}", config.options.program);
    println!("Archive:     {}", config.options.archive);
    println!("Compress:    {}", config.options.compress);
    println!("Delete:      {}", config.options.delete);
    if !config.options.exclude.is_empty() {
        println!("Exclude:     {}", config.options.exclude.join(", "));
    }

    // Print remote config if present
    if let Some(ref ssh) = config.ssh {
        println!("\n=== Remote Configuration ===");
        match (&ssh.user, ssh.port) {
            (Some(user), Some(port)) => println!("Host:        {}@{}:{}", user, ssh.host, port),
            (Some(user), None) => println!("Host:        {}@{}", user, ssh.host),
            (None, Some(port)) => println!("Host:        {}:{}", ssh.host, port),
            (None, None) => println!("Host:        {}", ssh.host),
        }
        println!("Password:    {}", if ssh.uses_password() { "yes (sshpass)" } else { "no" });
    }

    println!();
}
