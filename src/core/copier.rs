//! Two-phase rsync copy
//!
//! A copy runs rsync twice. The discovery run (`--dry-run --stats`)
//! reports how many bytes the transfer covers and how many of them still
//! need sending; the transfer run then reports raw progress for its own
//! work only. Offsetting the transfer's counts by the bytes already in
//! place keeps one continuous, cumulative percentage across both runs
//! and across resumed transfers.

use crate::command::{Phase, RsyncOptions};
use crate::core::process::{ExitOutcome, ProcessLauncher, SpawnedProcess, TokioLauncher};
use crate::core::scanner::{ScanSummary, StreamScanner};
use crate::error::{Result, RsyncError};
use crate::network::redact;
use crate::progress::{CapturedLog, CopyStatus, DiscoveryTotals, ProgressTracker, TransferState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Number of stderr lines quoted in a failure
const STDERR_TAIL_LINES: usize = 20;

/// One finished rsync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    /// Which run this was
    pub phase: Phase,
    /// Arguments the process ran with
    pub argv: Vec<String>,
    /// Exit code
    pub exit_code: Option<i32>,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

/// Result of a successful copy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyReport {
    /// Final progress, always 100%
    pub state: TransferState,
    /// Sizes learned in discovery
    pub totals: DiscoveryTotals,
    /// The dry run
    pub discovery: PhaseReport,
    /// The real transfer
    pub transfer: PhaseReport,
    /// When the copy started
    pub started_at: DateTime<Utc>,
    /// When the copy finished
    pub finished_at: DateTime<Utc>,
}

impl CopyReport {
    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Copy Summary ===");
        println!(
            "Total size:      {}",
            humansize::format_size(self.totals.total, humansize::BINARY)
        );
        println!(
            "Already present: {}",
            humansize::format_size(self.totals.partial(), humansize::BINARY)
        );
        println!("Discovery:       {} ms", self.discovery.duration_ms);
        println!("Transfer:        {} ms", self.transfer.duration_ms);
        if !self.state.throughput.is_empty() {
            println!("Last rate:       {}", self.state.throughput);
        }
    }
}

/// Drives rsync through discovery and transfer
pub struct RsyncCopier {
    /// Options shared by both runs
    options: RsyncOptions,
    /// Starts the rsync processes
    launcher: Arc<dyn ProcessLauncher>,
    /// Live state of the current copy
    tracker: ProgressTracker,
    /// Caller-controlled cancellation
    cancel: CancellationToken,
}

impl RsyncCopier {
    /// Create a copier that spawns real rsync processes
    pub fn new(options: RsyncOptions) -> Self {
        Self {
            options,
            launcher: Arc::new(TokioLauncher),
            tracker: ProgressTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a different process launcher
    pub fn with_launcher(mut self, launcher: impl ProcessLauncher + 'static) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    /// Use a caller-owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Options shared by both runs
    pub fn options(&self) -> &RsyncOptions {
        &self.options
    }

    /// Handle for polling progress from another task
    pub fn tracker(&self) -> ProgressTracker {
        self.tracker.clone()
    }

    /// Token that aborts the copy when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the copy in progress
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Captured output of both streams so far
    pub fn log(&self) -> CapturedLog {
        self.tracker.log()
    }

    /// Copy `sources` to `destination`.
    ///
    /// On success the tracker reads exactly 100%. On failure it keeps the
    /// last values observed and its status becomes `Failed` or `Cancelled`.
    pub async fn copy<S: AsRef<str>>(&mut self, destination: &str, sources: &[S]) -> Result<CopyReport> {
        self.tracker.reset();

        // Validate before anything is launched.
        if let Err(e) = self.options.build_args(Phase::Discovery, destination, sources) {
            self.tracker.set_status(CopyStatus::Failed);
            return Err(e);
        }

        let started_at = Utc::now();

        let result = self.run_phases(destination, sources).await;
        match result {
            Ok((discovery, transfer)) => {
                self.tracker.complete();
                let snapshot = self.tracker.snapshot();
                tracing::info!(
                    "Copy to {} complete: {} bytes",
                    destination,
                    snapshot.state.bytes_total
                );
                Ok(CopyReport {
                    state: snapshot.state,
                    totals: snapshot.totals,
                    discovery,
                    transfer,
                    started_at,
                    finished_at: Utc::now(),
                })
            }
            Err(e) => {
                let status = match e {
                    RsyncError::Cancelled => CopyStatus::Cancelled,
                    _ => CopyStatus::Failed,
                };
                self.tracker.set_status(status);
                Err(e)
            }
        }
    }

    async fn run_phases<S: AsRef<str>>(
        &self,
        destination: &str,
        sources: &[S],
    ) -> Result<(PhaseReport, PhaseReport)> {
        let discovery = self.run_phase(Phase::Discovery, destination, sources).await?;

        let totals = self.tracker.totals();
        if totals.total == 0 {
            tracing::warn!("Discovery reported no total size; progress will be unavailable");
        } else {
            tracing::debug!(
                "Discovered {} bytes, {} to transfer",
                totals.total,
                totals.transferred
            );
        }

        let transfer = self.run_phase(Phase::Transfer, destination, sources).await?;
        Ok((discovery, transfer))
    }

    async fn run_phase<S: AsRef<str>>(
        &self,
        phase: Phase,
        destination: &str,
        sources: &[S],
    ) -> Result<PhaseReport> {
        let argv = self.options.build_args(phase, destination, sources)?;
        if self.cancel.is_cancelled() {
            return Err(RsyncError::Cancelled);
        }
        tracing::info!("exec: {}", redact(&argv).join(" "));

        self.tracker.set_status(match phase {
            Phase::Discovery => CopyStatus::Discovering,
            Phase::Transfer => CopyStatus::Transferring,
        });

        let start = Instant::now();
        let SpawnedProcess { stdout, stderr, exit } = self.launcher.launch(&argv)?;

        let scan_cancel = self.cancel.child_token();
        let stdout_task = tokio::spawn(
            StreamScanner::stdout(self.tracker.clone()).scan(stdout, scan_cancel.clone()),
        );
        let stderr_task =
            tokio::spawn(StreamScanner::stderr(self.tracker.clone()).scan(stderr, scan_cancel));

        // Dropping `exit` on cancellation stops the process.
        let waited = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            outcome = exit => Some(outcome),
        };

        // Fold the tail of the output before judging the run.
        join_scanner("stdout", stdout_task).await;
        join_scanner("stderr", stderr_task).await;

        // Scanners may have stopped early, so a cancelled run is never judged.
        let outcome: ExitOutcome = match waited {
            Some(outcome) if !self.cancel.is_cancelled() => outcome?,
            _ => {
                tracing::info!("rsync {} run cancelled", phase);
                return Err(RsyncError::Cancelled);
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        if !outcome.success() {
            return Err(RsyncError::ProcessFailed {
                phase,
                code: outcome.code,
                stderr: self.tracker.stderr_tail(STDERR_TAIL_LINES),
            });
        }

        tracing::debug!("rsync {} run finished in {} ms", phase, duration_ms);

        Ok(PhaseReport {
            phase,
            argv,
            exit_code: outcome.code,
            duration_ms,
        })
    }
}

async fn join_scanner(stream: &str, task: JoinHandle<ScanSummary>) {
    if let Err(e) = task.await {
        tracing::warn!("{} scanner task failed: {}", stream, e);
    }
}
