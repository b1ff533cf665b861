//! Live transfer state
//!
//! A [`ProgressTracker`] is the single aggregate one copy writes into: the
//! discovery totals, the derived transfer progress, the captured stream
//! text and the copy status. Scanners write to it while other tasks poll
//! [`ProgressTracker::snapshot`]; every access goes through one lock.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Sizes learned from rsync's `--stats` output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryTotals {
    /// Total bytes considered for the transfer
    pub total: u64,
    /// Bytes rsync reports as needing transfer
    pub transferred: u64,
}

impl DiscoveryTotals {
    /// Bytes already correct at the destination before the run started
    pub fn partial(&self) -> u64 {
        self.total.saturating_sub(self.transferred)
    }
}

/// Progress report surface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferState {
    /// Bytes sent, counting bytes already present at the destination
    pub bytes_sent: u64,
    /// Total bytes of the transfer
    pub bytes_total: u64,
    /// Last throughput label printed by rsync, verbatim
    pub throughput: String,
    /// Percent complete; `None` until a total is known
    pub percent: Option<f64>,
}

/// Raw text of both streams, for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedLog {
    /// Accumulated stdout
    pub stdout: String,
    /// Accumulated stderr
    pub stderr: String,
}

/// Where a copy currently is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    /// Nothing started yet
    #[default]
    Idle,
    /// Dry run in progress
    Discovering,
    /// Real transfer in progress
    Transferring,
    /// Both runs succeeded
    Completed,
    /// A run failed; numbers are left as last observed
    Failed,
    /// The caller cancelled the copy
    Cancelled,
}

impl CopyStatus {
    /// Whether the copy has finished, one way or another
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Consistent point-in-time copy of the tracker, without the logs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Copy status
    pub status: CopyStatus,
    /// Discovery totals
    pub totals: DiscoveryTotals,
    /// Transfer progress
    pub state: TransferState,
}

#[derive(Debug, Default)]
struct TrackerInner {
    status: CopyStatus,
    totals: DiscoveryTotals,
    state: TransferState,
    log: CapturedLog,
}

/// Shared, cloneable handle on one copy's progress
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<RwLock<TrackerInner>>,
}

impl ProgressTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    // A panic elsewhere cannot leave these fields half-written, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, TrackerInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackerInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear everything for a new copy
    pub fn reset(&self) {
        *self.write() = TrackerInner::default();
    }

    /// Current status
    pub fn status(&self) -> CopyStatus {
        self.read().status
    }

    /// Move to a new status
    pub fn set_status(&self, status: CopyStatus) {
        self.write().status = status;
    }

    /// Current discovery totals
    pub fn totals(&self) -> DiscoveryTotals {
        self.read().totals
    }

    /// Overwrite the discovered total size
    pub fn set_total(&self, total: u64) {
        self.write().totals.total = total;
    }

    /// Overwrite the discovered transferred size
    pub fn set_transferred(&self, transferred: u64) {
        self.write().totals.transferred = transferred;
    }

    /// Fold a raw progress byte count from the current run.
    ///
    /// The count is offset by the bytes already present at the destination
    /// so that it stays continuous across runs. Ignored until a total is
    /// known; returns whether the state changed.
    pub fn record_progress(&self, raw_sent: u64) -> bool {
        let mut inner = self.write();
        let totals = inner.totals;
        if totals.total == 0 {
            return false;
        }

        let state = &mut inner.state;
        state.bytes_total = totals.total;
        state.bytes_sent = raw_sent.saturating_add(totals.partial());
        state.percent = Some(percent_of(state.bytes_sent, state.bytes_total));
        true
    }

    /// Overwrite the throughput label
    pub fn set_throughput(&self, throughput: &str) {
        self.write().state.throughput = throughput.to_string();
    }

    /// Append text captured from stdout
    pub fn append_stdout(&self, text: &str) {
        self.write().log.stdout.push_str(text);
    }

    /// Append text captured from stderr
    pub fn append_stderr(&self, text: &str) {
        self.write().log.stderr.push_str(text);
    }

    /// Mark the copy complete: sent equals total and percent is exactly 100
    pub fn complete(&self) {
        let mut inner = self.write();
        if inner.state.bytes_total == 0 {
            inner.state.bytes_total = inner.totals.total;
        }
        inner.state.bytes_sent = inner.state.bytes_total;
        inner.state.percent = Some(100.0);
        inner.status = CopyStatus::Completed;
    }

    /// Current transfer progress
    pub fn state(&self) -> TransferState {
        self.read().state.clone()
    }

    /// Status, totals and progress taken under one lock
    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.read();
        ProgressSnapshot {
            status: inner.status,
            totals: inner.totals,
            state: inner.state.clone(),
        }
    }

    /// Captured stream text so far
    pub fn log(&self) -> CapturedLog {
        self.read().log.clone()
    }

    /// Last `max_lines` non-empty stderr lines, for error messages
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        let inner = self.read();
        let lines: Vec<&str> = inner
            .log
            .stderr
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        lines[lines.len().saturating_sub(max_lines)..].join("\n")
    }
}

fn percent_of(sent: u64, total: u64) -> f64 {
    sent as f64 * 100.0 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOTAL: u64 = 4_662_518_418;
    const TRANSFERRED: u64 = 1_555_052_808;

    #[test]
    fn test_progress_offset_by_partial_size() {
        let tracker = ProgressTracker::new();
        tracker.set_total(TOTAL);
        tracker.set_transferred(TRANSFERRED);

        assert!(tracker.record_progress(120_324_096));

        let state = tracker.state();
        let expected = 120_324_096 + (TOTAL - TRANSFERRED);
        assert_eq!(state.bytes_sent, expected);
        assert_eq!(state.bytes_total, TOTAL);
        assert_eq!(state.percent, Some(expected as f64 * 100.0 / TOTAL as f64));
    }

    #[test]
    fn test_percent_unknown_without_total() {
        let tracker = ProgressTracker::new();
        tracker.set_transferred(500);

        assert!(!tracker.record_progress(1_000));
        assert_eq!(tracker.state(), TransferState::default());
        assert_eq!(tracker.state().percent, None);
    }

    #[test]
    fn test_transferred_larger_than_total() {
        let totals = DiscoveryTotals { total: 10, transferred: 25 };
        assert_eq!(totals.partial(), 0);
    }

    #[test]
    fn test_complete_forces_hundred_percent() {
        let tracker = ProgressTracker::new();
        tracker.set_total(1_000);
        tracker.record_progress(997);

        tracker.complete();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.status, CopyStatus::Completed);
        assert_eq!(snapshot.state.bytes_sent, 1_000);
        assert_eq!(snapshot.state.bytes_total, 1_000);
        assert_eq!(snapshot.state.percent, Some(100.0));
    }

    #[test]
    fn test_complete_without_progress_lines_uses_totals() {
        let tracker = ProgressTracker::new();
        tracker.set_total(4_096);

        tracker.complete();

        let state = tracker.state();
        assert_eq!(state.bytes_total, 4_096);
        assert_eq!(state.bytes_sent, 4_096);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let tracker = ProgressTracker::new();
        tracker.set_total(200);
        tracker.set_transferred(200);
        tracker.record_progress(50);
        tracker.set_throughput("1.00MB/s");
        tracker.set_status(CopyStatus::Failed);

        let first = tracker.snapshot();
        assert_eq!(first, tracker.snapshot());
        assert_eq!(first.state.bytes_sent, 50);
        assert_eq!(first.state.percent, Some(25.0));
    }

    #[test]
    fn test_nothing_to_transfer_counts_everything_present() {
        let tracker = ProgressTracker::new();
        tracker.set_total(200);
        tracker.set_transferred(0);
        assert_eq!(tracker.totals().partial(), 200);

        assert!(tracker.record_progress(0));
        assert_eq!(tracker.state().bytes_sent, 200);
        assert_eq!(tracker.state().percent, Some(100.0));

        // Raw counts on top of a full offset are not clamped.
        tracker.record_progress(50);
        assert_eq!(tracker.state().bytes_sent, 250);
        assert_eq!(tracker.state().percent, Some(125.0));
    }

    #[test]
    fn test_reset_clears_everything() {
        let tracker = ProgressTracker::new();
        tracker.set_total(200);
        tracker.append_stdout("line\n");
        tracker.reset();

        assert_eq!(tracker.snapshot(), ProgressSnapshot::default());
        assert_eq!(tracker.log(), CapturedLog::default());
    }

    #[test]
    fn test_clones_share_state() {
        let tracker = ProgressTracker::new();
        let reader = tracker.clone();
        tracker.append_stderr("rsync: connection unexpectedly closed\n");
        assert!(reader.log().stderr.contains("unexpectedly closed"));
    }

    #[test]
    fn test_stderr_tail() {
        let tracker = ProgressTracker::new();
        tracker.append_stderr("one\n\ntwo\r\nthree\n");
        assert_eq!(tracker.stderr_tail(2), "two\nthree");
        assert_eq!(tracker.stderr_tail(10), "one\ntwo\nthree");
    }

    #[test]
    fn test_report_serialization() {
        let state = TransferState {
            bytes_sent: 5,
            bytes_total: 10,
            throughput: "58.56MB/s".to_string(),
            percent: Some(50.0),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "bytesSent": 5,
                "bytesTotal": 10,
                "throughput": "58.56MB/s",
                "percent": 50.0,
            })
        );

        let unknown = serde_json::to_value(TransferState::default()).unwrap();
        assert!(unknown["percent"].is_null());
    }
}
