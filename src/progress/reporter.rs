//! Progress reporter implementation
//!
//! Renders [`ProgressSnapshot`]s polled from a tracker:
//! - an indicatif byte bar with rsync's own throughput label
//! - JSON lines on stdout for machine consumers
//! - nothing at all in quiet mode

use crate::progress::{CopyStatus, ProgressSnapshot};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// How progress is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Terminal progress bar
    #[default]
    Bar,
    /// One JSON object per update on stdout
    Json,
    /// No progress output
    Quiet,
}

/// Progress reporter for a copy
pub struct ProgressReporter {
    /// Output format
    format: ReportFormat,
    /// Byte progress bar (hidden unless format is `Bar`)
    bar: ProgressBar,
    /// Last snapshot rendered, to skip duplicates
    last: Option<ProgressSnapshot>,
}

impl ProgressReporter {
    /// Create a reporter for `format`
    pub fn new(format: ReportFormat) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.green/white}] {bytes}/{total_bytes} ({msg})")
                .expect("Invalid template")
                .progress_chars("=> "),
        );
        if format != ReportFormat::Bar {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }

        Self {
            format,
            bar,
            last: None,
        }
    }

    /// Create a reporter that prints nothing
    pub fn disabled() -> Self {
        Self::new(ReportFormat::Quiet)
    }

    /// Output format
    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Render a snapshot if it differs from the previous one
    pub fn update(&mut self, snapshot: &ProgressSnapshot) {
        if self.last.as_ref() == Some(snapshot) {
            return;
        }

        match self.format {
            ReportFormat::Bar => self.draw(snapshot),
            ReportFormat::Json => emit_json(snapshot),
            ReportFormat::Quiet => {}
        }

        self.last = Some(snapshot.clone());
    }

    fn draw(&self, snapshot: &ProgressSnapshot) {
        let state = &snapshot.state;
        self.bar.set_prefix(status_label(snapshot.status));
        if state.bytes_total > 0 {
            self.bar.set_length(state.bytes_total);
            self.bar.set_position(state.bytes_sent.min(state.bytes_total));
        }
        let rate = if state.throughput.is_empty() {
            "-".to_string()
        } else {
            state.throughput.clone()
        };
        let percent = state
            .percent
            .map_or_else(|| "?%".to_string(), |p| format!("{:.1}%", p));
        self.bar.set_message(format!("{}, {}", percent, rate));
    }

    /// Finish with the final snapshot of a successful copy
    pub fn finish_success(&mut self, snapshot: &ProgressSnapshot) {
        self.update(snapshot);
        self.bar.finish();
    }

    /// Finish after a failed copy, keeping the bar where it stopped
    pub fn finish_error(&mut self, snapshot: &ProgressSnapshot) {
        self.update(snapshot);
        self.bar.abandon();
    }
}

fn status_label(status: CopyStatus) -> &'static str {
    match status {
        CopyStatus::Idle => "Idle    ",
        CopyStatus::Discovering => "Scanning",
        CopyStatus::Transferring => "Sending ",
        CopyStatus::Completed => "Done    ",
        CopyStatus::Failed => "Failed  ",
        CopyStatus::Cancelled => "Stopped ",
    }
}

fn emit_json(snapshot: &ProgressSnapshot) {
    match serde_json::to_string(snapshot) {
        Ok(line) => {
            let mut stdout = std::io::stdout().lock();
            // A closed stdout only loses progress lines.
            let _ = writeln!(stdout, "{}", line);
            let _ = stdout.flush();
        }
        Err(e) => tracing::warn!("Could not serialize progress: {}", e),
    }
}

/// Human-readable one-line summary of a snapshot
pub fn summary_line(snapshot: &ProgressSnapshot) -> String {
    let state = &snapshot.state;
    format!(
        "{}/{} ({})",
        humansize::format_size(state.bytes_sent, humansize::BINARY),
        humansize::format_size(state.bytes_total, humansize::BINARY),
        state
            .percent
            .map_or_else(|| "unknown".to_string(), |p| format!("{:.1}%", p)),
    )
}
