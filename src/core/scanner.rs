//! Live stream scanning
//!
//! Each subprocess stream is drained in fixed-size reads. A read is an
//! arbitrary byte window, so reads are reassembled into complete lines
//! before any pattern is applied; rsync redraws its progress line with
//! `\r`, so both `\r` and `\n` end a line.

use crate::progress::matcher::{PROGRESS_BYTES, THROUGHPUT, TOTAL_SIZE, TRANSFERRED_SIZE};
use crate::progress::{parse_byte_count, ProgressTracker};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

/// Read size for stdout
pub const STDOUT_CHUNK_SIZE: usize = 2048;

/// Read size for stderr
pub const STDERR_CHUNK_SIZE: usize = 1024;

/// Longest partial line kept across reads before it is flushed as-is
pub const MAX_CARRY_LEN: usize = 64 * 1024;

/// Which subprocess stream a scanner drains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Progress and statistics; all matchers apply
    Stdout,
    /// Diagnostics; captured only
    Stderr,
}

impl StreamKind {
    /// Bytes requested per read
    pub fn chunk_size(&self) -> usize {
        match self {
            StreamKind::Stdout => STDOUT_CHUNK_SIZE,
            StreamKind::Stderr => STDERR_CHUNK_SIZE,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Reassembles complete lines from arbitrary reads
///
/// Returned lines keep their terminator so that concatenating them
/// reproduces the stream.
#[derive(Debug, Default)]
pub struct LineSplitter {
    carry: Vec<u8>,
}

impl LineSplitter {
    /// Create an empty splitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read; returns the lines it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut start = 0;

        for (i, byte) in chunk.iter().enumerate() {
            if *byte == b'\n' || *byte == b'\r' {
                self.carry.extend_from_slice(&chunk[start..=i]);
                lines.push(self.take());
                start = i + 1;
            }
        }
        self.carry.extend_from_slice(&chunk[start..]);

        if self.carry.len() >= MAX_CARRY_LEN {
            lines.push(self.take());
        }

        lines
    }

    /// Flush the unterminated remainder at end of stream
    pub fn finish(&mut self) -> Option<String> {
        (!self.carry.is_empty()).then(|| self.take())
    }

    /// Bytes currently held back
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    fn take(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        line
    }
}

/// Fold one stdout line into the tracker
pub fn fold_stdout_line(tracker: &ProgressTracker, line: &str) {
    let text = line.trim_end_matches(['\r', '\n']);

    if TOTAL_SIZE.is_match(text) {
        tracker.set_total(parse_byte_count(TOTAL_SIZE.extract(text, 1)));
    }
    if TRANSFERRED_SIZE.is_match(text) {
        tracker.set_transferred(parse_byte_count(TRANSFERRED_SIZE.extract(text, 1)));
    }
    if PROGRESS_BYTES.is_match(text) {
        tracker.record_progress(parse_byte_count(PROGRESS_BYTES.extract(text, 1)));
    }
    if THROUGHPUT.is_match(text) {
        tracker.set_throughput(THROUGHPUT.extract(text, 1));
    }

    tracker.append_stdout(line);
}

/// What a finished scan consumed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Bytes read from the stream
    pub bytes: u64,
    /// Lines folded, including a final unterminated one
    pub lines: u64,
}

/// Drains one stream into a [`ProgressTracker`]
pub struct StreamScanner {
    kind: StreamKind,
    tracker: ProgressTracker,
    splitter: LineSplitter,
}

impl StreamScanner {
    /// Create a scanner for `kind`
    pub fn new(kind: StreamKind, tracker: ProgressTracker) -> Self {
        Self {
            kind,
            tracker,
            splitter: LineSplitter::new(),
        }
    }

    /// Scanner for a stdout stream
    pub fn stdout(tracker: ProgressTracker) -> Self {
        Self::new(StreamKind::Stdout, tracker)
    }

    /// Scanner for a stderr stream
    pub fn stderr(tracker: ProgressTracker) -> Self {
        Self::new(StreamKind::Stderr, tracker)
    }

    /// Read until end of stream, a read error or cancellation.
    ///
    /// None of these is an error here: the end of output is how every
    /// scan finishes, and the orchestrator judges the process by its exit.
    pub async fn scan<R>(mut self, mut reader: R, cancel: CancellationToken) -> ScanSummary
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.kind.chunk_size()];
        let mut summary = ScanSummary::default();

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("{} scan cancelled", self.kind);
                    break;
                }
                read = reader.read(&mut buf) => read,
            };

            match read {
                Ok(0) => break,
                Ok(n) => {
                    summary.bytes += n as u64;
                    for line in self.splitter.push(&buf[..n]) {
                        self.fold(&line);
                        summary.lines += 1;
                    }
                }
                Err(e) => {
                    tracing::debug!("{} scan stopped on read error: {}", self.kind, e);
                    break;
                }
            }
        }

        if let Some(rest) = self.splitter.finish() {
            self.fold(&rest);
            summary.lines += 1;
        }

        tracing::debug!("{} scan finished: {} bytes, {} lines", self.kind, summary.bytes, summary.lines);
        summary
    }

    fn fold(&self, line: &str) {
        match self.kind {
            StreamKind::Stdout => fold_stdout_line(&self.tracker, line),
            StreamKind::Stderr => self.tracker.append_stderr(line),
        }
    }
}
