//! # rsync-progress - rsync with a cumulative progress report
//!
//! rsync-progress drives the system `rsync` binary, optionally over ssh,
//! and turns its console output into a live, structured progress report.
//!
//! ## Features
//!
//! - **Two-phase copy**: a `--dry-run --stats` discovery run sizes the
//!   transfer, then the real run resumes with `--partial`
//! - **Cumulative progress**: bytes already in place count toward the
//!   percentage, so resumed transfers pick up where they left off
//! - **Live polling**: a cloneable tracker readable from any task
//! - **Remote targets**: ssh with keys, config files or `sshpass`
//! - **Pre-flight checks**: local and remote rsync, version, free space
//! - **Cancellation**: a token that stops rsync mid-copy
//!
//! ## Quick Start
//!
//! ```no_run
//! use rsync_progress::command::RsyncOptions;
//! use rsync_progress::core::RsyncCopier;
//!
//! # async fn demo() -> rsync_progress::Result<()> {
//! let mut copier = RsyncCopier::new(RsyncOptions::default());
//! let report = copier.copy("/backup", &["/data/projects"]).await?;
//!
//! println!("Copied {} bytes", report.state.bytes_total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Polling Progress
//!
//! ```no_run
//! use rsync_progress::command::RsyncOptions;
//! use rsync_progress::core::RsyncCopier;
//! use std::time::Duration;
//!
//! # async fn demo() -> rsync_progress::Result<()> {
//! let mut copier = RsyncCopier::new(RsyncOptions::default());
//! let tracker = copier.tracker();
//!
//! tokio::spawn(async move {
//!     loop {
//!         let state = tracker.state();
//!         println!("{:?}% at {}", state.percent, state.throughput);
//!         tokio::time::sleep(Duration::from_secs(1)).await;
//!     }
//! });
//!
//! copier.copy("/backup", &["/data/projects"]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Remote Destination
//!
//! ```no_run
//! use rsync_progress::command::RsyncOptions;
//! use rsync_progress::core::RsyncCopier;
//! use rsync_progress::network::SshTarget;
//! use rsync_progress::system::check_environment;
//! use std::path::Path;
//!
//! # async fn demo() -> rsync_progress::Result<()> {
//! let ssh = SshTarget::parse("ops@tms:2200")?.with_key_file("/home/ops/.ssh/id_ed25519");
//! check_environment("rsync", Some(&ssh), Path::new("/srv/backup")).await?;
//!
//! let mut copier = RsyncCopier::new(RsyncOptions::default().with_ssh(&ssh));
//! copier.copy("/srv/backup", &["/data/projects"]).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod progress;
pub mod system;

// Re-export commonly used types
pub use command::{Phase, RsyncOptions};
pub use config::CopyConfig;
pub use core::{CopyReport, RsyncCopier};
pub use error::{Result, RsyncError};
pub use progress::{ProgressReporter, ProgressTracker, TransferState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use rsync_progress::prelude::*;
    //! ```

    pub use crate::command::{Phase, RsyncOptions};
    pub use crate::config::CopyConfig;
    pub use crate::core::{CopyReport, PhaseReport, RsyncCopier};
    pub use crate::error::{Result, RsyncError};
    pub use crate::network::SshTarget;
    pub use crate::progress::{
        CapturedLog, CopyStatus, DiscoveryTotals, ProgressReporter, ProgressSnapshot,
        ProgressTracker, ReportFormat, TransferState,
    };
    pub use crate::system::{check_environment, check_local, check_remote};
}
