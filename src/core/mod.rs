//! Core copy engine module
//!
//! Provides the two-phase rsync orchestration, the subprocess seam it
//! launches through, and the stream scanners that fold live output into
//! the progress tracker.

mod copier;
mod process;
mod scanner;

pub use copier::*;
pub use process::*;
pub use scanner::*;
