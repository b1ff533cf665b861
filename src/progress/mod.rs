//! Progress extraction and reporting module
//!
//! Turns rsync's console output into a structured report: pattern
//! matchers over raw text, the shared live state they feed, and the
//! reporters that display it.

pub mod matcher;
mod reporter;
mod state;

pub use matcher::{parse_byte_count, Matcher};
pub use reporter::*;
pub use state::*;
