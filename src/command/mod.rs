//! rsync invocation building
//!
//! Translates a structured [`RsyncOptions`] set into the argv of the
//! discovery (dry run) and transfer runs.

mod args;

pub use args::*;
