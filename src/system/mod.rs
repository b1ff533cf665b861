//! System environment checks module
//!
//! Verifies the local and remote tools before a copy is started.

mod preflight;

pub use preflight::*;
