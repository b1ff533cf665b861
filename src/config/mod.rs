//! Configuration module for rsync-progress
//!
//! Provides the CLI arguments and the copy configuration built from them.

mod settings;

pub use settings::*;
