//! Remote shell support
//!
//! rsync reaches remote hosts through ssh. This module renders the ssh
//! invocation for rsync's `--rsh` and runs ad-hoc remote commands for the
//! pre-flight checks.
//!
//! ```bash
//! # password login goes through sshpass
//! rsync-progress /data/in --host ops@tms:2200 --ssh-password secret /data/out
//! ```

mod ssh;

pub use ssh::*;
