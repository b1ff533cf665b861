//! Output pattern matchers
//!
//! rsync prints, depending on flags:
//!
//! ```text
//! Total file size: 4,662,518,418 bytes
//! Total transferred file size: 1,555,052,808 bytes
//!      61,407,232   5%   58.56MB/s    0:00:16
//!     120,324,096  11%   57.38MB/s    0:00:15 (xfr#1, to-chk=3/10)
//! ```
//!
//! Each matcher below picks one value out of such text. Absence of a match
//! is the normal case and never an error.

use once_cell::sync::Lazy;
use regex::Regex;

/// One compiled extraction rule; capture group 1 is the primary value
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    /// Compile a matcher
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// Whether the pattern occurs anywhere in `text`
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Capture group `group` of the first match, or `""` when there is no
    /// match or the group does not exist
    pub fn extract<'t>(&self, text: &'t str, group: usize) -> &'t str {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(group))
            .map_or("", |m| m.as_str())
    }
}

fn builtin(pattern: &str) -> Matcher {
    Matcher::new(pattern).expect("built-in pattern must compile")
}

/// `Total file size: N bytes` from `--stats`
pub static TOTAL_SIZE: Lazy<Matcher> =
    Lazy::new(|| builtin(r"Total file size: (\d+(?:,\d+)*) bytes"));

/// `Total transferred file size: N bytes` from `--stats`
pub static TRANSFERRED_SIZE: Lazy<Matcher> =
    Lazy::new(|| builtin(r"Total transferred file size: (\d+(?:,\d+)*) bytes"));

/// Byte count in front of a percentage on a progress line.
/// Group 2 holds the percentage, which is relative to the current run only.
pub static PROGRESS_BYTES: Lazy<Matcher> = Lazy::new(|| builtin(r"(\d+(?:,\d+)*) +(\d+)%"));

/// Throughput such as `58.56MB/s`, kept verbatim
pub static THROUGHPUT: Lazy<Matcher> = Lazy::new(|| builtin(r"(\d+\.\d+.{2}/s)"));

/// Parse a decimal byte count, ignoring thousands separators.
/// Malformed input yields 0.
pub fn parse_byte_count(text: &str) -> u64 {
    text.replace(',', "").parse().unwrap_or(0)
}
