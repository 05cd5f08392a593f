//! Plain CI output helpers
//!
//! Section headers and key/value listings printed straight to stdout.
//! Diagnostics go through `tracing` instead.

mod output;

pub use output::{done, key_value, multiline_value, section};
