//! Carthage CI step with fingerprint-based build caching
//!
//! Runs a carthage command for a Swift/Cocoa project. For `bootstrap`, the
//! previous `Carthage/Build` is reused when the resolved dependencies, the
//! xcconfig override and the Swift toolchain are unchanged.

pub mod cache;
pub mod carthage;
pub mod cli;
pub mod config;
pub mod error;
pub mod process;
pub mod runner;
pub mod step;
pub mod ui;

pub use error::{StepError, StepResult};
