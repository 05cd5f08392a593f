//! CLI argument definitions using clap derive
//!
//! Every input can also come from the environment, using the variable
//! names the CI step exposes.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Carthage step with dependency build caching
///
/// Runs a carthage command and, for `bootstrap`, reuses the previous build
/// when the resolved dependencies and Swift toolchain are unchanged.
#[derive(Parser, Debug)]
#[command(name = "carthage-step")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Carthage command to run (bootstrap, update, build, ...)
    #[arg(long, env = "carthage_command")]
    pub carthage_command: String,

    /// Additional carthage options, shell-quoted
    #[arg(long, env = "carthage_options", default_value = "", allow_hyphen_values = true)]
    pub carthage_options: String,

    /// GitHub access token used by carthage for API requests
    #[arg(
        long,
        env = "github_access_token",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub github_access_token: String,

    /// Directory containing the Cartfile
    #[arg(long, env = "BITRISE_SOURCE_DIR", default_value = ".")]
    pub source_dir: PathBuf,

    /// xcconfig override file: local path or http(s) URL
    #[arg(long, env = "xcconfig")]
    pub xcconfig: Option<String>,

    /// xcconfig override inherited from the environment (lower precedence)
    #[arg(long, env = "XCODE_XCCONFIG_FILE")]
    pub xcconfig_from_env: Option<String>,

    /// Enable debug logging
    #[arg(long, env = "verbose_log", value_enum, default_value_t = Toggle::No)]
    pub verbose_log: Toggle,

    /// Root directory for cache state and cached build outputs
    #[arg(long, env = "CARTHAGE_STEP_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// yes/no switch as used by step inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    Yes,
    No,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Self::Yes
    }
}
