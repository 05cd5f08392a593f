//! Typed step configuration

pub mod xcconfig;

pub use xcconfig::{resolve_xcconfig, DownloadingFileProvider, FileProvider, XcconfigResolution};

use crate::cli::Cli;
use crate::error::{StepError, StepResult};
use crate::ui;
use std::fmt;
use std::path::PathBuf;

/// A value that must never be printed
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw value, for handing to a subprocess
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", self)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            Ok(())
        } else {
            write!(f, "*****")
        }
    }
}

/// Step inputs after validation
#[derive(Debug, Clone)]
pub struct StepConfig {
    pub carthage_command: String,
    pub carthage_options: String,
    pub github_access_token: Secret,
    pub source_dir: PathBuf,
    pub xcconfig: Option<String>,
    pub xcconfig_from_env: Option<String>,
    pub verbose_log: bool,
    pub cache_dir: PathBuf,
}

impl StepConfig {
    /// Validate parsed arguments
    pub fn from_cli(cli: Cli) -> StepResult<Self> {
        let carthage_command = cli.carthage_command.trim().to_string();
        if carthage_command.is_empty() {
            return Err(StepError::ConfigInvalid(
                "carthage_command is required".to_string(),
            ));
        }

        Ok(Self {
            carthage_command,
            carthage_options: cli.carthage_options,
            github_access_token: Secret::new(cli.github_access_token),
            source_dir: cli.source_dir,
            xcconfig: non_empty(cli.xcconfig),
            xcconfig_from_env: non_empty(cli.xcconfig_from_env),
            verbose_log: cli.verbose_log.enabled(),
            cache_dir: cli.cache_dir.unwrap_or_else(Self::default_cache_dir),
        })
    }

    /// `~/Library/Caches/carthage-step` on macOS, `$XDG_CACHE_HOME/carthage-step` on Linux
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("carthage-step")
    }

    /// Persisted fingerprint records
    pub fn state_dir(&self) -> PathBuf {
        self.cache_dir.join("state")
    }

    /// Cached build output payloads
    pub fn artifacts_dir(&self) -> PathBuf {
        self.cache_dir.join("artifacts")
    }

    /// Print the inputs with secrets masked
    pub fn print(&self) {
        ui::section("Configs:");
        ui::key_value("github_access_token", &self.github_access_token.to_string());
        ui::key_value("carthage_command", &self.carthage_command);
        ui::key_value("carthage_options", &self.carthage_options);
        ui::key_value("source_dir", &self.source_dir.display().to_string());
        ui::key_value("xcconfig", self.xcconfig.as_deref().unwrap_or(""));
        ui::key_value(
            "XCODE_XCCONFIG_FILE",
            self.xcconfig_from_env.as_deref().unwrap_or(""),
        );
        ui::key_value("verbose_log", if self.verbose_log { "yes" } else { "no" });
        ui::key_value("cache_dir", &self.cache_dir.display().to_string());
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
