//! Error types for the Carthage step
//!
//! All modules use `StepResult<T>` as their return type. Nothing is retried;
//! every error travels up to `main`, which prints it and exits non-zero.

use thiserror::Error;

/// Result type alias for step operations
pub type StepResult<T> = Result<T, StepError>;

/// All errors that can occur while running the step
#[derive(Error, Debug)]
pub enum StepError {
    // Probe errors
    #[error("Failed to parse `{command}` output as a version: {output}")]
    VersionParse { command: String, output: String },

    // Input errors
    #[error("Failed to shell split carthage options ({options}): unbalanced quoting")]
    OptionSyntax { options: String },

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Failed to resolve xcconfig file {path}: {reason}")]
    ConfigResolution { path: String, reason: String },

    // Process errors
    #[error("Command failed to start: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command exited with {}: {command}\n{output}", exit_label(.code))]
    CommandExecution {
        command: String,
        code: Option<i32>,
        output: String,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Wrapping
    #[error("{stage}: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<StepError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl StepError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// The innermost error, skipping stage wrappers
    pub fn root(&self) -> &StepError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::CommandFailed { command, .. } if command.starts_with("carthage") => {
                Some("Install Carthage: brew install carthage")
            }
            Self::CommandFailed { command, .. } if command.starts_with("swift") => {
                Some("Install Xcode or the Swift toolchain and make sure `swift` is on PATH")
            }
            Self::OptionSyntax { .. } => Some("Check carthage_options for an unclosed quote"),
            Self::ConfigResolution { .. } => {
                Some("Check the xcconfig input: it must be an existing file or a reachable URL")
            }
            _ => None,
        }
    }
}

/// Attach the name of the pipeline stage to an error
pub trait StageContext<T> {
    fn stage(self, stage: &'static str) -> StepResult<T>;
}

impl<T> StageContext<T> for StepResult<T> {
    fn stage(self, stage: &'static str) -> StepResult<T> {
        self.map_err(|e| StepError::Stage {
            stage,
            source: Box::new(e),
        })
    }
}
