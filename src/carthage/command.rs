//! Assembles and runs the carthage build invocation

use crate::carthage::{CARTHAGE_BIN, GITHUB_TOKEN_ENV, XCCONFIG_ENV};
use crate::config::Secret;
use crate::error::StepResult;
use crate::process::{Invocation, ProcessExecutor};
use std::path::Path;
use tracing::info;

/// Runs `carthage <verb> [options...]` through a [`ProcessExecutor`]
pub struct CommandRunner<'a> {
    executor: &'a dyn ProcessExecutor,
}

impl<'a> CommandRunner<'a> {
    pub fn new(executor: &'a dyn ProcessExecutor) -> Self {
        Self { executor }
    }

    /// Build the invocation without running it.
    ///
    /// Argument order: verb, then the custom options verbatim (a
    /// `--project-directory` override stays in place). The xcconfig override
    /// and the access token are passed as environment entries, which is how
    /// carthage and xcodebuild pick them up.
    pub fn invocation(
        command: &str,
        args: &[String],
        token: &Secret,
        xcconfig: Option<&Path>,
    ) -> Invocation {
        let argv = std::iter::once(command.to_string()).chain(args.iter().cloned());
        let mut invocation = Invocation::new(CARTHAGE_BIN, argv).echoed();

        if let Some(path) = xcconfig.filter(|p| !p.as_os_str().is_empty()) {
            invocation = invocation.env(XCCONFIG_ENV, path.to_string_lossy());
        }

        if !token.is_empty() {
            invocation = invocation.env(GITHUB_TOKEN_ENV, token.expose());
        }

        invocation
    }

    /// Run carthage synchronously, echoing output, and return the combined output.
    ///
    /// A non-zero exit becomes `CommandExecution`. There is no retry.
    pub async fn run(
        &self,
        command: &str,
        args: &[String],
        token: &Secret,
        xcconfig: Option<&Path>,
    ) -> StepResult<String> {
        let invocation = Self::invocation(command, args, token, xcconfig);

        println!();
        info!("$ {}", invocation.command_line());
        println!();

        let output = self.executor.execute(&invocation).await?;
        output.into_result(&invocation)
    }
}
