//! Cached carthage runner
//!
//! Ties the cache engine to the command runner: a hit restores outputs and
//! skips carthage, a miss runs carthage and records the result only after it
//! succeeds.

use crate::cache::{build_fingerprint, CacheEngine, Project};
use crate::carthage::{CommandRunner, BOOTSTRAP_COMMAND};
use crate::config::Secret;
use crate::error::{StageContext, StepResult};
use std::path::PathBuf;
use tracing::{info, warn};

/// What a run ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Cached outputs were restored, carthage did not run
    Restored,
    /// Carthage ran and its outputs were cached
    Built,
    /// Carthage ran without caching (command is not `bootstrap`)
    Uncached,
}

/// Inputs for one carthage run
pub struct CarthageRun {
    pub command: String,
    pub args: Vec<String>,
    pub token: Secret,
    pub xcconfig: Option<PathBuf>,
    pub swift_version: String,
    pub project: Project,
}

impl CarthageRun {
    fn caches(&self) -> bool {
        self.command == BOOTSTRAP_COMMAND
    }
}

pub struct CachedRunner<'a> {
    engine: CacheEngine<'a>,
    commands: CommandRunner<'a>,
}

impl<'a> CachedRunner<'a> {
    pub fn new(engine: CacheEngine<'a>, commands: CommandRunner<'a>) -> Self {
        Self { engine, commands }
    }

    pub async fn run(&self, run: &CarthageRun) -> StepResult<RunOutcome> {
        if !run.caches() {
            info!(
                "Caching only applies to `{}`; running `{}` directly",
                BOOTSTRAP_COMMAND, run.command
            );
            self.execute(run).await?;
            return Ok(RunOutcome::Uncached);
        }

        if !run.project.cartfile_resolved_path().exists() {
            warn!(
                "No Cartfile.resolved found at {}, cache key covers the unresolved state",
                run.project.cartfile_resolved_path().display()
            );
        }

        let fingerprint =
            build_fingerprint(&run.project, &run.swift_version, run.xcconfig.as_deref())
                .await
                .stage("Computing project fingerprint")?;

        let decision = self
            .engine
            .decide(&run.project, fingerprint)
            .await
            .stage("Reading cache state")?;

        if decision.is_hit() {
            info!(
                "Using cached dependencies for bootstrap command (fingerprint {})",
                decision.fingerprint.short()
            );
            info!("To force an update of your dependencies, use `update` as the carthage command");
            self.engine
                .restore(&run.project, &decision)
                .await
                .stage("Restoring cached build")?;
            return Ok(RunOutcome::Restored);
        }

        if let Some(reason) = decision.miss_reason {
            info!("Cache miss: {}", reason);
        }

        self.execute(run).await?;

        self.engine
            .commit(&run.project, &decision)
            .await
            .stage("Caching build outputs")?;
        Ok(RunOutcome::Built)
    }

    async fn execute(&self, run: &CarthageRun) -> StepResult<String> {
        self.commands
            .run(&run.command, &run.args, &run.token, run.xcconfig.as_deref())
            .await
            .stage("Running carthage")
    }
}
