//! Step pipeline
//!
//! Probe versions, parse options, resolve the xcconfig override, then hand
//! off to the cached runner. Strictly sequential; any error ends the run.

use crate::cache::{CacheEngine, DirArtifactCache, FileStateStore, Project};
use crate::carthage::{
    parse_options, probe_carthage_version, probe_swift_version, resolve_project_directory,
    CommandRunner,
};
use crate::config::{resolve_xcconfig, DownloadingFileProvider, FileProvider, StepConfig};
use crate::error::{StageContext, StepResult};
use crate::process::{ProcessExecutor, SystemExecutor};
use crate::runner::{CachedRunner, CarthageRun, RunOutcome};
use crate::ui;
use tracing::{debug, warn};

/// Run the step with the system executor and downloading file provider
pub async fn execute(config: &StepConfig) -> StepResult<RunOutcome> {
    execute_with(config, &SystemExecutor::new(), &DownloadingFileProvider::default()).await
}

/// Run the step with injected collaborators
pub async fn execute_with(
    config: &StepConfig,
    executor: &dyn ProcessExecutor,
    files: &dyn FileProvider,
) -> StepResult<RunOutcome> {
    ui::section("Environment:");

    let carthage_version = probe_carthage_version(executor)
        .await
        .stage("Failed to get carthage version")?;
    ui::key_value("CarthageVersion", &carthage_version.to_string());

    let swift_version = probe_swift_version(executor)
        .await
        .stage("Failed to get swift version")?;
    ui::multiline_value("SwiftVersion", &swift_version);

    let args = parse_options(&config.carthage_options).stage("Failed to parse carthage options")?;
    debug!("Custom carthage options: {:?}", args);

    let xcconfig = resolve_xcconfig(
        config.xcconfig.as_deref(),
        config.xcconfig_from_env.as_deref(),
        files,
    )
    .await
    .stage("Failed to get xcconfig file")?;
    for warning in &xcconfig.warnings {
        warn!("{}", warning);
    }

    let project = Project::new(resolve_project_directory(&config.source_dir, &args));
    debug!(
        "Project {} (state key {})",
        project.root().display(),
        project.state_key()
    );

    let states = FileStateStore::new(config.state_dir());
    let artifacts = DirArtifactCache::new(config.artifacts_dir());
    let runner = CachedRunner::new(
        CacheEngine::new(&states, &artifacts),
        CommandRunner::new(executor),
    );

    let outcome = runner
        .run(&CarthageRun {
            command: config.carthage_command.clone(),
            args,
            token: config.github_access_token.clone(),
            xcconfig: xcconfig.path,
            swift_version,
            project,
        })
        .await?;

    match outcome {
        RunOutcome::Restored => ui::done("Cached dependencies restored"),
        RunOutcome::Built => ui::done("Dependencies built and cached"),
        RunOutcome::Uncached => ui::done("Carthage command finished"),
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::error::StepError;
    use crate::process::{Invocation, ProcessOutput};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers version probes and "builds" by writing a framework file
    struct FakeTools {
        carthage_version: &'static str,
        build_exit: i32,
        builds: Mutex<Vec<Invocation>>,
    }

    impl FakeTools {
        fn new() -> Self {
            Self {
                carthage_version: "0.38.0",
                build_exit: 0,
                builds: Mutex::new(Vec::new()),
            }
        }

        fn builds(&self) -> usize {
            self.builds.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProcessExecutor for FakeTools {
        async fn execute(&self, invocation: &Invocation) -> StepResult<ProcessOutput> {
            let ok = |output: &str| ProcessOutput {
                code: Some(0),
                output: output.to_string(),
            };
            match (invocation.program.as_str(), invocation.args.first().map(String::as_str)) {
                ("carthage", Some("version")) => Ok(ok(self.carthage_version)),
                ("swift", _) => Ok(ok("Apple Swift version 5.10\nTarget: arm64-apple-macosx14.0")),
                ("carthage", _) => {
                    self.builds.lock().unwrap().push(invocation.clone());
                    let dir = invocation
                        .args
                        .iter()
                        .position(|a| a == "--project-directory")
                        .and_then(|i| invocation.args.get(i + 1))
                        .map(PathBuf::from)
                        .unwrap_or_default();
                    let framework = dir.join("Carthage/Build/iOS/Alamofire.framework");
                    std::fs::create_dir_all(&framework).unwrap();
                    std::fs::write(framework.join("Alamofire"), b"binary").unwrap();
                    Ok(ProcessOutput {
                        code: Some(self.build_exit),
                        output: "*** Building scheme \"Alamofire iOS\"".to_string(),
                    })
                }
                _ => panic!("unexpected invocation: {:?}", invocation),
            }
        }
    }

    struct NoRemote;

    #[async_trait]
    impl FileProvider for NoRemote {
        async fn local_path(&self, location: &str) -> StepResult<PathBuf> {
            Ok(PathBuf::from(location))
        }
    }

    fn write_project(dir: &Path) {
        std::fs::write(dir.join("Cartfile"), "github \"Alamofire/Alamofire\" ~> 5.0").unwrap();
        std::fs::write(
            dir.join("Cartfile.resolved"),
            "github \"Alamofire/Alamofire\" \"5.9.1\"",
        )
        .unwrap();
    }

    fn config(project: &Path, cache: &Path, command: &str) -> StepConfig {
        StepConfig {
            carthage_command: command.to_string(),
            carthage_options: format!(
                "--platform iOS --project-directory \"{}\"",
                project.display()
            ),
            github_access_token: Secret::default(),
            source_dir: PathBuf::from("."),
            xcconfig: None,
            xcconfig_from_env: None,
            verbose_log: false,
            cache_dir: cache.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn second_bootstrap_is_a_hit() {
        let project = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_project(project.path());
        let config = config(project.path(), cache.path(), "bootstrap");
        let tools = FakeTools::new();

        let first = execute_with(&config, &tools, &NoRemote).await.unwrap();
        assert_eq!(first, RunOutcome::Built);
        assert_eq!(tools.builds(), 1);

        std::fs::remove_dir_all(project.path().join("Carthage")).unwrap();

        let second = execute_with(&config, &tools, &NoRemote).await.unwrap();
        assert_eq!(second, RunOutcome::Restored);
        assert_eq!(tools.builds(), 1);
        assert!(project
            .path()
            .join("Carthage/Build/iOS/Alamofire.framework/Alamofire")
            .is_file());
    }

    #[tokio::test]
    async fn resolved_change_triggers_rebuild() {
        let project = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_project(project.path());
        let config = config(project.path(), cache.path(), "bootstrap");
        let tools = FakeTools::new();

        execute_with(&config, &tools, &NoRemote).await.unwrap();
        std::fs::write(
            project.path().join("Cartfile.resolved"),
            "github \"Alamofire/Alamofire\" \"5.10.0\"",
        )
        .unwrap();

        let outcome = execute_with(&config, &tools, &NoRemote).await.unwrap();
        assert_eq!(outcome, RunOutcome::Built);
        assert_eq!(tools.builds(), 2);
    }

    #[tokio::test]
    async fn failed_build_is_not_cached() {
        let project = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_project(project.path());
        let config = config(project.path(), cache.path(), "bootstrap");
        let tools = FakeTools {
            build_exit: 1,
            ..FakeTools::new()
        };

        let err = execute_with(&config, &tools, &NoRemote).await.unwrap_err();
        assert!(matches!(err.root(), StepError::CommandExecution { .. }));
        assert!(!cache.path().join("state").exists());
        assert!(!cache.path().join("artifacts").exists());
    }

    #[tokio::test]
    async fn bad_version_output_stops_before_build() {
        let project = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_project(project.path());
        let config = config(project.path(), cache.path(), "bootstrap");
        let tools = FakeTools {
            carthage_version: "carthage: unknown",
            ..FakeTools::new()
        };

        let err = execute_with(&config, &tools, &NoRemote).await.unwrap_err();
        assert!(matches!(err.root(), StepError::VersionParse { .. }));
        assert!(err.to_string().starts_with("Failed to get carthage version"));
        assert_eq!(tools.builds(), 0);
    }

    #[tokio::test]
    async fn unbalanced_options_stop_before_build() {
        let project = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let mut config = config(project.path(), cache.path(), "bootstrap");
        config.carthage_options = "--platform \"iOS".to_string();
        let tools = FakeTools::new();

        let err = execute_with(&config, &tools, &NoRemote).await.unwrap_err();
        assert!(matches!(err.root(), StepError::OptionSyntax { .. }));
        assert_eq!(tools.builds(), 0);
    }

    #[tokio::test]
    async fn update_always_runs() {
        let project = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_project(project.path());
        let config = config(project.path(), cache.path(), "update");
        let tools = FakeTools::new();

        execute_with(&config, &tools, &NoRemote).await.unwrap();
        let outcome = execute_with(&config, &tools, &NoRemote).await.unwrap();

        assert_eq!(outcome, RunOutcome::Uncached);
        assert_eq!(tools.builds(), 2);
        assert!(!cache.path().join("state").exists());
    }
}
