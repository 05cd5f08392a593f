//! Integration tests for carthage-step

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    pub(crate) fn step() -> Command {
        let mut cmd = cargo_bin_cmd!("carthage-step");
        for var in [
            "carthage_command",
            "carthage_options",
            "github_access_token",
            "xcconfig",
            "XCODE_XCCONFIG_FILE",
            "verbose_log",
            "CARTHAGE_STEP_CACHE_DIR",
            "BITRISE_SOURCE_DIR",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    #[test]
    fn help_displays() {
        step()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Carthage step with dependency build caching"));
    }

    #[test]
    fn version_displays() {
        step()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("carthage-step"));
    }

    #[test]
    fn missing_command_fails() {
        step()
            .assert()
            .failure()
            .stderr(predicate::str::contains("--carthage-command"));
    }

    #[test]
    fn help_hides_token_value() {
        step()
            .env("github_access_token", "ghp_do_not_print")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("ghp_do_not_print").not());
    }
}

#[cfg(unix)]
mod pipeline_tests {
    use super::cli_tests::step;
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const FAKE_CARTHAGE: &str = r#"#!/bin/sh
if [ "$1" = "version" ]; then
  echo "carthage version"
  echo "0.38.0"
  exit 0
fi
echo "$@" >> "$CALL_LOG"
mkdir -p Carthage/Build/iOS/Alamofire.framework
echo binary > Carthage/Build/iOS/Alamofire.framework/Alamofire
exit "${FAKE_CARTHAGE_EXIT:-0}"
"#;

    const FAKE_SWIFT: &str = r#"#!/bin/sh
echo "Apple Swift version 5.10 (swiftlang-5.10.0.13 clang-1500.3.9.4)"
echo "Target: arm64-apple-macosx14.0"
"#;

    struct Fixture {
        _root: TempDir,
        bin: PathBuf,
        project: PathBuf,
        cache: PathBuf,
        call_log: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let bin = root.path().join("bin");
            let project = root.path().join("project");
            let cache = root.path().join("cache");
            fs::create_dir_all(&bin).unwrap();
            fs::create_dir_all(&project).unwrap();

            write_script(&bin.join("carthage"), FAKE_CARTHAGE);
            write_script(&bin.join("swift"), FAKE_SWIFT);

            fs::write(project.join("Cartfile"), "github \"Alamofire/Alamofire\" ~> 5.0").unwrap();
            fs::write(
                project.join("Cartfile.resolved"),
                "github \"Alamofire/Alamofire\" \"5.9.1\"",
            )
            .unwrap();

            Self {
                call_log: root.path().join("calls.log"),
                _root: root,
                bin,
                project,
                cache,
            }
        }

        fn command(&self, carthage_command: &str) -> Command {
            let path = std::env::var_os("PATH").unwrap_or_default();
            let mut dirs = vec![self.bin.clone()];
            dirs.extend(std::env::split_paths(&path));

            let mut cmd = step();
            cmd.current_dir(&self.project)
                .env("PATH", std::env::join_paths(dirs).unwrap())
                .env("carthage_command", carthage_command)
                .env("carthage_options", "--platform iOS")
                .env("BITRISE_SOURCE_DIR", &self.project)
                .env("CARTHAGE_STEP_CACHE_DIR", &self.cache)
                .env("CALL_LOG", &self.call_log);
            cmd
        }

        fn calls(&self) -> usize {
            fs::read_to_string(&self.call_log)
                .map(|s| s.lines().count())
                .unwrap_or(0)
        }
    }

    fn write_script(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn bootstrap_miss_then_hit() {
        let fx = Fixture::new();

        fx.command("bootstrap")
            .assert()
            .success()
            .stdout(predicate::str::contains("CarthageVersion: 0.38.0"))
            .stdout(predicate::str::contains("Cache miss"));
        assert_eq!(fx.calls(), 1);

        fs::remove_dir_all(fx.project.join("Carthage")).unwrap();

        fx.command("bootstrap")
            .assert()
            .success()
            .stdout(predicate::str::contains("Using cached dependencies"));
        assert_eq!(fx.calls(), 1);
        assert!(fx
            .project
            .join("Carthage/Build/iOS/Alamofire.framework/Alamofire")
            .is_file());
    }

    #[test]
    fn hit_replaces_stale_outputs() {
        let fx = Fixture::new();
        fx.command("bootstrap").assert().success();

        let stale = fx.project.join("Carthage/Build/iOS/Stale.framework");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("Stale"), "old").unwrap();

        fx.command("bootstrap")
            .assert()
            .success()
            .stdout(predicate::str::contains("Using cached dependencies"));
        assert_eq!(fx.calls(), 1);
        assert!(!stale.exists());
        assert!(fx
            .project
            .join("Carthage/Build/iOS/Alamofire.framework/Alamofire")
            .is_file());
    }

    #[test]
    fn failed_bootstrap_exits_non_zero_and_caches_nothing() {
        let fx = Fixture::new();

        fx.command("bootstrap")
            .env("FAKE_CARTHAGE_EXIT", "1")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Running carthage"))
            .stderr(predicate::str::contains("exit code 1"));

        assert_eq!(fx.calls(), 1);
        assert!(!fx.cache.join("state").exists());
    }

    #[test]
    fn update_is_never_cached() {
        let fx = Fixture::new();

        fx.command("update").assert().success();
        fx.command("update").assert().success();

        assert_eq!(fx.calls(), 2);
    }

    #[test]
    fn token_is_passed_but_not_printed() {
        let fx = Fixture::new();

        fx.command("bootstrap")
            .env("github_access_token", "ghp_secret_value")
            .assert()
            .success()
            .stdout(predicate::str::contains("ghp_secret_value").not());
    }

    #[test]
    fn unbalanced_options_fail() {
        let fx = Fixture::new();

        fx.command("bootstrap")
            .env("carthage_options", "--platform \"iOS")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse carthage options"));
        assert_eq!(fx.calls(), 0);
    }

    #[test]
    fn missing_carthage_gives_hint() {
        let fx = Fixture::new();
        let empty = TempDir::new().unwrap();

        fx.command("bootstrap")
            .env("PATH", empty.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Install Carthage"));
    }

    #[test]
    fn both_xcconfig_sources_warn() {
        let fx = Fixture::new();
        let input = fx.project.join("input.xcconfig");
        fs::write(&input, "ONLY_ACTIVE_ARCH = YES").unwrap();

        fx.command("bootstrap")
            .env("xcconfig", &input)
            .env("XCODE_XCCONFIG_FILE", "/nonexistent/env.xcconfig")
            .assert()
            .success()
            .stdout(predicate::str::contains("Using `xcconfig` input"));
    }
}
