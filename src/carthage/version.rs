//! Toolchain version probes

use crate::carthage::{CARTHAGE_BIN, SWIFT_BIN};
use crate::error::{StepError, StepResult};
use crate::process::{Invocation, ProcessExecutor};
use semver::{BuildMetadata, Prerelease, Version};

/// Run `command args` and return the first output line that parses as a version.
///
/// Lines are scanned in order; the first match wins even if later lines
/// also parse. Tools like carthage print banners or update notices before
/// the version itself.
pub async fn probe_version(
    executor: &dyn ProcessExecutor,
    command: &str,
    args: &[&str],
) -> StepResult<Version> {
    let invocation = Invocation::new(command, args.iter().copied());
    let output = executor
        .execute(&invocation)
        .await?
        .into_result(&invocation)?;
    let output = output.trim();

    output
        .lines()
        .find_map(parse_version_line)
        .ok_or_else(|| StepError::VersionParse {
            command: invocation.command_line(),
            output: output.to_string(),
        })
}

/// `carthage version`
pub async fn probe_carthage_version(executor: &dyn ProcessExecutor) -> StepResult<Version> {
    probe_version(executor, CARTHAGE_BIN, &["version"]).await
}

/// `swift -version`, returned verbatim (trimmed).
///
/// Swift prints a multi-line banner with compiler and target details that
/// is not a semantic version, so the whole text is the identity.
pub async fn probe_swift_version(executor: &dyn ProcessExecutor) -> StepResult<String> {
    let invocation = Invocation::new(SWIFT_BIN, ["-version"]);
    let output = executor
        .execute(&invocation)
        .await?
        .into_result(&invocation)?;
    Ok(output.trim().to_string())
}

/// Parse one line leniently.
///
/// Accepts a leading `v`, leading zeros, and any number of numeric segments:
/// missing minor/patch default to 0 and segments past the third are kept as
/// build metadata (`0.38.0.1` becomes `0.38.0+1`).
fn parse_version_line(line: &str) -> Option<Version> {
    let line = line.trim();
    let line = line.strip_prefix('v').unwrap_or(line);
    if line.is_empty() {
        return None;
    }

    if let Ok(version) = Version::parse(line) {
        return Some(version);
    }

    let (core, rest) = match line.find(['-', '+']) {
        Some(idx) => line.split_at(idx),
        None => (line, ""),
    };
    let segments = core
        .split('.')
        .map(|p| {
            if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            p.parse::<u64>().ok()
        })
        .collect::<Option<Vec<u64>>>()?;

    let segment = |i: usize| segments.get(i).copied().unwrap_or(0);
    let mut version = Version::new(segment(0), segment(1), segment(2));

    let (pre, build) = match rest.split_once('+') {
        Some((pre, build)) => (pre, Some(build)),
        None => (rest, None),
    };
    if let Some(pre) = pre.strip_prefix('-') {
        version.pre = Prerelease::new(pre).ok()?;
    } else if !pre.is_empty() {
        return None;
    }

    let mut metadata: Vec<String> = segments.iter().skip(3).map(u64::to_string).collect();
    if let Some(build) = build {
        metadata.push(build.to_string());
    }
    if !metadata.is_empty() {
        version.build = BuildMetadata::new(&metadata.join(".")).ok()?;
    }
    Some(version)
}
