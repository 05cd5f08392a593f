//! Custom carthage option handling

use crate::carthage::PROJECT_DIRECTORY_FLAG;
use crate::error::{StepError, StepResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Split a raw option string with POSIX shell quoting rules.
///
/// An empty or all-whitespace string yields no tokens.
pub fn parse_options(raw: &str) -> StepResult<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    shlex::split(raw).ok_or_else(|| StepError::OptionSyntax {
        options: raw.to_string(),
    })
}

/// Effective project directory after honouring `--project-directory <dir>`.
///
/// Only the first occurrence counts. A trailing flag with no value keeps the
/// default. The option is not removed from `options`; carthage needs it too.
pub fn resolve_project_directory(default_dir: &Path, options: &[String]) -> PathBuf {
    let Some(idx) = options.iter().position(|o| o == PROJECT_DIRECTORY_FLAG) else {
        return default_dir.to_path_buf();
    };

    match options.get(idx + 1) {
        Some(dir) => {
            info!("{} flag found with value: {}", PROJECT_DIRECTORY_FLAG, dir);
            info!("using {} as working directory", dir);
            PathBuf::from(dir)
        }
        None => default_dir.to_path_buf(),
    }
}
