//! Project fingerprinting for cache keys
//!
//! The fingerprint covers, in this fixed order: `Cartfile`,
//! `Cartfile.resolved`, the optional xcconfig override and the Swift
//! toolchain version text. Missing files are folded in as an "absent"
//! marker so a project without a lock file still gets a stable key.

use crate::cache::project::Project;
use crate::error::{StepError, StepResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Opaque cache key (hex SHA-256)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// First 12 hex chars, for log lines
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw inputs to a fingerprint; `None` means the input is absent
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintInputs<'a> {
    pub manifest: Option<&'a [u8]>,
    pub lock: Option<&'a [u8]>,
    pub xcconfig: Option<&'a [u8]>,
    pub toolchain: &'a str,
}

impl FingerprintInputs<'_> {
    /// Digest the inputs.
    ///
    /// Each section is tagged and length-prefixed, so moving bytes from one
    /// input to the next never produces the same digest.
    pub fn digest(&self) -> Fingerprint {
        let mut hasher = Sha256::new();

        for (tag, section) in [
            ("cartfile", self.manifest),
            ("cartfile.resolved", self.lock),
            ("xcconfig", self.xcconfig),
            ("swift", Some(self.toolchain.as_bytes())),
        ] {
            hasher.update(tag.as_bytes());
            match section {
                Some(bytes) => {
                    hasher.update([1u8]);
                    hasher.update((bytes.len() as u64).to_be_bytes());
                    hasher.update(bytes);
                }
                None => hasher.update([0u8]),
            }
        }

        Fingerprint(hex::encode(hasher.finalize()))
    }
}

/// Read a file, mapping "not found" to `None`
async fn read_optional(path: &Path) -> StepResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} not found, fingerprinting as absent", path.display());
            Ok(None)
        }
        Err(e) => Err(StepError::io(format!("reading {}", path.display()), e)),
    }
}

/// Fingerprint the project state.
///
/// A missing `Cartfile` or `Cartfile.resolved` is not an error. The xcconfig
/// override, when given, must be readable.
pub async fn build_fingerprint(
    project: &Project,
    swift_version: &str,
    xcconfig: Option<&Path>,
) -> StepResult<Fingerprint> {
    let manifest = read_optional(&project.cartfile_path()).await?;
    let lock = read_optional(&project.cartfile_resolved_path()).await?;

    let xcconfig = match xcconfig.filter(|p| !p.as_os_str().is_empty()) {
        Some(path) => Some(
            fs::read(path)
                .await
                .map_err(|e| StepError::io(format!("reading xcconfig {}", path.display()), e))?,
        ),
        None => None,
    };

    let fingerprint = FingerprintInputs {
        manifest: manifest.as_deref(),
        lock: lock.as_deref(),
        xcconfig: xcconfig.as_deref(),
        toolchain: swift_version,
    }
    .digest();

    debug!("Project fingerprint: {}", fingerprint);
    Ok(fingerprint)
}
