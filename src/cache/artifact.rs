//! Build artifact cache
//!
//! A payload is a copy of the project's build outputs plus a manifest
//! recording the fingerprint it was built for and a digest of every file.
//! A payload is only restorable when the manifest matches the current
//! fingerprint and every recorded file is still present and intact.
//!
//! # Layout
//!
//! ```text
//! <root>/<key>/payload.json
//! <root>/<key>/files/Carthage/Build/...
//! ```

use crate::cache::fingerprint::Fingerprint;
use crate::error::{StepError, StepResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const MANIFEST_FILE: &str = "payload.json";
const FILES_DIR: &str = "files";

/// Store of build-output payloads keyed by project
#[async_trait]
pub trait ArtifactCache: Send + Sync {
    /// Whether a payload for `key` built from `fingerprint` is present and intact
    async fn is_restorable(&self, key: &str, fingerprint: &Fingerprint) -> StepResult<bool>;

    /// Replace the declared `outputs` under `project_root` with the payload's
    /// files; returns the entry count
    async fn restore(
        &self,
        key: &str,
        project_root: &Path,
        outputs: &[PathBuf],
    ) -> StepResult<usize>;

    /// Replace the payload for `key` with the given outputs (relative to
    /// `project_root`); returns the entry count
    async fn register(
        &self,
        key: &str,
        fingerprint: &Fingerprint,
        project_root: &Path,
        outputs: &[PathBuf],
    ) -> StepResult<usize>;
}

/// One cached filesystem entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PayloadEntry {
    File {
        path: PathBuf,
        size: u64,
        sha256: String,
    },
    Symlink {
        path: PathBuf,
        target: PathBuf,
    },
}

impl PayloadEntry {
    pub fn path(&self) -> &Path {
        match self {
            Self::File { path, .. } | Self::Symlink { path, .. } => path,
        }
    }
}

/// Manifest stored next to the payload files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadManifest {
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<PayloadEntry>,
}

/// Payloads stored as plain directories under a root
pub struct DirArtifactCache {
    root: PathBuf,
}

impl DirArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn payload_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn staging_dir(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.staging", key))
    }
}

#[async_trait]
impl ArtifactCache for DirArtifactCache {
    async fn is_restorable(&self, key: &str, fingerprint: &Fingerprint) -> StepResult<bool> {
        let dir = self.payload_dir(key);
        let fingerprint = fingerprint.clone();
        blocking(move || Ok(verify_payload(&dir, &fingerprint))).await
    }

    async fn restore(
        &self,
        key: &str,
        project_root: &Path,
        outputs: &[PathBuf],
    ) -> StepResult<usize> {
        let dir = self.payload_dir(key);
        let root = project_root.to_path_buf();
        let outputs = outputs.to_vec();
        blocking(move || restore_payload(&dir, &root, &outputs)).await
    }

    async fn register(
        &self,
        key: &str,
        fingerprint: &Fingerprint,
        project_root: &Path,
        outputs: &[PathBuf],
    ) -> StepResult<usize> {
        let dir = self.payload_dir(key);
        let staging = self.staging_dir(key);
        let fingerprint = fingerprint.clone();
        let root = project_root.to_path_buf();
        let outputs = outputs.to_vec();
        blocking(move || register_payload(&dir, &staging, &fingerprint, &root, &outputs)).await
    }
}

async fn blocking<T, F>(f: F) -> StepResult<T>
where
    F: FnOnce() -> StepResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StepError::Internal(format!("artifact cache task failed: {}", e)))?
}

fn read_manifest(dir: &Path) -> StepResult<PayloadManifest> {
    let path = dir.join(MANIFEST_FILE);
    let content = fs::read_to_string(&path)
        .map_err(|e| StepError::io(format!("reading payload manifest {}", path.display()), e))?;
    Ok(serde_json::from_str(&content)?)
}

/// Relative, with no `..` or root components
fn is_contained(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn verify_payload(dir: &Path, fingerprint: &Fingerprint) -> bool {
    let manifest = match read_manifest(dir) {
        Ok(manifest) => manifest,
        Err(e) => {
            debug!("Payload at {} not usable: {}", dir.display(), e);
            return false;
        }
    };

    if &manifest.fingerprint != fingerprint {
        debug!(
            "Payload fingerprint {} does not match {}",
            manifest.fingerprint.short(),
            fingerprint.short()
        );
        return false;
    }

    if manifest.entries.is_empty() {
        debug!("Payload at {} is empty", dir.display());
        return false;
    }

    let files = dir.join(FILES_DIR);
    manifest.entries.iter().all(|entry| {
        if !is_contained(entry.path()) {
            debug!("Payload entry escapes project: {}", entry.path().display());
            return false;
        }
        let stored = files.join(entry.path());
        let intact = match entry {
            PayloadEntry::File { size, sha256, .. } => {
                fs::symlink_metadata(&stored).is_ok_and(|m| m.is_file() && m.len() == *size)
                    && hash_file(&stored).is_ok_and(|h| &h == sha256)
            }
            PayloadEntry::Symlink { target, .. } => {
                fs::read_link(&stored).is_ok_and(|t| &t == target)
            }
        };
        if !intact {
            debug!("Payload entry missing or damaged: {}", entry.path().display());
        }
        intact
    })
}

fn restore_payload(dir: &Path, project_root: &Path, outputs: &[PathBuf]) -> StepResult<usize> {
    let manifest = read_manifest(dir)?;
    let files = dir.join(FILES_DIR);

    // Stale outputs must not survive next to the restored ones
    for output in outputs {
        if !is_contained(output) {
            return Err(StepError::Internal(format!(
                "build output escapes project: {}",
                output.display()
            )));
        }
        remove_if_exists(&project_root.join(output))?;
    }

    for entry in &manifest.entries {
        if !is_contained(entry.path()) {
            return Err(StepError::Internal(format!(
                "payload entry escapes project: {}",
                entry.path().display()
            )));
        }

        let dest = project_root.join(entry.path());
        prepare_destination(&dest)?;

        match entry {
            PayloadEntry::File { path, .. } => {
                fs::copy(files.join(path), &dest)
                    .map_err(|e| StepError::io(format!("restoring {}", dest.display()), e))?;
            }
            PayloadEntry::Symlink { target, .. } => make_symlink(target, &dest)?,
        }
    }

    Ok(manifest.entries.len())
}

fn register_payload(
    dir: &Path,
    staging: &Path,
    fingerprint: &Fingerprint,
    project_root: &Path,
    outputs: &[PathBuf],
) -> StepResult<usize> {
    remove_if_exists(staging)?;
    let files = staging.join(FILES_DIR);
    fs::create_dir_all(&files)
        .map_err(|e| StepError::io(format!("creating {}", files.display()), e))?;

    let mut entries = Vec::new();
    for output in outputs {
        let source = project_root.join(output);
        if fs::symlink_metadata(&source).is_err() {
            debug!("Build output {} not present, skipping", source.display());
            continue;
        }

        for item in WalkDir::new(&source).sort_by_file_name() {
            let item = item.map_err(|e| {
                StepError::io(
                    format!("walking {}", source.display()),
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                )
            })?;

            let rel = item
                .path()
                .strip_prefix(project_root)
                .map_err(|_| {
                    StepError::Internal(format!("{} is outside the project", item.path().display()))
                })?
                .to_path_buf();
            let dest = files.join(&rel);
            let file_type = item.file_type();

            if file_type.is_dir() {
                continue;
            }
            prepare_destination(&dest)?;

            if file_type.is_symlink() {
                let target = fs::read_link(item.path())
                    .map_err(|e| StepError::io(format!("reading link {}", item.path().display()), e))?;
                make_symlink(&target, &dest)?;
                entries.push(PayloadEntry::Symlink { path: rel, target });
            } else {
                let size = fs::copy(item.path(), &dest)
                    .map_err(|e| StepError::io(format!("caching {}", item.path().display()), e))?;
                let sha256 = hash_file(&dest)
                    .map_err(|e| StepError::io(format!("hashing {}", dest.display()), e))?;
                entries.push(PayloadEntry::File {
                    path: rel,
                    size,
                    sha256,
                });
            }
        }
    }

    if entries.is_empty() {
        debug!("No build outputs to cache for {}", fingerprint.short());
        remove_if_exists(staging)?;
        remove_if_exists(dir)?;
        return Ok(0);
    }

    let manifest = PayloadManifest {
        fingerprint: fingerprint.clone(),
        created_at: Utc::now(),
        entries,
    };
    let manifest_path = staging.join(MANIFEST_FILE);
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .map_err(|e| StepError::io(format!("writing {}", manifest_path.display()), e))?;

    remove_if_exists(dir)?;
    fs::rename(staging, dir)
        .map_err(|e| StepError::io(format!("publishing payload {}", dir.display()), e))?;

    debug!(
        "Registered {} entries for {} at {}",
        manifest.entries.len(),
        fingerprint.short(),
        dir.display()
    );
    Ok(manifest.entries.len())
}

/// Ensure the parent exists and nothing occupies `dest`
fn prepare_destination(dest: &Path) -> StepResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StepError::io(format!("creating {}", parent.display()), e))?;
    }
    if let Ok(meta) = fs::symlink_metadata(dest) {
        let removed = if meta.is_dir() {
            fs::remove_dir_all(dest)
        } else {
            fs::remove_file(dest)
        };
        removed.map_err(|e| StepError::io(format!("replacing {}", dest.display()), e))?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> StepResult<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| StepError::io(format!("removing {}", path.display()), e))
}

#[cfg(unix)]
fn make_symlink(target: &Path, dest: &Path) -> StepResult<()> {
    std::os::unix::fs::symlink(target, dest)
        .map_err(|e| StepError::io(format!("linking {}", dest.display()), e))
}

#[cfg(not(unix))]
fn make_symlink(_target: &Path, dest: &Path) -> StepResult<()> {
    Err(StepError::Internal(format!(
        "symlinks are not supported on this platform: {}",
        dest.display()
    )))
}
