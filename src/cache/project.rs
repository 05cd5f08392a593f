//! Carthage project layout and identity

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Dependency manifest
pub const CARTFILE: &str = "Cartfile";

/// Resolved dependency versions
pub const CARTFILE_RESOLVED: &str = "Cartfile.resolved";

/// Build outputs directory, relative to the project root
pub const BUILD_DIR: &str = "Carthage/Build";

/// A Carthage project, identified by its root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Create a project handle.
    ///
    /// Relative paths are anchored at the current directory so the state key
    /// does not depend on how the directory was spelled.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&root))
                .unwrap_or(root)
        };
        Self {
            root: normalize(&root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cartfile_path(&self) -> PathBuf {
        self.root.join(CARTFILE)
    }

    pub fn cartfile_resolved_path(&self) -> PathBuf {
        self.root.join(CARTFILE_RESOLVED)
    }

    /// Build outputs registered into the artifact cache, relative to the root
    pub fn build_outputs(&self) -> Vec<PathBuf> {
        vec![PathBuf::from(BUILD_DIR)]
    }

    /// Stable key for persisted state: `carthage-{first 12 hex chars of sha256(root)}`
    pub fn state_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.root.to_string_lossy().as_bytes());
        let hash = hex::encode(hasher.finalize());
        format!("carthage-{}", &hash[..12])
    }
}

/// Lexically drop `.` components and fold `..` so equivalent spellings share a key
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
