//! xcconfig override resolution
//!
//! The override can come from the `xcconfig` input (a local path or an
//! http(s) URL) or from `XCODE_XCCONFIG_FILE` already set in the
//! environment. The input wins when both are present.

use crate::error::{StepError, StepResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Turns a user-supplied location into a readable local file
#[async_trait]
pub trait FileProvider: Send + Sync {
    async fn local_path(&self, location: &str) -> StepResult<PathBuf>;
}

/// Downloads http(s) locations into `download_dir`; local paths pass through
pub struct DownloadingFileProvider {
    download_dir: PathBuf,
}

impl DownloadingFileProvider {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }

    fn download_path(&self, url: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let hash = hex::encode(hasher.finalize());

        let name = url
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty() && !n.contains(['?', '#']))
            .unwrap_or("override.xcconfig");
        self.download_dir.join(format!("{}-{}", &hash[..12], name))
    }

    async fn download(&self, url: &str) -> StepResult<PathBuf> {
        info!("Downloading xcconfig from {}", url);

        let resolution_error = |reason: String| StepError::ConfigResolution {
            path: url.to_string(),
            reason,
        };

        let owned_url = url.to_string();
        let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ureq::Error> {
            let mut response = ureq::get(&owned_url).call()?;
            response.body_mut().read_to_vec()
        })
        .await
        .map_err(|e| resolution_error(format!("download task failed: {}", e)))?
        .map_err(|e| resolution_error(e.to_string()))?;

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| StepError::io("creating xcconfig download directory", e))?;

        let path = self.download_path(url);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StepError::io(format!("writing {}", path.display()), e))?;

        debug!("xcconfig saved to {}", path.display());
        Ok(path)
    }
}

impl Default for DownloadingFileProvider {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("carthage-step"))
    }
}

#[async_trait]
impl FileProvider for DownloadingFileProvider {
    async fn local_path(&self, location: &str) -> StepResult<PathBuf> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return self.download(location).await;
        }

        let local = location.strip_prefix("file://").unwrap_or(location);
        let path = Path::new(local);
        if !path.is_file() {
            return Err(StepError::ConfigResolution {
                path: location.to_string(),
                reason: "file does not exist".to_string(),
            });
        }
        Ok(path.to_path_buf())
    }
}

/// Chosen override plus any warnings produced while choosing it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XcconfigResolution {
    pub path: Option<PathBuf>,
    pub warnings: Vec<String>,
}

/// Pick the xcconfig override: the input first, the environment second
pub async fn resolve_xcconfig(
    from_input: Option<&str>,
    from_env: Option<&str>,
    provider: &dyn FileProvider,
) -> StepResult<XcconfigResolution> {
    let from_input = from_input.filter(|p| !p.is_empty());
    let from_env = from_env.filter(|p| !p.is_empty());

    let mut resolution = XcconfigResolution::default();

    if let Some(location) = from_input {
        resolution.path = Some(provider.local_path(location).await?);
    }

    if let Some(env_path) = from_env {
        if resolution.path.is_some() {
            resolution.warnings.push(
                "Both `xcconfig` input and `XCODE_XCCONFIG_FILE` are set. Using `xcconfig` input."
                    .to_string(),
            );
        } else {
            resolution.path = Some(PathBuf::from(env_path));
        }
    }

    Ok(resolution)
}
