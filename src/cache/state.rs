//! Last-known cache state persistence

use crate::cache::fingerprint::Fingerprint;
use crate::error::{StepError, StepResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// The fingerprint recorded after the last successful bootstrap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Project-derived key this record belongs to
    pub key: String,

    /// Fingerprint of the inputs that produced the cached build
    pub fingerprint: Fingerprint,

    /// When the record was written
    pub updated_at: DateTime<Utc>,
}

impl PersistedState {
    pub fn new(key: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            key: key.into(),
            fingerprint,
            updated_at: Utc::now(),
        }
    }
}

/// Key/value store for [`PersistedState`] records
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the record for `key`; a missing or unparseable record is `Ok(None)`
    async fn load(&self, key: &str) -> StepResult<Option<PersistedState>>;

    /// Overwrite the record for `state.key`
    async fn save(&self, state: &PersistedState) -> StepResult<()>;
}

/// JSON files under `<dir>/<key>.json`
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn state_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, key: &str) -> StepResult<Option<PersistedState>> {
        let path = self.state_path(key);

        if !path.exists() {
            debug!("No persisted state at {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| StepError::io(format!("reading state file {}", path.display()), e))?;

        match serde_json::from_str::<PersistedState>(&content) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                debug!("Ignoring unreadable state {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    async fn save(&self, state: &PersistedState) -> StepResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StepError::io("creating state directory", e))?;

        let path = self.state_path(&state.key);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(state)?;

        fs::write(&tmp, content)
            .await
            .map_err(|e| StepError::io(format!("writing state file {}", tmp.display()), e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StepError::io(format!("replacing state file {}", path.display()), e))?;

        debug!("Persisted state {} -> {}", state.key, state.fingerprint.short());
        Ok(())
    }
}
