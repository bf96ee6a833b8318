//! Versioned state blob
//!
//! The whole radar state (tracks, volume history, recent snapshots) is saved
//! as one JSON document so a restart resumes where the last run stopped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::domain::PersistenceTrack;
use crate::error::{RadarError, Result};
use crate::strategy::VolumeSample;
use crate::tracking::CandidateSnapshot;

/// Bumped whenever the persisted layout changes incompatibly
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub tracks: HashMap<String, PersistenceTrack>,
    #[serde(default)]
    pub volume_history: HashMap<String, Vec<VolumeSample>>,
    #[serde(default)]
    pub snapshots: Vec<CandidateSnapshot>,
}

impl PersistedState {
    pub fn empty(saved_at: DateTime<Utc>) -> Self {
        Self {
            version: STATE_VERSION,
            saved_at,
            tracks: HashMap::new(),
            volume_history: HashMap::new(),
            snapshots: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.volume_history.is_empty() && self.snapshots.is_empty()
    }
}

/// Key/value style store for the state blob
#[async_trait]
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing usable is stored
    async fn load(&self) -> Result<Option<PersistedState>>;

    async fn save(&self, state: &PersistedState) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    fn name(&self) -> &str {
        "StateStore"
    }
}

/// JSON file on local disk, written through a temp file and renamed into place
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<Option<PersistedState>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No persisted state");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let state: PersistedState = serde_json::from_slice(&bytes)?;
        if state.version != STATE_VERSION {
            warn!(
                found = state.version,
                expected = STATE_VERSION,
                "Discarding persisted state with unsupported version"
            );
            return Ok(None);
        }

        info!(
            tracks = state.tracks.len(),
            snapshots = state.snapshots.len(),
            saved_at = %state.saved_at,
            "Loaded persisted state"
        );
        Ok(Some(state))
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        if state.version != STATE_VERSION {
            return Err(RadarError::StateVersion {
                found: state.version,
                expected: STATE_VERSION,
            });
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    RadarError::Persistence(format!("create {}: {e}", parent.display()))
                })?;
            }
        }

        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| RadarError::Persistence(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            RadarError::Persistence(format!("replace {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), tracks = state.tracks.len(), "Saved state");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "JsonFileStore"
    }
}

/// Store that keeps nothing; used when persistence is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

#[async_trait]
impl StateStore for NullStore {
    async fn load(&self) -> Result<Option<PersistedState>> {
        Ok(None)
    }

    async fn save(&self, _state: &PersistedState) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "NullStore"
    }
}
