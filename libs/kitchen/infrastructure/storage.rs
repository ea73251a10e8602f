//! Local device state
//!
//! A device identity and an opaque settings blob kept in one JSON file next
//! to the binary. Losing it only means pairing again.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to access state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoredState {
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    settings: Value,
}

#[derive(Debug)]
pub struct LocalState {
    path: PathBuf,
    state: StoredState,
}

impl LocalState {
    /// Open the state file, starting empty when it is missing or unreadable
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring corrupt state file {}: {}", path.display(), e);
                StoredState::default()
            }),
            Err(_) => {
                debug!("No state file at {}, starting fresh", path.display());
                StoredState::default()
            }
        };
        Self { path, state }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn device_id(&self) -> Option<&str> {
        self.state.device_id.as_deref()
    }

    pub fn set_device_id(&mut self, device_id: impl Into<String>) -> Result<()> {
        self.state.device_id = Some(device_id.into());
        self.save()
    }

    pub fn settings(&self) -> &Value {
        &self.state.settings
    }

    pub fn set_settings(&mut self, settings: Value) -> Result<()> {
        self.state.settings = settings;
        self.save()
    }

    /// Forget the device (after unpairing) and persist
    pub fn clear(&mut self) -> Result<()> {
        self.state = StoredState::default();
        self.save()
    }

    /// Write through a temp file so a crash never leaves half a file
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&self.state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
