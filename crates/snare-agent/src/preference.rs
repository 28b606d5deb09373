//! User preference
//!
//! A single persisted boolean: the user switched monitoring off.
//! Missing or unreadable storage reads as `false`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

/// Preference write errors
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Storage for the user-disabled flag.
pub trait Preference: Send + Sync {
    fn load(&self) -> bool;

    fn store(&self, user_disabled: bool) -> Result<(), PreferenceError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Stored {
    user_disabled: bool,
}

/// JSON file under the data directory
#[derive(Debug, Clone)]
pub struct FilePreference {
    path: PathBuf,
}

impl FilePreference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/snare/preferences.json`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("snare")
            .join("preferences.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FilePreference {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl Preference for FilePreference {
    fn load(&self) -> bool {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No preference at {:?}: {}", self.path, e);
                return false;
            }
        };
        match serde_json::from_str::<Stored>(&content) {
            Ok(stored) => stored.user_disabled,
            Err(e) => {
                warn!("Unreadable preference {:?}: {}", self.path, e);
                false
            }
        }
    }

    fn store(&self, user_disabled: bool) -> Result<(), PreferenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(&Stored { user_disabled })?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// In-process only; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryPreference(AtomicBool);

impl MemoryPreference {
    pub fn new(user_disabled: bool) -> Self {
        Self(AtomicBool::new(user_disabled))
    }
}

impl Preference for MemoryPreference {
    fn load(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn store(&self, user_disabled: bool) -> Result<(), PreferenceError> {
        self.0.store(user_disabled, Ordering::SeqCst);
        Ok(())
    }
}
