use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::credential::Credential;

pub const DEFAULT_TOKEN_FILE: &str = "token.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("token store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize credential: {0}")]
    Serialize(#[from] serde_json::Error),
}

// Persistence seam for the active credential so tests can swap the token file
// for memory.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    /// Returns the stored credential, or `None` when nothing usable is stored.
    /// A corrupt record is discarded and reported as `None`.
    fn load(&self) -> Result<Option<Credential>, StoreError>;
    /// Overwrites whatever was stored before.
    fn save(&self, credential: &Credential) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Stores the credential as a single JSON record on disk.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>, StoreError> {
        let contents = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_slice::<Credential>(&contents) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "token file is corrupted, removing it"
                );
                self.clear()?;
                Ok(None)
            }
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(credential)?;
        std::fs::write(&self.path, json).map_err(|e| self.io_error(e))?;
        tracing::debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Keeps the credential in memory only. Holds the serialized form so corrupt
/// records can be simulated the same way a damaged token file would look.
#[derive(Default)]
pub struct MemoryCredentialStore {
    record: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            record: Mutex::new(Some(raw.into())),
        }
    }

    pub fn with_credential(credential: &Credential) -> Result<Self, StoreError> {
        Ok(Self::with_raw(serde_json::to_string(credential)?))
    }

    pub fn raw(&self) -> Option<String> {
        self.record.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credential>, StoreError> {
        let mut record = self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(raw) = record.as_deref() else {
            return Ok(None);
        };
        match serde_json::from_str::<Credential>(raw) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                tracing::warn!(error = %e, "stored credential is corrupted, discarding it");
                *record = None;
                Ok(None)
            }
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        let json = serde_json::to_string(credential)?;
        let mut record = self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *record = Some(json);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut record = self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *record = None;
        Ok(())
    }
}
