//! Access-token lifecycle.
//!
//! The token lives in memory behind a shared handle and is mirrored to a
//! [`SessionStorage`] so that a restart within the same login session keeps
//! the user authenticated. A 401 from any authenticated call clears both.

use std::fmt;
use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::RepodropError;

pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<String>, RepodropError>;
    fn save(&self, token: &str) -> Result<(), RepodropError>;
    fn remove(&self) -> Result<(), RepodropError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    token: String,
    created_at: DateTime<Utc>,
}

/// Session slot stored as a small JSON file, preferably in the per-user
/// runtime directory, which is wiped at logout/reboot on most systems.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: Utf8PathBuf,
}

impl FileSessionStorage {
    pub fn new() -> Result<Self, RepodropError> {
        let base = BaseDirs::new()
            .and_then(|dirs| {
                let dir = dirs
                    .runtime_dir()
                    .map(|dir| dir.to_path_buf())
                    .unwrap_or_else(|| dirs.cache_dir().to_path_buf());
                Utf8PathBuf::from_path_buf(dir.join("repodrop")).ok()
            })
            .ok_or_else(|| {
                RepodropError::SessionStorage("unable to resolve session directory".to_string())
            })?;
        Ok(Self::new_with_path(base.join("session.json")))
    }

    pub fn new_with_path(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<String>, RepodropError> {
        if !self.path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|err| RepodropError::SessionStorage(format!("{}: {err}", self.path)))?;
        let file: SessionFile = serde_json::from_str(&content)
            .map_err(|err| RepodropError::SessionStorage(format!("{}: {err}", self.path)))?;
        let token = file.token.trim().to_string();
        Ok((!token.is_empty()).then_some(token))
    }

    fn save(&self, token: &str) -> Result<(), RepodropError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| RepodropError::SessionStorage(format!("{}: no parent", self.path)))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| RepodropError::SessionStorage(err.to_string()))?;

        let payload = SessionFile {
            token: token.to_string(),
            created_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&payload)
            .map_err(|err| RepodropError::SessionStorage(err.to_string()))?;

        let mut temp = NamedTempFile::new_in(parent.as_std_path())
            .map_err(|err| RepodropError::SessionStorage(err.to_string()))?;
        temp.write_all(&bytes)
            .map_err(|err| RepodropError::SessionStorage(err.to_string()))?;
        restrict_permissions(temp.as_file())?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| RepodropError::SessionStorage(err.to_string()))?;
        Ok(())
    }

    fn remove(&self) -> Result<(), RepodropError> {
        match fs::remove_file(self.path.as_std_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RepodropError::SessionStorage(err.to_string())),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> Result<(), RepodropError> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
        .map_err(|err| RepodropError::SessionStorage(err.to_string()))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> Result<(), RepodropError> {
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    slot: Mutex<Option<String>>,
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<String>, RepodropError> {
        Ok(self.slot.lock().ok().and_then(|slot| slot.clone()))
    }

    fn save(&self, token: &str) -> Result<(), RepodropError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(token.to_string());
        }
        Ok(())
    }

    fn remove(&self) -> Result<(), RepodropError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
        Ok(())
    }
}

/// Shared handle to the current access token. Clones observe the same slot.
#[derive(Clone)]
pub struct Session {
    token: Arc<Mutex<Option<String>>>,
    storage: Arc<dyn SessionStorage>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl Session {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            token: Arc::new(Mutex::new(None)),
            storage,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStorage::default()))
    }

    /// Restores a previously stored token. An unreadable slot counts as
    /// logged out.
    pub fn restore(storage: Arc<dyn SessionStorage>) -> Self {
        let session = Self::new(storage);
        match session.storage.load() {
            Ok(Some(token)) => {
                if let Ok(mut slot) = session.token.lock() {
                    *slot = Some(token);
                }
                tracing::debug!("restored session token");
            }
            Ok(None) => {}
            Err(err) => tracing::warn!("ignoring unreadable session: {err}"),
        }
        session
    }

    pub fn set(&self, token: &str) -> Result<(), RepodropError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(RepodropError::MissingToken);
        }
        self.storage.save(token)?;
        if let Ok(mut slot) = self.token.lock() {
            *slot = Some(token.to_string());
        }
        tracing::info!("session token stored");
        Ok(())
    }

    pub fn get(&self) -> Option<String> {
        self.token.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn require(&self) -> Result<String, RepodropError> {
        self.get().ok_or(RepodropError::MissingToken)
    }

    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = None;
        }
        if let Err(err) = self.storage.remove() {
            tracing::warn!("failed to remove stored session: {err}");
        }
        tracing::info!("session cleared");
    }
}
