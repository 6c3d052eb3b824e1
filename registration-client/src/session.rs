use chrono::Utc;
use log::{info, warn};
use retreat_shared::session::{Session, SESSION_KEY};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session storage is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session storage lock poisoned")]
    Poisoned,
}

/// String key/value storage in the shape of browser local storage.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.remove(key);
        Ok(())
    }
}

/// Keeps every item in one JSON object on disk. A missing file is empty storage.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, items: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(items)?)?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut items = self.read_all()?;
        items.insert(key.to_string(), value.to_string());
        self.write_all(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut items = self.read_all()?;
        if items.remove(key).is_some() {
            self.write_all(&items)?;
        }
        Ok(())
    }
}

/// Reads and writes the signed-in session under [`SESSION_KEY`].
pub struct SessionManager<S> {
    storage: S,
}

impl<S: SessionStorage> SessionManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn save(&self, session: &Session) -> Result<(), StorageError> {
        let blob = serde_json::to_string(session)?;
        self.storage.set_item(SESSION_KEY, &blob)?;
        info!("Saved session for {}", session.user_id);
        Ok(())
    }

    /// The stored session, if there is a usable one.
    pub fn load(&self) -> Option<Session> {
        self.load_at(Utc::now().timestamp_millis())
    }

    /// Expired or unreadable sessions are removed from storage and reported as absent.
    pub fn load_at(&self, now_millis: i64) -> Option<Session> {
        let blob = match self.storage.get_item(SESSION_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not read stored session: {}", e);
                return None;
            }
        };

        let session = match serde_json::from_str::<Session>(&blob) {
            Ok(session) => session,
            Err(e) => {
                warn!("Discarding unreadable session: {}", e);
                self.discard();
                return None;
            }
        };

        if session.is_expired_at(now_millis) {
            info!("Session for {} has expired", session.user_id);
            self.discard();
            return None;
        }

        Some(session)
    }

    pub fn sign_out(&self) -> Result<(), StorageError> {
        self.storage.remove_item(SESSION_KEY)?;
        info!("Signed out");
        Ok(())
    }

    fn discard(&self) {
        if let Err(e) = self.storage.remove_item(SESSION_KEY) {
            warn!("Could not remove stored session: {}", e);
        }
    }
}
