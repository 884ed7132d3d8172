//! Persisted credential: the auth token and the serialised user record.

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{error::StoreError, models::User};

/// Storage key holding the opaque bearer token.
pub const TOKEN_KEY: &str = "authToken";
/// Storage key holding the serialised user record.
pub const USER_KEY: &str = "user";

/// Durable key-value storage for the session credential.
///
/// Token and user are written and cleared together. Reads never fail: an unreadable
/// store is reported as holding nothing.
pub trait CredentialStore: Send + Sync {
    /// Current token, if one is stored.
    fn token(&self) -> Option<String>;
    /// Stored user record, if present and decodable.
    fn user(&self) -> Option<User>;
    /// Persist a fresh credential, replacing whatever was stored.
    fn save(&self, token: &str, user: &User) -> Result<(), StoreError>;
    /// Remove both keys. Clearing an empty store is a no-op.
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-process store, used for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryCredentialStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token only, as left behind by an earlier run.
    pub fn with_token(token: &str) -> Self {
        let store = Self::new();
        store
            .entries
            .lock()
            .insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<String> {
        self.entries
            .lock()
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn user(&self) -> Option<User> {
        let entries = self.entries.lock();
        let raw = entries.get(USER_KEY)?.clone();
        serde_json::from_value(raw).ok()
    }

    fn save(&self, token: &str, user: &User) -> Result<(), StoreError> {
        let user = serde_json::to_value(user)?;
        let mut entries = self.entries.lock();
        entries.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        entries.insert(USER_KEY.to_string(), user);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.remove(TOKEN_KEY);
        entries.remove(USER_KEY);
        Ok(())
    }
}

/// JSON file store living next to the configuration.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Store backed by the given file. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> BTreeMap<String, Value> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "failed to read credential file");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "ignoring corrupt credential file");
                BTreeMap::new()
            }
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;

        let serialised = serde_json::to_vec_pretty(entries)?;
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = NamedTempFile::new_in(parent).map_err(io_err)?;
        file.write_all(&serialised).map_err(io_err)?;
        file.persist(&self.path).map_err(|err| io_err(err.error))?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn token(&self) -> Option<String> {
        let _guard = self.lock.lock();
        self.read_entries()
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn user(&self) -> Option<User> {
        let _guard = self.lock.lock();
        let raw = self.read_entries().remove(USER_KEY)?;
        match serde_json::from_value(raw) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(%err, "stored user record is unreadable");
                None
            }
        }
    }

    fn save(&self, token: &str, user: &User) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut entries = self.read_entries();
        entries.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        entries.insert(USER_KEY.to_string(), serde_json::to_value(user)?);
        self.write_entries(&entries)?;
        debug!(path = %self.path.display(), user_id = user.id, "credential saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut entries = self.read_entries();
        let had_token = entries.remove(TOKEN_KEY).is_some();
        let had_user = entries.remove(USER_KEY).is_some();
        if !had_token && !had_user {
            return Ok(());
        }
        self.write_entries(&entries)?;
        debug!(path = %self.path.display(), "credential cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use anyhow::Result;
    use tempfile::tempdir;

    fn sample_user() -> User {
        User {
            id: 42,
            name: "Nimal".to_string(),
            email: "nimal@example.lk".to_string(),
            role: Role::Customer,
            is_verified: Some(true),
            created_at: None,
            total_bookings: None,
        }
    }

    #[test]
    fn file_store_persists_and_clears_both_keys() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("busbook").join("credentials.json");
        let store = FileCredentialStore::new(&path);
        assert!(store.token().is_none());
        assert!(store.user().is_none());

        store.save("tok-123", &sample_user())?;
        assert!(path.exists());

        let reopened = FileCredentialStore::new(&path);
        assert_eq!(reopened.token().as_deref(), Some("tok-123"));
        assert_eq!(reopened.user(), Some(sample_user()));

        reopened.clear()?;
        assert!(reopened.token().is_none());
        assert!(reopened.user().is_none());

        reopened.clear()?;
        assert!(store.token().is_none());
        Ok(())
    }

    #[test]
    fn corrupt_file_reads_as_empty() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{not json")?;
        let store = FileCredentialStore::new(&path);
        assert!(store.token().is_none());

        store.save("fresh", &sample_user())?;
        assert_eq!(store.token().as_deref(), Some("fresh"));
        Ok(())
    }

    #[test]
    fn memory_store_clear_is_idempotent() -> Result<()> {
        let store = MemoryCredentialStore::with_token("seed");
        assert_eq!(store.token().as_deref(), Some("seed"));
        assert!(store.user().is_none());

        store.clear()?;
        store.clear()?;
        assert!(store.token().is_none());
        Ok(())
    }
}
