//! JSON-document storage backend.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use billdesk_core::StorageBackend;
use billdesk_core::error::StorageError;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout of the session file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionDocument {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// Storage backend that keeps every key in one JSON file.
///
/// Writes are read-modify-write cycles under an exclusive lock on a sibling
/// `.lock` file, land in a temporary file first and are renamed into place.
/// On Unix the session file is restricted to the owner (`0600`).
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend storing its document at `path`.
    ///
    /// The file and its parent directory are created on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the session file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn open_lock(&self) -> Result<File, StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;
        Ok(lock)
    }

    fn load(&self) -> Result<SessionDocument, StorageError> {
        if !self.path.exists() {
            return Ok(SessionDocument::default());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(SessionDocument::default());
        }

        serde_json::from_str(&content).map_err(|e| StorageError::Malformed {
            key: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn save(&self, mut document: SessionDocument) -> Result<(), StorageError> {
        document.version = DOCUMENT_VERSION;
        document.updated_at = Some(Utc::now());

        let content =
            serde_json::to_string_pretty(&document).map_err(|e| StorageError::Serialize {
                key: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content)?;

        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&temp_path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&temp_path, perms)?;
        }

        fs::rename(&temp_path, &self.path)?;
        trace!(path = %self.path.display(), "Session file written");
        Ok(())
    }

    /// Apply `change` to the document while holding the write lock.
    fn update<F>(&self, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let lock = self.open_lock()?;
        lock.lock_exclusive()?;

        // A corrupt document is replaced rather than blocking every write.
        let mut document = match self.load() {
            Ok(document) => document,
            Err(e) => {
                debug!(error = %e, "Discarding unreadable session file");
                SessionDocument::default()
            }
        };

        let result = if change(&mut document.entries) {
            self.save(document)
        } else {
            Ok(())
        };

        lock.unlock()?;
        result
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let lock = self.open_lock()?;
        lock.lock_shared()?;
        let document = self.load();
        lock.unlock()?;

        Ok(document?.entries.get(key).cloned())
    }

    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|entries| entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("session.json"));
        assert_eq!(backend.get("authUser").unwrap(), None);
        backend.remove("authUser").unwrap();
        assert!(!backend.path().exists());
    }

    #[test]
    fn set_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("nested/deeper/session.json"));
        backend.set("authToken", "abc").unwrap();
        assert_eq!(backend.get("authToken").unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn corrupt_file_is_a_malformed_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{{{").unwrap();

        let backend = FileBackend::new(&path);
        assert!(matches!(
            backend.get("authUser"),
            Err(StorageError::Malformed { .. })
        ));

        // The next write replaces the corrupt document.
        backend.set("authUser", "{}").unwrap();
        assert_eq!(backend.get("authUser").unwrap().as_deref(), Some("{}"));
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("session.json"));
        backend.set("authToken", "abc").unwrap();

        let mode = fs::metadata(backend.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
