//! Durable session storage
//!
//! The session store mirrors the current user into a named slot of a
//! [`SessionStorage`] backend. A slot holds an opaque string (the JSON
//! snapshot); an absent slot means "no session".

use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::RwLock,
};

use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error("Storage I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Slot name that cannot be mapped to a storage key.
    #[error("Invalid slot name: {0}")]
    InvalidSlot(String),

    /// Lock poisoned by a panicking writer.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for durable named-slot storage
pub trait SessionStorage: Send + Sync {
    /// Reads a slot.
    fn read(&self, slot: &str) -> StorageResult<Option<String>>;

    /// Writes a slot, replacing any previous value.
    fn write(&self, slot: &str, value: &str) -> StorageResult<()>;

    /// Removes a slot. Removing an absent slot succeeds.
    fn remove(&self, slot: &str) -> StorageResult<()>;

    /// Checks if a slot holds a value.
    fn contains(&self, slot: &str) -> StorageResult<bool> {
        Ok(self.read(slot)?.is_some())
    }
}

impl<T: SessionStorage + ?Sized> SessionStorage for std::sync::Arc<T> {
    fn read(&self, slot: &str) -> StorageResult<Option<String>> {
        (**self).read(slot)
    }

    fn write(&self, slot: &str, value: &str) -> StorageResult<()> {
        (**self).write(slot, value)
    }

    fn remove(&self, slot: &str) -> StorageResult<()> {
        (**self).remove(slot)
    }
}

/// In-memory storage (for testing and embedding)
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    slots: RwLock<HashMap<String, String>>,
}

impl MemorySessionStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage with one pre-populated slot
    pub fn with_slot(slot: impl Into<String>, value: impl Into<String>) -> Self {
        let mut slots = HashMap::new();
        slots.insert(slot.into(), value.into());
        Self {
            slots: RwLock::new(slots),
        }
    }
}

impl SessionStorage for MemorySessionStorage {
    fn read(&self, slot: &str) -> StorageResult<Option<String>> {
        let slots = self
            .slots
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        Ok(slots.get(slot).cloned())
    }

    fn write(&self, slot: &str, value: &str) -> StorageResult<()> {
        let mut slots = self
            .slots
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        slots.insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> StorageResult<()> {
        let mut slots = self
            .slots
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        slots.remove(slot);
        Ok(())
    }
}

/// File-backed storage: one `<slot>.json` file per slot in a directory
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    dir: PathBuf,
}

impl FileSessionStorage {
    /// Create a storage rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Returns the storage directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file backing `slot`
    pub fn slot_path(&self, slot: &str) -> StorageResult<PathBuf> {
        let valid = !slot.is_empty()
            && slot
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidSlot(slot.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", slot)))
    }
}

impl SessionStorage for FileSessionStorage {
    fn read(&self, slot: &str) -> StorageResult<Option<String>> {
        let path = self.slot_path(slot)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn write(&self, slot: &str, value: &str) -> StorageResult<()> {
        let path = self.slot_path(slot)?;
        let tmp = path.with_extension("json.tmp");

        let result = (|| -> io::Result<()> {
            // A leftover temp file would keep its old mode, so start fresh.
            match fs::remove_file(&tmp) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }

            let mut options = fs::OpenOptions::new();
            options.write(true).create_new(true);
            // Owner-only from the moment the file exists (Unix only)
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }

            let mut file = options.open(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;

            fs::rename(&tmp, &path)
        })();

        result.map_err(|source| {
            let _ = fs::remove_file(&tmp);
            StorageError::Io { path, source }
        })
    }

    fn remove(&self, slot: &str) -> StorageResult<()> {
        let path = self.slot_path(slot)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()), // Already removed
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}
