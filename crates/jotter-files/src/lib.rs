//! File-based storage implementation for jotter.
//!
//! Each key is one file holding the raw value:
//!
//! ```text
//! .jotter/
//!   .lock                    # Lock file for atomic operations
//!   entries/
//!     zenith-notes
//!     zenith-tasks
//!     zenith-pin
//! ```

use fs2::FileExt;
use jotter_core::{validate_key, Error, KeyValueStore};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const ENTRIES_DIR: &str = "entries";

/// File-based key-value store.
pub struct FilesStore {
    root: PathBuf,
}

impl FilesStore {
    /// Open a file-based store at the given .jotter directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join(ENTRIES_DIR))
            .map_err(|e| Error::Storage(format!("Failed to create entries dir: {}", e)))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Acquire an exclusive lock on the store.
    fn lock(&self) -> Result<FileLock, Error> {
        let lock_path = self.root.join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| Error::Storage(format!("Failed to open lock file: {}", e)))?;

        file.lock_exclusive()
            .map_err(|e| Error::Storage(format!("Failed to acquire lock: {}", e)))?;

        Ok(FileLock { file })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(ENTRIES_DIR).join(key)
    }

    /// Keys never start with '.', so a dotted temp name can't collide with one.
    fn temp_path(&self, key: &str) -> PathBuf {
        self.root.join(ENTRIES_DIR).join(format!(".{}.tmp", key))
    }

    /// Write an entry atomically: temp file, sync, rename.
    fn write_entry(&self, key: &str, value: &str) -> Result<(), Error> {
        let path = self.entry_path(key);
        let temp_path = self.temp_path(key);

        let mut file = File::create(&temp_path)
            .map_err(|e| Error::Storage(format!("Failed to create temp file: {}", e)))?;

        file.write_all(value.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to write temp file: {}", e)))?;

        file.sync_all()
            .map_err(|e| Error::Storage(format!("Failed to sync temp file: {}", e)))?;

        fs::rename(&temp_path, &path)
            .map_err(|e| Error::Storage(format!("Failed to rename temp file: {}", e)))?;

        Ok(())
    }

    /// File names in the entries directory, skipping temp and hidden files.
    fn list_keys(&self) -> Result<Vec<String>, Error> {
        let dir = self.root.join(ENTRIES_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Storage(format!("Failed to read entries dir: {}", e))),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| Error::Storage(format!("Failed to read dir entry: {}", e)))?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_key(name).is_ok() {
                    keys.push(name.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// RAII guard for file locking.
struct FileLock {
    file: File,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[async_trait::async_trait(?Send)]
impl KeyValueStore for FilesStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        validate_key(key)?;

        match fs::read_to_string(self.entry_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("Failed to read {}: {}", key, e))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        validate_key(key)?;
        let _lock = self.lock()?;

        self.write_entry(key, value)
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        validate_key(key)?;
        let _lock = self.lock()?;

        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Storage(format!("Failed to remove {}: {}", key, e))),
        }
    }

    async fn clear(&self) -> Result<(), Error> {
        let _lock = self.lock()?;

        let keys = self.list_keys()?;
        for key in &keys {
            match fs::remove_file(self.entry_path(key)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Storage(format!("Failed to remove {}: {}", key, e))),
            }
        }
        debug!(root = %self.root.display(), removed = keys.len(), "store cleared");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.list_keys()
    }
}
