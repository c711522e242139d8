//! Data directory discovery and backend selection.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use jotter_core::{Error, KeyValueStore};
use jotter_files::FilesStore;
use jotter_sqlite::SqliteStore;
use std::fs;
use std::path::{Path, PathBuf};

pub const JOTTER_DIR: &str = ".jotter";
const BACKEND_FILE: &str = "backend";
const SQLITE_FILE: &str = "jotter.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Backend {
    #[default]
    Files,
    Sqlite,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Files => "files",
            Backend::Sqlite => "sqlite",
        }
    }

    /// Backend recorded by `jotter init`, if any.
    pub fn recorded(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(BACKEND_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match raw.trim() {
            "files" => Ok(Some(Backend::Files)),
            "sqlite" => Ok(Some(Backend::Sqlite)),
            other => bail!("Unknown backend {:?} recorded in {}", other, path.display()),
        }
    }

    pub fn record(self, dir: &Path) -> Result<()> {
        let path = dir.join(BACKEND_FILE);
        fs::write(&path, format!("{}\n", self.as_str()))
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// An explicit choice wins, then whatever `init` recorded.
    pub fn resolve(explicit: Option<Self>, dir: &Path) -> Result<Self> {
        match explicit {
            Some(backend) => Ok(backend),
            None => Ok(Self::recorded(dir)?.unwrap_or_default()),
        }
    }
}

/// Find the .jotter directory by searching up from `start`.
pub fn find_jotter_dir(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let jotter_path = current.join(JOTTER_DIR);
        if jotter_path.is_dir() {
            return Some(jotter_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Get the data directory, or error if not initialized.
pub fn get_jotter_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        if !dir.is_dir() {
            bail!("Data directory {} does not exist", dir.display());
        }
        return Ok(dir.to_path_buf());
    }

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    match find_jotter_dir(&cwd) {
        Some(dir) => Ok(dir),
        None => bail!("No .jotter directory found. Run 'jotter init' to create one."),
    }
}

/// Whether `dir` already holds an initialized store.
pub fn is_initialized(dir: &Path) -> bool {
    dir.join(BACKEND_FILE).exists() || dir.join("entries").exists() || dir.join(SQLITE_FILE).exists()
}

/// Either durable store, chosen at runtime.
pub enum AnyStore {
    Files(FilesStore),
    Sqlite(SqliteStore),
}

impl AnyStore {
    pub fn open(dir: &Path, backend: Backend) -> Result<Self> {
        let store = match backend {
            Backend::Files => AnyStore::Files(
                FilesStore::open(dir).context("Failed to open file store")?,
            ),
            Backend::Sqlite => AnyStore::Sqlite(
                SqliteStore::open(dir.join(SQLITE_FILE)).context("Failed to open SQLite store")?,
            ),
        };
        Ok(store)
    }
}

#[async_trait::async_trait(?Send)]
impl KeyValueStore for AnyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        match self {
            AnyStore::Files(s) => s.get(key).await,
            AnyStore::Sqlite(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        match self {
            AnyStore::Files(s) => s.set(key, value).await,
            AnyStore::Sqlite(s) => s.set(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        match self {
            AnyStore::Files(s) => s.remove(key).await,
            AnyStore::Sqlite(s) => s.remove(key).await,
        }
    }

    async fn clear(&self) -> Result<(), Error> {
        match self {
            AnyStore::Files(s) => s.clear().await,
            AnyStore::Sqlite(s) => s.clear().await,
        }
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        match self {
            AnyStore::Files(s) => s.keys().await,
            AnyStore::Sqlite(s) => s.keys().await,
        }
    }
}
