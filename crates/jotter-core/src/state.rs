//! Authoritative in-memory state and its write-through to a [`KeyValueStore`].

use crate::keys::{KeyLayout, Slot};
use crate::{Error, KeyValueStore, Note, Passcode, Task};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Grid or list presentation of the note list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    List,
    Grid,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::List => "list",
            ViewMode::Grid => "grid",
        }
    }

    /// Anything other than `"grid"` reads as list.
    pub fn from_stored(value: &str) -> Self {
        if value == "grid" {
            ViewMode::Grid
        } else {
            ViewMode::List
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub view: ViewMode,
    /// Hide the Locked category and keep locked notes out of general views.
    pub hide_locked: bool,
    pub passcode: Option<Passcode>,
}

/// Everything that is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Newest first.
    pub notes: Vec<Note>,
    /// Newest first.
    pub tasks: Vec<Task>,
    /// Custom category names, in the order they were added.
    pub folders: Vec<String>,
    pub settings: Settings,
}

/// Loads state from a store and writes each slice back after it changes.
///
/// Once [`Persistence::begin_purge`] has run, every later write is dropped
/// for the lifetime of this value. There is no way to resume.
pub struct Persistence<S> {
    store: S,
    layout: KeyLayout,
    suppressed: bool,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Self::with_layout(store, KeyLayout::default())
    }

    pub fn with_layout(store: S, layout: KeyLayout) -> Self {
        Self {
            store,
            layout,
            suppressed: false,
        }
    }

    /// Whether write-through has been switched off by a purge.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Load every slot. Missing keys fall back through the legacy namespaces
    /// and then to defaults. A value that fails to parse is an error rather
    /// than a silent default, so the next write can't clobber it.
    pub async fn load(&self) -> Result<Snapshot, Error> {
        let notes = self.read_json(Slot::Notes).await?.unwrap_or_default();
        let tasks = self.read_json(Slot::Tasks).await?.unwrap_or_default();
        let folders = self.read_json(Slot::Folders).await?.unwrap_or_default();

        let view = self
            .read(Slot::View)
            .await?
            .map(|(_, v)| ViewMode::from_stored(&v))
            .unwrap_or_default();
        let hide_locked = self
            .read(Slot::HideLocked)
            .await?
            .map(|(_, v)| v == "true")
            .unwrap_or(false);
        let passcode = match self.read(Slot::Pin).await? {
            Some((_, v)) if v.is_empty() => None,
            Some((key, v)) => Some(Passcode::parse(&v).map_err(|e| Error::Corrupt {
                key,
                reason: e.to_string(),
            })?),
            None => None,
        };

        Ok(Snapshot {
            notes,
            tasks,
            folders,
            settings: Settings {
                view,
                hide_locked,
                passcode,
            },
        })
    }

    pub async fn save_notes(&self, notes: &[Note]) -> Result<(), Error> {
        self.write_json(Slot::Notes, notes).await
    }

    pub async fn save_tasks(&self, tasks: &[Task]) -> Result<(), Error> {
        self.write_json(Slot::Tasks, tasks).await
    }

    pub async fn save_folders(&self, folders: &[String]) -> Result<(), Error> {
        self.write_json(Slot::Folders, folders).await
    }

    pub async fn save_view(&self, view: ViewMode) -> Result<(), Error> {
        self.write(Slot::View, view.as_str()).await
    }

    pub async fn save_hide_locked(&self, hide_locked: bool) -> Result<(), Error> {
        self.write(Slot::HideLocked, if hide_locked { "true" } else { "false" })
            .await
    }

    /// A set passcode is written verbatim; a cleared one removes the key.
    pub async fn save_passcode(&self, passcode: Option<&Passcode>) -> Result<(), Error> {
        match passcode {
            Some(code) => self.write(Slot::Pin, code.as_str()).await,
            None => {
                if self.suppressed {
                    return Ok(());
                }
                let key = self.layout.key(Slot::Pin);
                debug!(%key, "removing");
                self.store.remove(&key).await?;
                Ok(())
            }
        }
    }

    /// Switch off write-through, then wipe the whole store.
    ///
    /// The flag goes up before the clear so nothing written during the
    /// teardown that follows can land after it.
    pub async fn begin_purge(&mut self) -> Result<(), Error> {
        self.suppressed = true;
        info!(namespace = self.layout.namespace(), "purging store");
        self.store.clear().await
    }

    /// First hit along the fallback chain, with the key it came from.
    async fn read(&self, slot: Slot) -> Result<Option<(String, String)>, Error> {
        for (i, key) in self.layout.read_order(slot).into_iter().enumerate() {
            if let Some(value) = self.store.get(&key).await? {
                if i > 0 {
                    warn!(%key, "loaded value from legacy namespace");
                }
                return Ok(Some((key, value)));
            }
        }
        Ok(None)
    }

    async fn read_json<T: DeserializeOwned>(&self, slot: Slot) -> Result<Option<T>, Error> {
        match self.read(slot).await? {
            Some((key, raw)) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| Error::Corrupt {
                    key,
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn write(&self, slot: Slot, value: &str) -> Result<(), Error> {
        if self.suppressed {
            debug!(slot = slot.suffix(), "write suppressed after purge");
            return Ok(());
        }
        let key = self.layout.key(slot);
        debug!(%key, bytes = value.len(), "writing");
        self.store.set(&key, value).await
    }

    async fn write_json<T: Serialize + ?Sized>(&self, slot: Slot, value: &T) -> Result<(), Error> {
        let raw = serde_json::to_string(value)
            .map_err(|e| Error::Internal(format!("failed to serialize {}: {}", slot.suffix(), e)))?;
        self.write(slot, &raw).await
    }
}

/// Wipe a store without loading it first, e.g. when its contents are corrupt.
pub async fn purge_store<S: KeyValueStore>(store: S) -> Result<(), Error> {
    Persistence::new(store).begin_purge().await
}
