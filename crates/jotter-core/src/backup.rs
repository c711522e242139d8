use crate::{Error, Note, Snapshot, Task};
use serde::{Deserialize, Serialize};

/// Suggested file name for an exported backup.
pub const BACKUP_FILE_NAME: &str = "jotter-backup.json";

/// A one-way export of every note, task and custom category name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub notes: Vec<Note>,
    pub tasks: Vec<Task>,
    pub custom_folders: Vec<String>,
}

impl BackupDocument {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            notes: snapshot.notes.clone(),
            tasks: snapshot.tasks.clone(),
            custom_folders: snapshot.folders.clone(),
        }
    }

    /// Pretty-printed JSON, ready to be written to a file.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Internal(format!("failed to serialize backup: {}", e)))
    }
}
