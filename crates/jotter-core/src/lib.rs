//! Jotter core library - shared types, state rules, and vault logic.
//!
//! This crate contains no I/O and can be compiled for any target. Durable
//! storage is plugged in through [`KeyValueStore`].

mod backup;
mod category;
mod error;
mod filter;
mod keys;
mod note;
mod service;
mod state;
mod store;
mod vault;

pub use backup::{BackupDocument, BACKUP_FILE_NAME};
pub use category::{category_id, find_custom, list_categories, Category, SystemCategory};
pub use error::Error;
pub use filter::{filter_notes, filter_tasks, glance, task_board, Glance, NoteQuery, TaskBoard};
pub use keys::{KeyLayout, Slot, CURRENT_NAMESPACE, LEGACY_NAMESPACES};
pub use note::{Note, NoteDraft, NoteSummary, Notice, SavedNote, Task, UNCATEGORIZED};
pub use service::{Confirmation, JotterService, Resumed};
pub use state::{purge_store, Persistence, Settings, Snapshot, ViewMode};
pub use store::{validate_key, KeyValueStore, MemoryStore};
pub use vault::{Access, Passcode, PendingAction, PromptMode, VaultController, VaultState, Verification};
