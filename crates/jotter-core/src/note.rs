use serde::{Deserialize, Serialize};
use std::fmt;

/// Category name carried by notes that belong to no custom category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// A full note with all fields, in its persisted shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_category")]
    pub category: String,
    /// Human-readable date of creation or last save.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

fn default_category() -> String {
    UNCATEGORIZED.to_string()
}

/// A task list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    /// Free text shown next to the task. Nothing is scheduled from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<String>,
}

/// A summary of a note for listing (truncated content).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSummary {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub category: String,
    pub date: String,
    pub is_locked: bool,
}

/// Parameters for saving a note.
///
/// With `id: None` a new note is created and `title` is required. With an
/// `id`, only the fields that are `Some` replace the stored values.
#[derive(Debug, Default, Clone)]
pub struct NoteDraft {
    pub id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub is_locked: Option<bool>,
}

/// Something the user should be told about a commit that still went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// A lock was requested without a configured passcode; the note was saved unlocked.
    LockRequiresPasscode,
    /// The vault session was sealed.
    SessionSealed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LockRequiresPasscode => write!(
                f,
                "locking requires a passcode; configure one first (the note was saved unlocked)"
            ),
            Notice::SessionSealed => write!(f, "vault session sealed"),
        }
    }
}

/// A committed note plus any notices raised while saving it.
#[derive(Debug, Clone)]
pub struct SavedNote {
    pub note: Note,
    pub notices: Vec<Notice>,
}

impl Note {
    /// Case-insensitive substring match on title or content. `needle` must
    /// already be lowercased; an empty needle matches everything.
    pub fn matches_search(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.title.to_lowercase().contains(needle)
            || self.content.to_lowercase().contains(needle)
    }

    /// Whether the note counts as live (not in the trash).
    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    /// Convert to summary with truncated content preview. Locked notes get
    /// an empty preview so listings never leak vault content.
    pub fn to_summary(&self, max_chars: usize) -> NoteSummary {
        let preview = if self.is_locked {
            String::new()
        } else {
            // Flatten newlines so the preview stays on one line
            let normalized: String = self
                .content
                .chars()
                .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
                .collect();
            let trimmed = normalized.trim();

            if trimmed.chars().count() > max_chars {
                let cut: String = trimmed.chars().take(max_chars).collect();
                format!("{}...", cut.trim_end())
            } else {
                trimmed.to_string()
            }
        };

        NoteSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            preview,
            category: self.category.clone(),
            date: self.date.clone(),
            is_locked: self.is_locked,
        }
    }
}

impl Task {
    pub fn matches_search(&self, needle: &str) -> bool {
        needle.is_empty() || self.text.to_lowercase().contains(needle)
    }
}

/// Today's date as shown on notes, e.g. `3/14/2026`.
pub(crate) fn today() -> String {
    chrono::Local::now().format("%-m/%-d/%Y").to_string()
}

/// A fresh opaque identifier for notes and tasks.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
