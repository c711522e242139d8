//! Visible note and task lists for a category selection and search text.
//!
//! Everything here is a pure function of the current state; nothing is
//! cached between calls.

use crate::category::{find_custom, SystemCategory};
use crate::{Note, Task, UNCATEGORIZED};

/// How many open tasks the glance summary shows.
const GLANCE_TASKS: usize = 3;

/// Query parameters for listing notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteQuery {
    /// Category identifier (`all`, `locked`, a custom category id, ...).
    pub category: String,
    /// Case-insensitive substring matched against title and content.
    pub search: String,
}

impl Default for NoteQuery {
    fn default() -> Self {
        Self {
            category: SystemCategory::All.id().to_string(),
            search: String::new(),
        }
    }
}

impl NoteQuery {
    pub fn new(category: impl Into<String>, search: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            search: search.into(),
        }
    }
}

/// Notes visible under `query`, in collection order.
///
/// The trash is reachable regardless of lock or hidden settings. Outside the
/// trash, deleted notes never show. With the vault hidden, locked notes are
/// dropped from `all` and `uncategorized` but stay reachable through the
/// Locked category and their own custom category. An identifier that resolves
/// to nothing falls back to every live note matching the search.
pub fn filter_notes(
    notes: &[Note],
    folders: &[String],
    query: &NoteQuery,
    hide_locked: bool,
) -> Vec<Note> {
    let needle = query.search.to_lowercase();
    let system = SystemCategory::from_id(&query.category);

    if system == Some(SystemCategory::Deleted) {
        return notes
            .iter()
            .filter(|n| n.is_deleted && n.matches_search(&needle))
            .cloned()
            .collect();
    }

    let hides_locked_here = hide_locked
        && matches!(
            system,
            Some(SystemCategory::All) | Some(SystemCategory::Uncategorized)
        );
    let custom = match system {
        Some(_) => None,
        None => find_custom(folders, &query.category),
    };

    notes
        .iter()
        .filter(|n| n.is_live())
        .filter(|n| !(hides_locked_here && n.is_locked))
        .filter(|n| match system {
            Some(SystemCategory::All) => true,
            Some(SystemCategory::Locked) => n.is_locked,
            Some(SystemCategory::Uncategorized) => n.category == UNCATEGORIZED,
            Some(SystemCategory::Deleted) => false,
            None => custom.map_or(true, |name| n.category == name),
        })
        .filter(|n| n.matches_search(&needle))
        .cloned()
        .collect()
}

/// Tasks whose text contains `search`, case-insensitively. Tasks have no
/// category, so nothing else filters them.
pub fn filter_tasks(tasks: &[Task], search: &str) -> Vec<Task> {
    let needle = search.to_lowercase();
    tasks
        .iter()
        .filter(|t| t.matches_search(&needle))
        .cloned()
        .collect()
}

/// Filtered tasks split into open and completed, each in collection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskBoard {
    pub active: Vec<Task>,
    pub completed: Vec<Task>,
}

pub fn task_board(tasks: &[Task], search: &str) -> TaskBoard {
    let (completed, active): (Vec<Task>, Vec<Task>) = filter_tasks(tasks, search)
        .into_iter()
        .partition(|t| t.completed);
    TaskBoard { active, completed }
}

/// At-a-glance summary: the newest readable note and the next few open tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Glance {
    pub recent_note: Option<Note>,
    pub upcoming_tasks: Vec<Task>,
}

/// Notes are kept newest first, so the first live unlocked note is the most
/// recent one that is safe to show outside the vault.
pub fn glance(notes: &[Note], tasks: &[Task]) -> Glance {
    Glance {
        recent_note: notes
            .iter()
            .find(|n| n.is_live() && !n.is_locked)
            .cloned(),
        upcoming_tasks: tasks
            .iter()
            .filter(|t| !t.completed)
            .take(GLANCE_TASKS)
            .cloned()
            .collect(),
    }
}
