//! Browsable categories and their live counts.

use crate::{Note, UNCATEGORIZED};
use serde::{Deserialize, Serialize};

/// The four categories every workspace has. They can't be created, renamed
/// or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemCategory {
    All,
    Uncategorized,
    Locked,
    Deleted,
}

impl SystemCategory {
    /// Display order.
    pub const ORDER: [SystemCategory; 4] = [
        SystemCategory::All,
        SystemCategory::Uncategorized,
        SystemCategory::Locked,
        SystemCategory::Deleted,
    ];

    pub fn id(self) -> &'static str {
        match self {
            SystemCategory::All => "all",
            SystemCategory::Uncategorized => "uncategorized",
            SystemCategory::Locked => "locked",
            SystemCategory::Deleted => "deleted",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SystemCategory::All => "All",
            SystemCategory::Uncategorized => UNCATEGORIZED,
            SystemCategory::Locked => "Locked",
            SystemCategory::Deleted => "Recently Deleted",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|c| c.id() == id)
    }

    /// Membership rule used for counting.
    fn counts(self, note: &Note) -> bool {
        match self {
            SystemCategory::All => note.is_live(),
            SystemCategory::Uncategorized => note.is_live() && note.category == UNCATEGORIZED,
            SystemCategory::Locked => note.is_live() && note.is_locked,
            SystemCategory::Deleted => note.is_deleted,
        }
    }
}

/// A category with its note count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub count: usize,
    pub is_system: bool,
}

/// Derive a category identifier from its display name: lowercased, with
/// each run of whitespace replaced by a single hyphen.
pub fn category_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_space {
                id.push('-');
            }
            in_space = true;
        } else {
            id.extend(c.to_lowercase());
            in_space = false;
        }
    }
    id
}

/// Resolve an identifier to a custom category name. The first name whose
/// identifier matches wins.
pub fn find_custom<'a>(folders: &'a [String], id: &str) -> Option<&'a str> {
    folders
        .iter()
        .map(String::as_str)
        .find(|name| category_id(name) == id)
}

/// Build the ordered category list with fresh counts.
///
/// System categories come first in fixed order, then custom categories in
/// insertion order. When the vault is hidden the Locked entry is left out
/// entirely rather than shown empty.
pub fn list_categories(notes: &[Note], folders: &[String], hide_locked: bool) -> Vec<Category> {
    let system = SystemCategory::ORDER
        .into_iter()
        .filter(|c| !(hide_locked && *c == SystemCategory::Locked))
        .map(|c| Category {
            id: c.id().to_string(),
            name: c.name().to_string(),
            count: notes.iter().filter(|n| c.counts(n)).count(),
            is_system: true,
        });

    let custom = folders.iter().map(|name| Category {
        id: category_id(name),
        name: name.clone(),
        count: notes
            .iter()
            .filter(|n| n.is_live() && n.category == *name)
            .count(),
        is_system: false,
    });

    system.chain(custom).collect()
}
