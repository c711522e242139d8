//! Persistence key layout.
//!
//! Every persisted value lives under `<namespace>-<suffix>`. Earlier releases
//! stored the same values under other namespaces; those are consulted on
//! load, newest first, and never written.

/// Namespace written by this release.
pub const CURRENT_NAMESPACE: &str = "zenith";

/// Previous namespaces, newest first.
pub const LEGACY_NAMESPACES: &[&str] = &["nexus", "amber", "lyrical"];

/// A logical persisted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Notes,
    Tasks,
    Folders,
    View,
    HideLocked,
    Pin,
}

impl Slot {
    pub fn suffix(self) -> &'static str {
        match self {
            Slot::Notes => "notes",
            Slot::Tasks => "tasks",
            Slot::Folders => "folders",
            Slot::View => "view",
            Slot::HideLocked => "hide-locked",
            Slot::Pin => "pin",
        }
    }
}

/// Maps slots to store keys for the current namespace and its predecessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    current: String,
    legacy: Vec<String>,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::new(CURRENT_NAMESPACE, LEGACY_NAMESPACES.iter().copied())
    }
}

impl KeyLayout {
    pub fn new<I, S>(current: &str, legacy: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            current: current.to_string(),
            legacy: legacy.into_iter().map(Into::into).collect(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.current
    }

    /// The only key a slot is ever written under.
    pub fn key(&self, slot: Slot) -> String {
        format!("{}-{}", self.current, slot.suffix())
    }

    /// Keys to try when loading a slot, current namespace first.
    pub fn read_order(&self, slot: Slot) -> Vec<String> {
        std::iter::once(self.current.as_str())
            .chain(self.legacy.iter().map(String::as_str))
            .map(|ns| format!("{}-{}", ns, slot.suffix()))
            .collect()
    }
}
