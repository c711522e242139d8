use crate::category::{category_id, list_categories, Category, SystemCategory};
use crate::filter::{self, Glance, NoteQuery, TaskBoard};
use crate::keys::KeyLayout;
use crate::note::{new_id, today};
use crate::state::{Persistence, Settings, Snapshot, ViewMode};
use crate::vault::{Access, Passcode, PendingAction, VaultController, Verification};
use crate::{
    BackupDocument, Error, KeyValueStore, Note, NoteDraft, Notice, SavedNote, Task, UNCATEGORIZED,
};
use tracing::{debug, info};

/// Explicit answer to a "are you sure?" step before a destructive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

/// Navigation replayed after a successful unlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resumed {
    /// The category is now active.
    Category(String),
    /// The note to open in the editor.
    Note(Note),
}

/// The main service that contains all business logic.
/// Generic over the store implementation.
///
/// Mutations build the changed slice aside, write it to the store, and only
/// adopt it in memory once the write succeeded. A failed write leaves the
/// in-memory state as it was.
pub struct JotterService<S: KeyValueStore> {
    persistence: Persistence<S>,
    state: Snapshot,
    vault: VaultController,
    active_category: String,
}

impl<S: KeyValueStore> JotterService<S> {
    /// Load state from `store` under the default key layout.
    pub async fn load(store: S) -> Result<Self, Error> {
        Self::load_with_layout(store, KeyLayout::default()).await
    }

    pub async fn load_with_layout(store: S, layout: KeyLayout) -> Result<Self, Error> {
        let persistence = Persistence::with_layout(store, layout);
        let state = persistence.load().await?;
        debug!(
            notes = state.notes.len(),
            tasks = state.tasks.len(),
            folders = state.folders.len(),
            "state loaded"
        );
        Ok(Self {
            persistence,
            state,
            vault: VaultController::new(),
            active_category: SystemCategory::All.id().to_string(),
        })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn view_mode(&self) -> ViewMode {
        self.state.settings.view
    }

    pub fn is_locked_hidden(&self) -> bool {
        self.state.settings.hide_locked
    }

    pub fn vault(&self) -> &VaultController {
        &self.vault
    }

    pub fn has_passcode(&self) -> bool {
        self.state.settings.passcode.is_some()
    }

    /// Identifier of the category currently being browsed.
    pub fn active_category(&self) -> &str {
        &self.active_category
    }

    /// Get a note by ID, without any vault check.
    pub fn note(&self, id: &str) -> Option<&Note> {
        self.state.notes.iter().find(|n| n.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.state.tasks.iter().find(|t| t.id == id)
    }

    /// Whether a purge has switched off persistence for this instance.
    pub fn is_purged(&self) -> bool {
        self.persistence.is_suppressed()
    }

    // ---- categories -------------------------------------------------------

    /// All browsable categories with live counts.
    pub fn list_categories(&self) -> Vec<Category> {
        list_categories(
            &self.state.notes,
            &self.state.folders,
            self.state.settings.hide_locked,
        )
    }

    /// Add a custom category.
    pub async fn add_category(&mut self, name: &str) -> Result<Category, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("category name cannot be empty".into()));
        }

        let id = category_id(name);
        let taken = SystemCategory::ORDER.iter().any(|c| c.id() == id)
            || self.state.folders.iter().any(|f| category_id(f) == id);
        if taken {
            return Err(Error::Validation(format!(
                "a category with id {:?} already exists",
                id
            )));
        }

        let mut folders = self.state.folders.clone();
        folders.push(name.to_string());
        self.commit_folders(folders).await?;
        info!(%id, "category added");

        let count = self
            .state
            .notes
            .iter()
            .filter(|n| n.is_live() && n.category == name)
            .count();
        Ok(Category {
            id,
            name: name.to_string(),
            count,
            is_system: false,
        })
    }

    /// Make a category active. The Locked category goes through the vault.
    ///
    /// Identifiers that don't resolve are accepted as-is; filtering treats
    /// them as "everything".
    pub fn select_category(&mut self, id: &str) -> Access<String> {
        if id == SystemCategory::Locked.id() {
            match self.gate(PendingAction::Category(id.to_string())) {
                Access::Granted(()) => {}
                Access::PasscodeRequired => return Access::PasscodeRequired,
                Access::NeedsUnlock => return Access::NeedsUnlock,
            }
        }
        self.active_category = id.to_string();
        Access::Granted(id.to_string())
    }

    // ---- notes ------------------------------------------------------------

    /// Open a note for reading or editing. Locked notes go through the vault;
    /// notes in the trash never do.
    pub fn open_note(&mut self, id: &str) -> Result<Access<Note>, Error> {
        let note = self
            .note(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))?;

        if note.is_locked && !note.is_deleted {
            match self.gate(PendingAction::Note(note.id.clone())) {
                Access::Granted(()) => {}
                Access::PasscodeRequired => return Ok(Access::PasscodeRequired),
                Access::NeedsUnlock => return Ok(Access::NeedsUnlock),
            }
        }
        Ok(Access::Granted(note))
    }

    /// Create a note (no id) or update one in place (with id).
    ///
    /// Requesting a lock without a configured passcode still saves, but
    /// unlocked and with [`Notice::LockRequiresPasscode`].
    pub async fn save_note(&mut self, draft: NoteDraft) -> Result<SavedNote, Error> {
        let mut notices = Vec::new();
        let mut lock = draft.is_locked;
        if lock == Some(true) && self.state.settings.passcode.is_none() {
            notices.push(Notice::LockRequiresPasscode);
            lock = Some(false);
        }

        let title = match draft.title {
            Some(title) => {
                let title = title.trim();
                if title.is_empty() {
                    return Err(Error::Validation("title cannot be empty".into()));
                }
                Some(title.to_string())
            }
            None => None,
        };
        let category = draft
            .category
            .map(|c| self.check_category(c))
            .transpose()?;

        let mut notes = self.state.notes.clone();
        let note = match draft.id {
            Some(id) => {
                let note = notes
                    .iter_mut()
                    .find(|n| n.id == id)
                    .ok_or_else(|| Error::NotFound(format!("note {}", id)))?;
                if note.is_deleted {
                    return Err(Error::Validation(
                        "note is in Recently Deleted; restore it to make changes".into(),
                    ));
                }

                if let Some(title) = title {
                    note.title = title;
                }
                if let Some(content) = draft.content {
                    note.content = content;
                }
                if let Some(category) = category {
                    note.category = category;
                }
                if let Some(lock) = lock {
                    note.is_locked = lock;
                }
                note.date = today();
                note.clone()
            }
            None => {
                let title =
                    title.ok_or_else(|| Error::Validation("title cannot be empty".into()))?;
                let note = Note {
                    id: new_id(),
                    title,
                    content: draft.content.unwrap_or_default(),
                    category: category.unwrap_or_else(|| UNCATEGORIZED.to_string()),
                    date: today(),
                    is_locked: lock.unwrap_or(false),
                    is_deleted: false,
                };
                notes.insert(0, note.clone());
                note
            }
        };

        self.commit_notes(notes).await?;
        debug!(id = %note.id, locked = note.is_locked, "note saved");
        Ok(SavedNote { note, notices })
    }

    /// Move a note to Recently Deleted.
    pub async fn soft_delete_note(&mut self, id: &str) -> Result<Note, Error> {
        self.set_deleted(id, true).await
    }

    /// Bring a note back from Recently Deleted.
    pub async fn restore_note(&mut self, id: &str) -> Result<Note, Error> {
        self.set_deleted(id, false).await
    }

    /// Remove a trashed note for good. Returns false if the confirmation was
    /// declined, in which case nothing changes.
    pub async fn permanently_delete_note(
        &mut self,
        id: &str,
        confirmation: Confirmation,
    ) -> Result<bool, Error> {
        let pos = self
            .state
            .notes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))?;
        if !self.state.notes[pos].is_deleted {
            return Err(Error::Validation(
                "only notes in Recently Deleted can be permanently deleted".into(),
            ));
        }
        if confirmation == Confirmation::Declined {
            return Ok(false);
        }

        let mut notes = self.state.notes.clone();
        notes.remove(pos);
        self.commit_notes(notes).await?;
        info!(%id, "note permanently deleted");
        Ok(true)
    }

    /// Visible notes for a category and search text.
    pub fn filter_notes(&self, category_id: &str, search: &str) -> Vec<Note> {
        filter::filter_notes(
            &self.state.notes,
            &self.state.folders,
            &NoteQuery::new(category_id, search),
            self.state.settings.hide_locked,
        )
    }

    /// Visible notes for the active category.
    pub fn visible_notes(&self, search: &str) -> Vec<Note> {
        self.filter_notes(&self.active_category, search)
    }

    // ---- tasks ------------------------------------------------------------

    pub async fn save_task(&mut self, text: &str, reminder: Option<&str>) -> Result<Task, Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("task text cannot be empty".into()));
        }
        let reminder = reminder
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from);

        let task = Task {
            id: new_id(),
            text: text.to_string(),
            completed: false,
            reminder,
        };
        let mut tasks = self.state.tasks.clone();
        tasks.insert(0, task.clone());
        self.commit_tasks(tasks).await?;
        debug!(id = %task.id, "task saved");
        Ok(task)
    }

    pub async fn toggle_task(&mut self, id: &str) -> Result<Task, Error> {
        let mut tasks = self.state.tasks.clone();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))?;
        task.completed = !task.completed;
        let task = task.clone();

        self.commit_tasks(tasks).await?;
        Ok(task)
    }

    /// Remove a task permanently, returning it.
    pub async fn delete_task(&mut self, id: &str) -> Result<Task, Error> {
        let pos = self
            .state
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))?;
        let mut tasks = self.state.tasks.clone();
        let task = tasks.remove(pos);
        self.commit_tasks(tasks).await?;
        Ok(task)
    }

    pub fn filter_tasks(&self, search: &str) -> Vec<Task> {
        filter::filter_tasks(&self.state.tasks, search)
    }

    pub fn task_board(&self, search: &str) -> TaskBoard {
        filter::task_board(&self.state.tasks, search)
    }

    pub fn glance(&self) -> Glance {
        filter::glance(&self.state.notes, &self.state.tasks)
    }

    // ---- vault ------------------------------------------------------------

    /// Submit a passcode to the verification prompt. On success the pending
    /// navigation, if any, is replayed and returned.
    pub fn verify_passcode(&mut self, input: &str) -> Verification<Resumed> {
        match self
            .vault
            .verify(input, self.state.settings.passcode.as_ref())
        {
            Verification::Unlocked(pending) => {
                Verification::Unlocked(pending.and_then(|p| self.resume(p)))
            }
            Verification::Rejected => Verification::Rejected,
        }
    }

    /// Open the prompt in set mode.
    pub fn begin_set_passcode(&mut self) {
        self.vault.begin_set();
    }

    /// Configure a new passcode. Accepted regardless of the current session
    /// state, and unlocks the session like a successful verification.
    pub async fn set_passcode(&mut self, input: &str) -> Result<Option<Resumed>, Error> {
        let code = Passcode::parse(input)?;
        self.persistence.save_passcode(Some(&code)).await?;
        self.state.settings.passcode = Some(code);
        info!("passcode configured");

        let pending = self.vault.accept_new_passcode();
        Ok(pending.and_then(|p| self.resume(p)))
    }

    /// Remove the passcode. Needs an unlocked session and no locked notes,
    /// since those would become unreachable.
    pub async fn clear_passcode(&mut self) -> Result<(), Error> {
        if self.state.settings.passcode.is_none() {
            return Ok(());
        }
        if !self.vault.is_unlocked() {
            return Err(Error::Validation(
                "unlock the vault before clearing the passcode".into(),
            ));
        }
        let locked = self.state.notes.iter().filter(|n| n.is_locked).count();
        if locked > 0 {
            return Err(Error::Validation(format!(
                "{} locked note(s) must be unlocked before clearing the passcode",
                locked
            )));
        }

        self.persistence.save_passcode(None).await?;
        self.state.settings.passcode = None;
        self.seal_inner();
        info!("passcode cleared");
        Ok(())
    }

    /// Dismiss the passcode prompt and forget the pending navigation.
    pub fn cancel_prompt(&mut self) {
        self.vault.cancel_prompt();
    }

    /// Lock the vault again. Only meaningful while a passcode is configured.
    pub fn seal_session(&mut self) -> Result<Notice, Error> {
        if self.state.settings.passcode.is_none() {
            return Err(Error::Validation("no passcode is configured".into()));
        }
        self.seal_inner();
        Ok(Notice::SessionSealed)
    }

    // ---- settings ---------------------------------------------------------

    pub async fn set_view_mode(&mut self, view: ViewMode) -> Result<(), Error> {
        self.persistence.save_view(view).await?;
        self.state.settings.view = view;
        Ok(())
    }

    pub async fn set_hide_locked(&mut self, hide_locked: bool) -> Result<(), Error> {
        self.persistence.save_hide_locked(hide_locked).await?;
        self.state.settings.hide_locked = hide_locked;
        Ok(())
    }

    // ---- whole-store operations -------------------------------------------

    pub fn export_backup(&self) -> BackupDocument {
        BackupDocument::from_snapshot(&self.state)
    }

    /// Erase the entire store. Persistence stays off for the rest of this
    /// instance's life; callers are expected to drop it and load afresh.
    pub async fn purge_all(&mut self, confirmation: Confirmation) -> Result<bool, Error> {
        if confirmation == Confirmation::Declined {
            return Ok(false);
        }
        self.persistence.begin_purge().await?;
        Ok(true)
    }

    // ---- helpers ----------------------------------------------------------

    fn gate(&mut self, target: PendingAction) -> Access<()> {
        self.vault
            .request(target, self.state.settings.passcode.as_ref())
    }

    fn resume(&mut self, pending: PendingAction) -> Option<Resumed> {
        match pending {
            PendingAction::Category(id) => {
                self.active_category = id.clone();
                Some(Resumed::Category(id))
            }
            PendingAction::Note(id) => self.note(&id).cloned().map(Resumed::Note),
        }
    }

    fn seal_inner(&mut self) {
        self.vault.seal();
        if self.active_category == SystemCategory::Locked.id() {
            self.active_category = SystemCategory::All.id().to_string();
        }
    }

    /// A note's category must be Uncategorized or an existing custom one.
    fn check_category(&self, name: String) -> Result<String, Error> {
        if name == UNCATEGORIZED || self.state.folders.iter().any(|f| *f == name) {
            Ok(name)
        } else {
            Err(Error::Validation(format!("unknown category: {}", name)))
        }
    }

    async fn set_deleted(&mut self, id: &str, deleted: bool) -> Result<Note, Error> {
        let mut notes = self.state.notes.clone();
        let note = notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))?;
        note.is_deleted = deleted;
        let note = note.clone();

        self.commit_notes(notes).await?;
        debug!(%id, deleted, "note trash state changed");
        Ok(note)
    }

    async fn commit_notes(&mut self, notes: Vec<Note>) -> Result<(), Error> {
        self.persistence.save_notes(&notes).await?;
        self.state.notes = notes;
        Ok(())
    }

    async fn commit_tasks(&mut self, tasks: Vec<Task>) -> Result<(), Error> {
        self.persistence.save_tasks(&tasks).await?;
        self.state.tasks = tasks;
        Ok(())
    }

    async fn commit_folders(&mut self, folders: Vec<String>) -> Result<(), Error> {
        self.persistence.save_folders(&folders).await?;
        self.state.folders = folders;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, VaultState};
    use std::rc::Rc;

    type Service = JotterService<Rc<MemoryStore>>;

    async fn setup() -> (Rc<MemoryStore>, Service) {
        let store = Rc::new(MemoryStore::new());
        let service = JotterService::load(Rc::clone(&store)).await.unwrap();
        (store, service)
    }

    fn draft(title: &str) -> NoteDraft {
        NoteDraft {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    fn count(service: &Service, id: &str) -> Option<usize> {
        service
            .list_categories()
            .into_iter()
            .find(|c| c.id == id)
            .map(|c| c.count)
    }

    #[tokio::test]
    async fn test_create_note_prepends_and_persists() {
        let (store, mut service) = setup().await;

        let first = service.save_note(draft("First")).await.unwrap().note;
        let second = service.save_note(draft("  Second  ")).await.unwrap().note;

        assert_eq!(second.title, "Second");
        assert_eq!(first.category, UNCATEGORIZED);
        assert!(!first.is_locked && !first.is_deleted);
        assert!(!first.date.is_empty());
        assert_ne!(first.id, second.id);

        let ids: Vec<&str> = service.snapshot().notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);

        let raw = store.get("zenith-notes").await.unwrap().unwrap();
        let persisted: Vec<Note> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, service.snapshot().notes);
    }

    #[tokio::test]
    async fn test_empty_title_is_refused_without_side_effects() {
        let (store, mut service) = setup().await;

        let err = service.save_note(draft("   ")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = service.save_note(NoteDraft::default()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert!(service.snapshot().notes.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_fields_in_place() {
        let (_store, mut service) = setup().await;
        service.add_category("Work").await.unwrap();
        let note = service.save_note(draft("Plan")).await.unwrap().note;

        let updated = service
            .save_note(NoteDraft {
                id: Some(note.id.clone()),
                content: Some("details".to_string()),
                category: Some("Work".to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
            .note;

        assert_eq!(updated.id, note.id);
        assert_eq!(updated.title, "Plan");
        assert_eq!(updated.content, "details");
        assert_eq!(updated.category, "Work");
        assert_eq!(service.snapshot().notes.len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_note_is_not_found() {
        let (_store, mut service) = setup().await;
        let err = service
            .save_note(NoteDraft {
                id: Some("missing".to_string()),
                title: Some("x".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_category_is_refused() {
        let (_store, mut service) = setup().await;
        let err = service
            .save_note(NoteDraft {
                title: Some("Plan".to_string()),
                category: Some("Nowhere".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(service.snapshot().notes.is_empty());
    }

    #[tokio::test]
    async fn test_locked_save_without_passcode_is_forced_unlocked() {
        let (_store, mut service) = setup().await;

        let saved = service
            .save_note(NoteDraft {
                title: Some("Secret".to_string()),
                is_locked: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(!saved.note.is_locked);
        assert_eq!(saved.notices, vec![Notice::LockRequiresPasscode]);
        assert_eq!(count(&service, "locked"), Some(0));
    }

    #[tokio::test]
    async fn test_soft_delete_round_trip() {
        let (_store, mut service) = setup().await;
        service.add_category("Work").await.unwrap();
        let original = service
            .save_note(NoteDraft {
                title: Some("Plan".to_string()),
                content: Some("body".to_string()),
                category: Some("Work".to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
            .note;

        let trashed = service.soft_delete_note(&original.id).await.unwrap();
        assert!(trashed.is_deleted);
        assert!(service.filter_notes("work", "").is_empty());
        assert_eq!(service.filter_notes("deleted", "").len(), 1);

        let restored = service.restore_note(&trashed.id).await.unwrap();
        assert_eq!(restored, original);
        assert_eq!(service.filter_notes("work", ""), vec![original.clone()]);
        assert_eq!(service.filter_notes("all", ""), vec![original]);
    }

    #[tokio::test]
    async fn test_trashed_note_is_read_only() {
        let (_store, mut service) = setup().await;
        let note = service.save_note(draft("Plan")).await.unwrap().note;
        service.soft_delete_note(&note.id).await.unwrap();

        let err = service
            .save_note(NoteDraft {
                id: Some(note.id.clone()),
                title: Some("Changed".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(service.note(&note.id).unwrap().title, "Plan");
    }

    #[tokio::test]
    async fn test_permanent_delete_requires_trash_and_confirmation() {
        let (store, mut service) = setup().await;
        let note = service.save_note(draft("Plan")).await.unwrap().note;

        let err = service
            .permanently_delete_note(&note.id, Confirmation::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        service.soft_delete_note(&note.id).await.unwrap();
        let before = store.get("zenith-notes").await.unwrap();
        assert!(!service
            .permanently_delete_note(&note.id, Confirmation::Declined)
            .await
            .unwrap());
        assert_eq!(store.get("zenith-notes").await.unwrap(), before);
        assert!(service.note(&note.id).is_some());

        assert!(service
            .permanently_delete_note(&note.id, Confirmation::Confirmed)
            .await
            .unwrap());
        assert!(service.note(&note.id).is_none());
        assert_eq!(count(&service, "deleted"), Some(0));
    }

    #[tokio::test]
    async fn test_category_counts_stay_consistent() {
        let (_store, mut service) = setup().await;
        service.set_passcode("1234").await.unwrap();
        service.add_category("Work").await.unwrap();
        service.add_category("Home").await.unwrap();

        let specs = [
            ("a", UNCATEGORIZED, false),
            ("b", "Work", true),
            ("c", "Work", false),
            ("d", "Home", true),
            ("e", UNCATEGORIZED, true),
        ];
        let mut ids = Vec::new();
        for (title, category, locked) in specs {
            let note = service
                .save_note(NoteDraft {
                    title: Some(title.to_string()),
                    category: Some(category.to_string()),
                    is_locked: Some(locked),
                    ..Default::default()
                })
                .await
                .unwrap()
                .note;
            ids.push(note.id);
        }
        service.soft_delete_note(&ids[1]).await.unwrap();

        let categories = service.list_categories();
        let all = count(&service, "all").unwrap();
        let partition: usize = categories
            .iter()
            .filter(|c| !c.is_system || c.id == "uncategorized")
            .map(|c| c.count)
            .sum();
        assert_eq!(all, 4);
        assert_eq!(partition, all);
        assert_eq!(count(&service, "locked"), Some(2));
        assert_eq!(count(&service, "deleted"), Some(1));
    }

    #[tokio::test]
    async fn test_search_matches_title_or_content() {
        let (_store, mut service) = setup().await;
        service.save_note(draft("zenith plan")).await.unwrap();
        service
            .save_note(NoteDraft {
                title: Some("Trip".to_string()),
                content: Some("visit the Zen garden".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        service.save_note(draft("Groceries")).await.unwrap();

        let titles: Vec<String> = service
            .filter_notes("all", "ZEN")
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["Trip", "zenith plan"]);
    }

    #[tokio::test]
    async fn test_hidden_vault_exclusion() {
        let (_store, mut service) = setup().await;
        service.set_passcode("1234").await.unwrap();
        let work = service.add_category("Work").await.unwrap();
        let note = service
            .save_note(NoteDraft {
                title: Some("Salary".to_string()),
                category: Some("Work".to_string()),
                is_locked: Some(true),
                ..Default::default()
            })
            .await
            .unwrap()
            .note;
        service.set_hide_locked(true).await.unwrap();

        assert!(service.filter_notes("all", "").is_empty());
        assert_eq!(service.filter_notes(&work.id, ""), vec![note.clone()]);
        assert_eq!(service.filter_notes("locked", ""), vec![note]);
        assert!(service.list_categories().iter().all(|c| c.id != "locked"));
    }

    #[tokio::test]
    async fn test_lifecycle_counts_scenario() {
        let (_store, mut service) = setup().await;
        service.set_passcode("1234").await.unwrap();

        let note = service.save_note(draft("Plan")).await.unwrap().note;
        assert_eq!(count(&service, "all"), Some(1));
        assert_eq!(count(&service, "uncategorized"), Some(1));

        service
            .save_note(NoteDraft {
                id: Some(note.id.clone()),
                is_locked: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(count(&service, "locked"), Some(1));
        assert_eq!(count(&service, "uncategorized"), Some(1));

        service.soft_delete_note(&note.id).await.unwrap();
        assert_eq!(count(&service, "all"), Some(0));
        assert_eq!(count(&service, "uncategorized"), Some(0));
        assert_eq!(count(&service, "locked"), Some(0));
        assert_eq!(count(&service, "deleted"), Some(1));

        service.restore_note(&note.id).await.unwrap();
        assert_eq!(count(&service, "all"), Some(1));
        assert_eq!(count(&service, "uncategorized"), Some(1));
        assert_eq!(count(&service, "locked"), Some(1));
        assert_eq!(count(&service, "deleted"), Some(0));
    }

    #[tokio::test]
    async fn test_vault_unlock_scenario() {
        let (store, mut service) = setup().await;

        assert_eq!(service.select_category("locked"), Access::PasscodeRequired);
        assert_eq!(service.vault().prompt(), None);
        assert_eq!(service.active_category(), "all");

        service.set_passcode("0000").await.unwrap();
        assert_eq!(store.get("zenith-pin").await.unwrap().as_deref(), Some("0000"));

        // Sessions start locked on every load
        let mut service = JotterService::load(Rc::clone(&store)).await.unwrap();
        assert_eq!(service.select_category("locked"), Access::NeedsUnlock);
        assert_eq!(
            service.vault().pending(),
            Some(&PendingAction::Category("locked".to_string()))
        );

        let verified = service.verify_passcode("0000");
        assert_eq!(
            verified,
            Verification::Unlocked(Some(Resumed::Category("locked".to_string())))
        );
        assert_eq!(service.active_category(), "locked");
        assert_eq!(service.vault().pending(), None);
    }

    #[tokio::test]
    async fn test_set_passcode_unlocks_session() {
        let (_store, mut service) = setup().await;
        service.begin_set_passcode();
        assert!(service.set_passcode("12").await.is_err());
        assert!(!service.has_passcode());

        service.set_passcode("4321").await.unwrap();
        assert_eq!(service.vault().state(), VaultState::Unlocked);
        assert_eq!(
            service.select_category("locked"),
            Access::Granted("locked".to_string())
        );
    }

    #[tokio::test]
    async fn test_wrong_passcode_is_retriable() {
        let (store, mut service) = setup().await;
        service.set_passcode("1234").await.unwrap();
        let mut service = JotterService::load(Rc::clone(&store)).await.unwrap();

        assert_eq!(service.select_category("locked"), Access::NeedsUnlock);
        assert_eq!(service.verify_passcode("0000"), Verification::Rejected);
        assert_eq!(service.verify_passcode("999"), Verification::Rejected);
        assert_eq!(service.active_category(), "all");
        assert!(service.vault().pending().is_some());

        assert!(service.verify_passcode("1234").is_unlocked());
        assert_eq!(service.active_category(), "locked");
    }

    #[tokio::test]
    async fn test_verify_twice_is_noop_success() {
        let (store, mut service) = setup().await;
        service.set_passcode("1234").await.unwrap();
        let mut service = JotterService::load(Rc::clone(&store)).await.unwrap();

        assert!(service.verify_passcode("1234").is_unlocked());
        assert_eq!(service.verify_passcode("1234"), Verification::Unlocked(None));
        assert_eq!(service.vault().prompt(), None);
    }

    #[tokio::test]
    async fn test_open_locked_note_resumes_after_unlock() {
        let (store, mut service) = setup().await;
        service.set_passcode("1234").await.unwrap();
        let note = service
            .save_note(NoteDraft {
                title: Some("Secret".to_string()),
                is_locked: Some(true),
                ..Default::default()
            })
            .await
            .unwrap()
            .note;
        let plain = service.save_note(draft("Plain")).await.unwrap().note;

        let mut service = JotterService::load(Rc::clone(&store)).await.unwrap();
        assert_eq!(
            service.open_note(&plain.id).unwrap(),
            Access::Granted(plain.clone())
        );
        assert_eq!(service.open_note(&note.id).unwrap(), Access::NeedsUnlock);
        assert_eq!(
            service.verify_passcode("1234"),
            Verification::Unlocked(Some(Resumed::Note(note.clone())))
        );
        assert_eq!(service.open_note(&note.id).unwrap(), Access::Granted(note));
        assert!(matches!(
            service.open_note("missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_trashed_locked_note_bypasses_vault() {
        let (store, mut service) = setup().await;
        service.set_passcode("1234").await.unwrap();
        let note = service
            .save_note(NoteDraft {
                title: Some("Secret".to_string()),
                is_locked: Some(true),
                ..Default::default()
            })
            .await
            .unwrap()
            .note;
        service.soft_delete_note(&note.id).await.unwrap();

        let mut service = JotterService::load(Rc::clone(&store)).await.unwrap();
        assert!(service.open_note(&note.id).unwrap().is_granted());
        assert_eq!(service.vault().state(), VaultState::Locked);
    }

    #[tokio::test]
    async fn test_cancel_prompt_drops_pending() {
        let (store, mut service) = setup().await;
        service.set_passcode("1234").await.unwrap();
        let mut service = JotterService::load(Rc::clone(&store)).await.unwrap();

        service.select_category("locked");
        service.cancel_prompt();
        assert_eq!(service.verify_passcode("1234"), Verification::Unlocked(None));
        assert_eq!(service.active_category(), "all");
    }

    #[tokio::test]
    async fn test_seal_session() {
        let (_store, mut service) = setup().await;
        assert!(matches!(service.seal_session(), Err(Error::Validation(_))));

        service.set_passcode("1234").await.unwrap();
        service.select_category("locked");
        assert_eq!(service.active_category(), "locked");

        assert_eq!(service.seal_session().unwrap(), Notice::SessionSealed);
        assert_eq!(service.vault().state(), VaultState::Locked);
        assert_eq!(service.active_category(), "all");
        assert_eq!(service.select_category("locked"), Access::NeedsUnlock);
    }

    #[tokio::test]
    async fn test_seal_keeps_other_active_category() {
        let (_store, mut service) = setup().await;
        service.set_passcode("1234").await.unwrap();
        service.add_category("Work").await.unwrap();
        service.select_category("work");
        service.seal_session().unwrap();
        assert_eq!(service.active_category(), "work");
    }

    #[tokio::test]
    async fn test_clear_passcode_rules() {
        let (store, mut service) = setup().await;
        service.set_passcode("1234").await.unwrap();
        let note = service
            .save_note(NoteDraft {
                title: Some("Secret".to_string()),
                is_locked: Some(true),
                ..Default::default()
            })
            .await
            .unwrap()
            .note;

        assert!(matches!(
            service.clear_passcode().await,
            Err(Error::Validation(_))
        ));

        service
            .save_note(NoteDraft {
                id: Some(note.id.clone()),
                is_locked: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        service.seal_session().unwrap();
        assert!(matches!(
            service.clear_passcode().await,
            Err(Error::Validation(_))
        ));

        service.verify_passcode("1234");
        service.clear_passcode().await.unwrap();
        assert!(!service.has_passcode());
        assert_eq!(store.get("zenith-pin").await.unwrap(), None);
        assert_eq!(service.vault().state(), VaultState::Locked);
    }

    #[tokio::test]
    async fn test_add_category_validation() {
        let (store, mut service) = setup().await;

        let work = service.add_category("  Side Projects ").await.unwrap();
        assert_eq!(work.id, "side-projects");
        assert_eq!(work.name, "Side Projects");
        assert!(!work.is_system);

        for name in ["", "   ", "side  projects", "ALL", "Uncategorized", "Deleted"] {
            let err = service.add_category(name).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{name:?} accepted");
        }

        assert_eq!(service.snapshot().folders, vec!["Side Projects"]);
        assert_eq!(
            store.get("zenith-folders").await.unwrap().as_deref(),
            Some(r#"["Side Projects"]"#)
        );
        let ids: Vec<String> = service.list_categories().into_iter().map(|c| c.id).collect();
        assert_eq!(
            ids,
            vec!["all", "uncategorized", "locked", "deleted", "side-projects"]
        );
    }

    #[tokio::test]
    async fn test_unknown_category_selection_is_permissive() {
        let (_store, mut service) = setup().await;
        service.save_note(draft("Plan")).await.unwrap();
        assert_eq!(
            service.select_category("ghost"),
            Access::Granted("ghost".to_string())
        );
        assert_eq!(service.visible_notes("").len(), 1);
    }

    #[tokio::test]
    async fn test_tasks_lifecycle() {
        let (store, mut service) = setup().await;

        assert!(matches!(
            service.save_task("  ", None).await,
            Err(Error::Validation(_))
        ));

        let call = service.save_task("Call mom", Some("  ")).await.unwrap();
        assert_eq!(call.reminder, None);
        let milk = service
            .save_task(" Buy milk ", Some(" tomorrow 9am "))
            .await
            .unwrap();
        assert_eq!(milk.text, "Buy milk");
        assert_eq!(milk.reminder.as_deref(), Some("tomorrow 9am"));
        assert!(!milk.completed);

        assert!(service.toggle_task(&call.id).await.unwrap().completed);
        let board = service.task_board("");
        assert_eq!(board.active, vec![milk.clone()]);
        assert_eq!(board.completed.len(), 1);
        assert!(!service.toggle_task(&call.id).await.unwrap().completed);

        assert_eq!(service.filter_tasks("MILK"), vec![milk.clone()]);

        service.delete_task(&milk.id).await.unwrap();
        assert!(service.task(&milk.id).is_none());
        assert!(matches!(
            service.delete_task(&milk.id).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.toggle_task("missing").await,
            Err(Error::NotFound(_))
        ));

        let raw = store.get("zenith-tasks").await.unwrap().unwrap();
        let persisted: Vec<Task> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].text, "Call mom");
    }

    #[tokio::test]
    async fn test_settings_survive_reload() {
        let (store, mut service) = setup().await;
        service.set_view_mode(ViewMode::Grid).await.unwrap();
        service.set_hide_locked(true).await.unwrap();

        let service = JotterService::load(Rc::clone(&store)).await.unwrap();
        assert_eq!(service.settings().view, ViewMode::Grid);
        assert!(service.settings().hide_locked);
        assert_eq!(service.vault().state(), VaultState::Locked);
    }

    #[tokio::test]
    async fn test_export_backup() {
        let (_store, mut service) = setup().await;
        service.add_category("Work").await.unwrap();
        service.save_note(draft("Plan")).await.unwrap();
        service.save_task("Call", None).await.unwrap();

        let backup = service.export_backup();
        assert_eq!(backup.notes.len(), 1);
        assert_eq!(backup.tasks.len(), 1);
        assert_eq!(backup.custom_folders, vec!["Work"]);
    }

    #[tokio::test]
    async fn test_purge_all() {
        let (store, mut service) = setup().await;
        service.save_note(draft("Plan")).await.unwrap();
        store.set("some-other-app", "data").await.unwrap();

        assert!(!service.purge_all(Confirmation::Declined).await.unwrap());
        assert!(!service.is_purged());
        assert_eq!(store.len(), 2);

        assert!(service.purge_all(Confirmation::Confirmed).await.unwrap());
        assert!(service.is_purged());
        assert!(store.is_empty());

        // Teardown writes must not resurrect anything
        service.save_note(draft("Late")).await.unwrap();
        service.save_task("Late", None).await.unwrap();
        service.set_view_mode(ViewMode::Grid).await.unwrap();
        assert!(store.is_empty());

        let reloaded = JotterService::load(Rc::clone(&store)).await.unwrap();
        assert_eq!(reloaded.snapshot(), &Snapshot::default());
    }

    #[tokio::test]
    async fn test_glance() {
        let (_store, mut service) = setup().await;
        service.set_passcode("1234").await.unwrap();
        let older = service.save_note(draft("Older")).await.unwrap().note;
        service
            .save_note(NoteDraft {
                title: Some("Newest but locked".to_string()),
                is_locked: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        service.save_task("one", None).await.unwrap();

        let summary = service.glance();
        assert_eq!(summary.recent_note, Some(older));
        assert_eq!(summary.upcoming_tasks.len(), 1);
    }

    /// Memory store whose writes can be switched off to simulate a full disk.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: std::cell::Cell<bool>,
    }

    impl FlakyStore {
        fn check(&self) -> Result<(), Error> {
            if self.fail_writes.get() {
                Err(Error::Storage("disk full".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait(?Send)]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, Error> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
            self.check()?;
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<bool, Error> {
            self.check()?;
            self.inner.remove(key).await
        }

        async fn clear(&self) -> Result<(), Error> {
            self.check()?;
            self.inner.clear().await
        }

        async fn keys(&self) -> Result<Vec<String>, Error> {
            self.inner.keys().await
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_untouched() {
        let store = Rc::new(FlakyStore::default());
        let mut service = JotterService::load(Rc::clone(&store)).await.unwrap();
        service.add_category("Work").await.unwrap();
        let note = service.save_note(draft("Plan")).await.unwrap().note;
        let task = service.save_task("Call", None).await.unwrap();
        service.set_passcode("1234").await.unwrap();
        service.soft_delete_note(&note.id).await.unwrap();
        let before = service.snapshot().clone();

        store.fail_writes.set(true);
        let results = [
            service.add_category("Home").await.err(),
            service.save_note(draft("Draft")).await.err(),
            service.restore_note(&note.id).await.err(),
            service
                .permanently_delete_note(&note.id, Confirmation::Confirmed)
                .await
                .err(),
            service.save_task("Shop", None).await.err(),
            service.toggle_task(&task.id).await.err(),
            service.delete_task(&task.id).await.err(),
            service.set_passcode("9999").await.err(),
            service.clear_passcode().await.err(),
            service.set_view_mode(ViewMode::Grid).await.err(),
            service.set_hide_locked(true).await.err(),
        ];
        for err in results {
            assert!(matches!(err, Some(Error::Storage(_))), "{:?}", err);
        }
        assert_eq!(service.snapshot(), &before);

        // The store agrees with memory once writes work again
        store.fail_writes.set(false);
        let reloaded = JotterService::load(Rc::clone(&store)).await.unwrap();
        assert_eq!(reloaded.snapshot(), &before);
    }
}
