//! # Notes repository
//!
//! [`NotesRepository`] wraps the `notes` table for one session owner. Drafts are
//! validated before anything is sent to the store, so an empty title never
//! costs a round trip.
//!
//! `toggle_complete` is a read-then-write on the remote row performed under the
//! row's lock. Two toggles of the same note issued at once therefore run one
//! after the other and cancel out. Writers in other clients are not
//! coordinated with: the last write wins.

use tracing::debug;

use crate::error::StoreError;
use crate::filter::NoteFilter;
use crate::models::{Note, NoteDraft, NotePatch};
use crate::repository::EntityRepository;
use crate::session::Session;
use crate::table::TableStore;

pub struct NotesRepository<S: TableStore> {
    inner: EntityRepository<S, Note>,
}

impl<S: TableStore> NotesRepository<S> {
    pub fn new(store: S, session: Session) -> Self {
        Self {
            inner: EntityRepository::new(store, session),
        }
    }

    /// Fetch all notes of the owner, newest first, and refresh the snapshot.
    pub async fn list(&self) -> Result<Vec<Note>, StoreError> {
        self.inner.list().await
    }

    pub async fn create(&self, draft: NoteDraft) -> Result<Note, StoreError> {
        draft.validate()?;
        let row = draft.to_row(self.inner.session().owner());
        self.inner.create(row).await
    }

    pub async fn update(&self, id: &str, patch: NotePatch) -> Result<Note, StoreError> {
        patch.validate()?;
        self.inner.update(id, patch.to_row()).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    /// Flip `completed` based on the row's current remote value.
    pub async fn toggle_complete(&self, id: &str) -> Result<Note, StoreError> {
        self.inner
            .modify(id, |current| {
                debug!(id, completed = current.completed, "toggling note");
                NotePatch::completed(!current.completed).to_row()
            })
            .await
    }

    /// Notes of the snapshot passing `filter`. Never touches the store.
    pub fn filtered(&self, filter: &NoteFilter) -> Vec<Note> {
        self.inner.read(|notes| filter.apply(notes))
    }

    pub fn snapshot(&self) -> Vec<Note> {
        self.inner.snapshot()
    }

    pub fn last_error(&self) -> Option<StoreError> {
        self.inner.last_error()
    }

    /// Number of notes in the snapshot.
    pub fn len(&self) -> usize {
        self.inner.read(|notes| notes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&[Note]) -> R) -> R {
        self.inner.read(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    use crate::memory::MemoryStore;
    use crate::models::Priority;
    use crate::session::UserInfo;
    use crate::table::{OwnerFilter, Row, Table};

    /// Memory store that yields after every write and can end a session
    /// while the write is still in flight.
    #[derive(Clone)]
    struct Interleaved {
        inner: MemoryStore,
        end_on_write: Option<Session>,
    }

    impl Interleaved {
        async fn after_write(&self) {
            if let Some(session) = &self.end_on_write {
                session.end();
            }
            tokio::task::yield_now().await;
        }
    }

    impl TableStore for Interleaved {
        async fn select(&self, table: Table, filter: &OwnerFilter) -> Result<Vec<Row>, StoreError> {
            self.inner.select(table, filter).await
        }

        async fn insert(
            &self,
            table: Table,
            filter: &OwnerFilter,
            row: Row,
        ) -> Result<Row, StoreError> {
            let stored = self.inner.insert(table, filter, row).await?;
            self.after_write().await;
            Ok(stored)
        }

        async fn update(
            &self,
            table: Table,
            filter: &OwnerFilter,
            patch: Row,
        ) -> Result<Option<Row>, StoreError> {
            let stored = self.inner.update(table, filter, patch).await?;
            self.after_write().await;
            Ok(stored)
        }

        async fn delete(&self, table: Table, filter: &OwnerFilter) -> Result<usize, StoreError> {
            let removed = self.inner.delete(table, filter).await?;
            self.after_write().await;
            Ok(removed)
        }
    }

    fn session(id: &str) -> Session {
        Session::new(
            UserInfo {
                id: id.to_string(),
                email: format!("{id}@example.com"),
                name: None,
            },
            None,
        )
    }

    fn repo() -> (MemoryStore, NotesRepository<MemoryStore>) {
        let store = MemoryStore::new();
        let notes = NotesRepository::new(store.clone(), session("alice"));
        (store, notes)
    }

    #[tokio::test]
    async fn test_create_then_list_contains_one_matching_note() {
        let (_store, notes) = repo();
        let due = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let draft = NoteDraft::new("Write report")
            .with_description("quarterly numbers")
            .with_priority(Priority::High)
            .with_due_date(due);

        let created = notes.create(draft.clone()).await.unwrap();
        let listed = notes.list().await.unwrap();

        let matching: Vec<_> = listed.iter().filter(|n| n.id == created.id).collect();
        assert_eq!(matching.len(), 1);
        let note = matching[0];
        assert_eq!(note.title, draft.title);
        assert_eq!(note.description, draft.description);
        assert_eq!(note.priority, Priority::High);
        assert_eq!(note.due_date, Some(due));
        assert!(!note.completed);
        assert_eq!(note.owner.as_str(), "alice");
        assert!(!note.id.is_empty());
    }

    #[tokio::test]
    async fn test_create_defaults_priority_and_prepends() {
        let (_store, notes) = repo();
        notes.create(NoteDraft::new("first")).await.unwrap();
        let second = notes.create(NoteDraft::new("second")).await.unwrap();

        assert_eq!(second.priority, Priority::Medium);
        let snapshot = notes.snapshot();
        assert_eq!(snapshot[0].title, "second");
        assert_eq!(snapshot[1].title, "first");
    }

    #[tokio::test]
    async fn test_empty_title_is_rejected_before_remote_call() {
        let (store, notes) = repo();
        store.set_offline(true);

        let err = notes.create(NoteDraft::new("   ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "title", .. }));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found_and_snapshot_unchanged() {
        let (_store, notes) = repo();
        notes.create(NoteDraft::new("keep me")).await.unwrap();
        let before = notes.snapshot();

        let patch = NotePatch {
            title: Some("x".into()),
            ..NotePatch::default()
        };
        assert!(matches!(
            notes.update("missing", patch).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            notes.delete("missing").await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            notes.toggle_complete("missing").await,
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(notes.snapshot(), before);
    }

    #[tokio::test]
    async fn test_update_replaces_in_place() {
        let (_store, notes) = repo();
        let a = notes.create(NoteDraft::new("a")).await.unwrap();
        notes.create(NoteDraft::new("b")).await.unwrap();

        let patch = NotePatch {
            title: Some("a2".into()),
            due_date: Some(None),
            ..NotePatch::default()
        };
        let updated = notes.update(&a.id, patch).await.unwrap();

        assert_eq!(updated.title, "a2");
        assert!(updated.updated_at > a.updated_at);
        let snapshot = notes.snapshot();
        assert_eq!(snapshot[1].id, a.id);
        assert_eq!(snapshot[1].title, "a2");
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_value() {
        let (_store, notes) = repo();
        let note = notes.create(NoteDraft::new("toggle me")).await.unwrap();

        assert!(notes.toggle_complete(&note.id).await.unwrap().completed);
        assert!(!notes.toggle_complete(&note.id).await.unwrap().completed);
        assert!(!notes.snapshot()[0].completed);
    }

    #[tokio::test]
    async fn test_concurrent_toggles_do_not_lose_updates() {
        let (_store, notes) = repo();
        let note = notes.create(NoteDraft::new("race")).await.unwrap();

        let (a, b) = tokio::join!(
            notes.toggle_complete(&note.id),
            notes.toggle_complete(&note.id)
        );
        assert_ne!(a.unwrap().completed, b.unwrap().completed);

        let listed = notes.list().await.unwrap();
        assert!(!listed[0].completed);
    }

    #[tokio::test]
    async fn test_toggle_reads_remote_value_not_snapshot() {
        let (store, notes) = repo();
        let note = notes.create(NoteDraft::new("elsewhere")).await.unwrap();

        // another client completes the note behind our back
        let other = NotesRepository::new(store.clone(), notes.inner.session().clone());
        other.toggle_complete(&note.id).await.unwrap();
        assert!(!notes.snapshot()[0].completed);

        let toggled = notes.toggle_complete(&note.id).await.unwrap();
        assert!(!toggled.completed);
    }

    #[tokio::test]
    async fn test_double_delete_reports_not_found() {
        let (_store, notes) = repo();
        let note = notes.create(NoteDraft::new("gone")).await.unwrap();

        notes.delete(&note.id).await.unwrap();
        assert!(notes.is_empty());
        let err = notes.delete(&note.id).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::NotFound {
                table: "notes",
                id: note.id.clone()
            }
        );
    }

    #[tokio::test]
    async fn test_list_failure_keeps_snapshot_and_flags_error() {
        let (store, notes) = repo();
        notes.create(NoteDraft::new("cached")).await.unwrap();

        store.set_offline(true);
        let err = notes.list().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(notes.snapshot().len(), 1);
        assert_eq!(notes.last_error(), Some(err));

        store.set_offline(false);
        notes.list().await.unwrap();
        assert_eq!(notes.last_error(), None);
    }

    #[tokio::test]
    async fn test_other_owners_rows_are_invisible() {
        let (store, notes) = repo();
        let bob = NotesRepository::new(store.clone(), session("bob"));
        let bobs = bob.create(NoteDraft::new("bob's secret")).await.unwrap();

        assert!(notes.list().await.unwrap().is_empty());
        assert!(matches!(
            notes.delete(&bobs.id).await,
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(bob.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_rows_are_skipped_on_list() {
        let (store, notes) = repo();
        notes.create(NoteDraft::new("good")).await.unwrap();
        let bad = match json!({
            "id": "bad",
            "user_id": "alice",
            "created_at": "2024-01-01T00:00:00Z",
        }) {
            serde_json::Value::Object(row) => row,
            _ => unreachable!(),
        };
        store.insert_raw(Table::Notes, bad);

        let listed = notes.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "good");
    }

    #[tokio::test]
    async fn test_ended_session_rejects_new_calls() {
        let (_store, notes) = repo();
        notes.create(NoteDraft::new("before")).await.unwrap();

        notes.inner.session().end();
        let err = notes.create(NoteDraft::new("after")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(_)));
        assert!(matches!(notes.list().await, Err(StoreError::Unauthorized(_))));
        assert_eq!(notes.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_results_in_flight_at_sign_out_are_not_applied() {
        let memory = MemoryStore::new();
        let seeded = NotesRepository::new(memory.clone(), session("alice"))
            .create(NoteDraft::new("kept"))
            .await
            .unwrap();

        // create finishes remotely after the session ended
        let first = session("alice");
        let notes = NotesRepository::new(
            Interleaved {
                inner: memory.clone(),
                end_on_write: Some(first.clone()),
            },
            first.clone(),
        );
        notes.list().await.unwrap();
        let before = notes.snapshot();
        let late = notes.create(NoteDraft::new("late")).await.unwrap();
        assert_eq!(late.title, "late");
        assert!(!first.is_active());
        assert_eq!(notes.snapshot(), before);

        // same for an update
        let second = session("alice");
        let notes = NotesRepository::new(
            Interleaved {
                inner: memory.clone(),
                end_on_write: Some(second.clone()),
            },
            second.clone(),
        );
        notes.list().await.unwrap();
        let before = notes.snapshot();
        let patch = NotePatch {
            title: Some("renamed".into()),
            ..NotePatch::default()
        };
        let renamed = notes.update(&seeded.id, patch).await.unwrap();
        assert_eq!(renamed.title, "renamed");
        assert_eq!(notes.snapshot(), before);

        let stored = memory.raw_rows(Table::Notes);
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().any(|row| row["title"] == "renamed"));
    }

    #[tokio::test]
    async fn test_create_overlapping_list_appears_once() {
        let notes = NotesRepository::new(
            Interleaved {
                inner: MemoryStore::new(),
                end_on_write: None,
            },
            session("alice"),
        );

        let (created, listed) = tokio::join!(notes.create(NoteDraft::new("once")), notes.list());
        let created = created.unwrap();
        assert_eq!(listed.unwrap().len(), 1);

        let snapshot = notes.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, created.id);
    }

    #[tokio::test]
    async fn test_filter_scenario() {
        let (store, notes) = repo();
        notes
            .create(NoteDraft::new("Buy milk").with_priority(Priority::Low))
            .await
            .unwrap();
        notes
            .create(NoteDraft::new("Ship release").with_priority(Priority::High))
            .await
            .unwrap();

        store.set_offline(true);
        let by_search = notes.filtered(&NoteFilter::search("ship"));
        assert_eq!(by_search.len(), 1);
        assert_eq!(by_search[0].title, "Ship release");

        let by_priority = notes.filtered(&NoteFilter::priority(Priority::Low));
        assert_eq!(by_priority.len(), 1);
        assert_eq!(by_priority[0].title, "Buy milk");
        assert_eq!(notes.snapshot().len(), 2);
    }
}
