//! # Passwords repository
//!
//! [`PasswordsRepository`] wraps the `passwords` table for one session owner.
//! Site name, username and secret are required; the category is free text and
//! [`crate::SUGGESTED_CATEGORIES`] is only a hint for forms.
//!
//! Secrets are stored exactly as entered. Nothing in this module logs them.

use crate::error::StoreError;
use crate::filter::PasswordFilter;
use crate::models::{PasswordDraft, PasswordEntry, PasswordPatch};
use crate::repository::EntityRepository;
use crate::session::Session;
use crate::table::TableStore;

pub struct PasswordsRepository<S: TableStore> {
    inner: EntityRepository<S, PasswordEntry>,
}

impl<S: TableStore> PasswordsRepository<S> {
    pub fn new(store: S, session: Session) -> Self {
        Self {
            inner: EntityRepository::new(store, session),
        }
    }

    pub async fn list(&self) -> Result<Vec<PasswordEntry>, StoreError> {
        self.inner.list().await
    }

    pub async fn create(&self, draft: PasswordDraft) -> Result<PasswordEntry, StoreError> {
        draft.validate()?;
        let row = draft.to_row(self.inner.session().owner());
        self.inner.create(row).await
    }

    pub async fn update(
        &self,
        id: &str,
        patch: PasswordPatch,
    ) -> Result<PasswordEntry, StoreError> {
        patch.validate()?;
        self.inner.update(id, patch.to_row()).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    pub fn filtered(&self, filter: &PasswordFilter) -> Vec<PasswordEntry> {
        self.inner.read(|entries| filter.apply(entries))
    }

    pub fn snapshot(&self) -> Vec<PasswordEntry> {
        self.inner.snapshot()
    }

    pub fn last_error(&self) -> Option<StoreError> {
        self.inner.last_error()
    }

    /// Number of entries in the snapshot.
    pub fn len(&self) -> usize {
        self.inner.read(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
