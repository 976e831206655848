//! # Entity repository — snapshot plus owner-scoped remote operations
//!
//! [`EntityRepository`] is the machinery shared by the notes and passwords
//! repositories. It owns:
//!
//! - the [`Session`] whose owner scopes every call,
//! - a [`TableStore`] handle,
//! - the **snapshot**: the last known list of entities, newest first, plus the
//!   error of the last failed `list`,
//! - a per-id async lock so that mutations of the same row run one at a time.
//!
//! ## Reconciliation
//!
//! | Operation | Snapshot effect on success |
//! |-----------|----------------------------|
//! | `list` | replaced wholesale, sorted by `created_at` descending |
//! | `create` | new entity prepended (no re-sort) |
//! | `update` / `modify` | matching entry replaced in place |
//! | `delete` | matching entry removed |
//!
//! Failures leave the snapshot untouched. Results that arrive after the
//! session ended are returned but never applied.
//!
//! ## Ownership
//!
//! Rows whose owner differs from the session owner are dropped from `list`
//! results and turn single-row responses into [`StoreError::Unauthorized`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{Note, OwnerId, PasswordEntry};
use crate::session::Session;
use crate::table::{OwnerFilter, Row, Table, TableStore};

/// A typed row of one table.
pub trait Entity: Clone {
    const TABLE: Table;

    fn id(&self) -> &str;
    fn owner(&self) -> &OwnerId;
    fn created_at(&self) -> DateTime<Utc>;
    fn from_row(row: Row) -> Result<Self, StoreError>;
}

impl Entity for Note {
    const TABLE: Table = Table::Notes;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &OwnerId {
        &self.owner
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_row(row: Row) -> Result<Self, StoreError> {
        Note::from_row(row)
    }
}

impl Entity for PasswordEntry {
    const TABLE: Table = Table::Passwords;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &OwnerId {
        &self.owner
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_row(row: Row) -> Result<Self, StoreError> {
        PasswordEntry::from_row(row)
    }
}

/// Sort newest first. Stable, so equal timestamps keep their relative order.
pub(crate) fn sort_newest_first<E: Entity>(items: &mut [E]) {
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

struct Snapshot<E> {
    items: Vec<E>,
    last_error: Option<StoreError>,
}

impl<E> Default for Snapshot<E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            last_error: None,
        }
    }
}

/// Per-id async locks serialising mutations of the same row.
///
/// An entry lives only while some call holds or waits for it.
#[derive(Default)]
struct IdLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire(&self, id: &str) -> IdGuard<'_> {
        let lock = self.map().entry(id.to_string()).or_default().clone();
        IdGuard {
            locks: self,
            id: id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }
}

/// Held lock for one id. Dropping it removes the map entry once no other
/// call references it.
struct IdGuard<'a> {
    locks: &'a IdLocks,
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.map();
        if map.get(&self.id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(&self.id);
        }
    }
}

/// Owner-scoped repository over one table, with an in-memory snapshot.
pub struct EntityRepository<S: TableStore, E: Entity> {
    store: S,
    session: Session,
    snapshot: RwLock<Snapshot<E>>,
    locks: IdLocks,
}

impl<S: TableStore, E: Entity> EntityRepository<S, E> {
    pub fn new(store: S, session: Session) -> Self {
        Self {
            store,
            session,
            snapshot: RwLock::new(Snapshot::default()),
            locks: IdLocks::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Clone of the current snapshot.
    pub fn snapshot(&self) -> Vec<E> {
        self.read(|items| items.to_vec())
    }

    /// Run `f` over the current snapshot without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&[E]) -> R) -> R {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        f(&snapshot.items)
    }

    /// Error of the last failed `list`, cleared by the next successful one.
    pub fn last_error(&self) -> Option<StoreError> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_error
            .clone()
    }

    fn owner_filter(&self) -> Result<OwnerFilter, StoreError> {
        if !self.session.is_active() {
            return Err(StoreError::Unauthorized("session has ended".into()));
        }
        Ok(OwnerFilter::owned_by(self.session.owner()))
    }

    /// Apply `f` to the snapshot unless the session ended meanwhile.
    fn apply(&self, f: impl FnOnce(&mut Snapshot<E>)) {
        if !self.session.is_active() {
            debug!(table = %E::TABLE, "session ended, discarding result");
            return;
        }
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut snapshot);
    }

    fn decode_owned(&self, row: Row) -> Result<E, StoreError> {
        let entity = E::from_row(row)?;
        if entity.owner() != self.session.owner() {
            warn!(table = %E::TABLE, id = entity.id(), "row belongs to another owner");
            return Err(StoreError::Unauthorized(format!(
                "{} row {} belongs to another owner",
                E::TABLE,
                entity.id()
            )));
        }
        Ok(entity)
    }

    /// Fetch every row of the owner and replace the snapshot.
    pub async fn list(&self) -> Result<Vec<E>, StoreError> {
        let filter = self.owner_filter()?;
        debug!(table = %E::TABLE, owner = %filter.owner(), "listing rows");

        let rows = match self.store.select(E::TABLE, &filter).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(table = %E::TABLE, error = %e, "list failed, keeping previous snapshot");
                self.apply(|snapshot| snapshot.last_error = Some(e.clone()));
                return Err(e);
            }
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match self.decode_owned(row) {
                Ok(entity) => items.push(entity),
                Err(e) => warn!(table = %E::TABLE, error = %e, "skipping row"),
            }
        }
        sort_newest_first(&mut items);

        self.apply(|snapshot| {
            snapshot.items = items.clone();
            snapshot.last_error = None;
        });
        Ok(items)
    }

    /// Insert `row` and prepend the stored entity to the snapshot.
    pub(crate) async fn create(&self, row: Row) -> Result<E, StoreError> {
        let filter = self.owner_filter()?;
        let stored = self.store.insert(E::TABLE, &filter, row).await?;
        let entity = self.decode_owned(stored)?;

        info!(table = %E::TABLE, id = entity.id(), "created");
        self.apply(|snapshot| {
            // a list that overlapped the insert may already carry the row
            match snapshot.items.iter_mut().find(|e| e.id() == entity.id()) {
                Some(slot) => *slot = entity.clone(),
                None => snapshot.items.insert(0, entity.clone()),
            }
        });
        Ok(entity)
    }

    /// Apply `patch` to row `id`.
    pub(crate) async fn update(&self, id: &str, patch: Row) -> Result<E, StoreError> {
        let filter = self.owner_filter()?.with_id(id);
        let _guard = self.locks.acquire(id).await;
        self.write_locked(&filter, patch).await
    }

    /// Read the current remote row `id`, derive a patch from it, and write it,
    /// all while holding the lock for `id`.
    pub(crate) async fn modify(
        &self,
        id: &str,
        patch_from: impl FnOnce(&E) -> Row,
    ) -> Result<E, StoreError> {
        let filter = self.owner_filter()?.with_id(id);
        let _guard = self.locks.acquire(id).await;

        let current = self
            .store
            .select(E::TABLE, &filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found::<E>(id))?;
        let current = self.decode_owned(current)?;

        self.write_locked(&filter, patch_from(&current)).await
    }

    async fn write_locked(&self, filter: &OwnerFilter, patch: Row) -> Result<E, StoreError> {
        let id = filter.id().unwrap_or_default();
        let stored = self
            .store
            .update(E::TABLE, filter, patch)
            .await?
            .ok_or_else(|| not_found::<E>(id))?;
        let entity = self.decode_owned(stored)?;

        info!(table = %E::TABLE, id = entity.id(), "updated");
        self.apply(|snapshot| {
            match snapshot.items.iter_mut().find(|e| e.id() == entity.id()) {
                Some(slot) => *slot = entity.clone(),
                None => debug!(table = %E::TABLE, id = entity.id(), "updated row not in snapshot"),
            }
        });
        Ok(entity)
    }

    /// Delete row `id`. A missing row is [`StoreError::NotFound`].
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let filter = self.owner_filter()?.with_id(id);
        let _guard = self.locks.acquire(id).await;

        let removed = self.store.delete(E::TABLE, &filter).await?;
        if removed == 0 {
            return Err(not_found::<E>(id));
        }

        info!(table = %E::TABLE, id, "deleted");
        self.apply(|snapshot| snapshot.items.retain(|e| e.id() != id));
        Ok(())
    }
}

fn not_found<E: Entity>(id: &str) -> StoreError {
    StoreError::NotFound {
        table: E::TABLE.name(),
        id: id.to_string(),
    }
}
