//! # Table store — the seam to the remote data service
//!
//! Every repository talks to persistence through the async [`TableStore`] trait,
//! so the same notes and passwords logic runs against the hosted REST service
//! (`api::RestStore`), the in-process [`crate::MemoryStore`], or any future
//! backend.
//!
//! ## Owner scoping
//!
//! All four operations take an [`OwnerFilter`]. It can only be built from an
//! [`OwnerId`], so a query without the owner equality filter cannot be
//! expressed. Implementations must apply it to every read and write.
//!
//! ## Rows
//!
//! Rows cross this boundary as JSON objects ([`Row`]). Typed decoding happens in
//! the repositories (see [`crate::models`]), because the remote is untyped.

use std::fmt;

use crate::error::StoreError;
use crate::models::OwnerId;

/// An untyped row as exchanged with the remote store.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Column holding the owner of a row.
pub const OWNER_COLUMN: &str = "user_id";

/// Tables known to the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Notes,
    Passwords,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Passwords => "passwords",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Equality filter on the owner column, optionally narrowed to one id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerFilter {
    owner: OwnerId,
    id: Option<String>,
}

impl OwnerFilter {
    pub fn owned_by(owner: &OwnerId) -> Self {
        Self {
            owner: owner.clone(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether `row` passes this filter.
    pub fn matches(&self, row: &Row) -> bool {
        let owner_ok = row
            .get(OWNER_COLUMN)
            .and_then(|v| v.as_str())
            .is_some_and(|owner| owner == self.owner.as_str());
        let id_ok = match &self.id {
            None => true,
            Some(id) => row.get("id").is_some_and(|v| match v {
                serde_json::Value::String(s) => s == id,
                other => other.to_string() == *id,
            }),
        };
        owner_ok && id_ok
    }
}

/// Async interface to a table-oriented remote store.
pub trait TableStore {
    /// Rows matching `filter`, newest `created_at` first.
    fn select(
        &self,
        table: Table,
        filter: &OwnerFilter,
    ) -> impl std::future::Future<Output = Result<Vec<Row>, StoreError>>;

    /// Insert `row` on behalf of the filter's owner and return the stored row,
    /// including server-assigned id and timestamps.
    fn insert(
        &self,
        table: Table,
        filter: &OwnerFilter,
        row: Row,
    ) -> impl std::future::Future<Output = Result<Row, StoreError>>;

    /// Apply `patch` to the row matching `filter`. `Ok(None)` when nothing matched.
    fn update(
        &self,
        table: Table,
        filter: &OwnerFilter,
        patch: Row,
    ) -> impl std::future::Future<Output = Result<Option<Row>, StoreError>>;

    /// Delete rows matching `filter` and return how many were removed.
    fn delete(
        &self,
        table: Table,
        filter: &OwnerFilter,
    ) -> impl std::future::Future<Output = Result<usize, StoreError>>;
}
