use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;
use crate::table::{OwnerFilter, Row, Table, TableStore, OWNER_COLUMN};

/// In-memory TableStore for testing and offline use.
///
/// Assigns UUID ids and strictly increasing `created_at`/`updated_at`
/// timestamps the way the hosted service does.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
    offline: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<Table, Vec<Row>>,
    last_stamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// Current time, bumped so that no two stamps are equal.
    fn stamp(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(last) = self.last_stamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_stamp = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`StoreError::StoreUnavailable`] until reset.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Store `row` as-is, bypassing owner scoping. Simulates writes made by
    /// other clients directly against the service.
    pub fn insert_raw(&self, table: Table, row: Row) {
        if let Ok(mut tables) = self.inner.lock() {
            tables.rows.entry(table).or_default().push(row);
        }
    }

    /// Every stored row of `table`, regardless of owner.
    pub fn raw_rows(&self, table: Table) -> Vec<Row> {
        self.inner
            .lock()
            .map(|tables| tables.rows.get(&table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::StoreUnavailable("memory store offline".into()));
        }
        self.inner
            .lock()
            .map_err(|_| StoreError::StoreUnavailable("memory store poisoned".into()))
    }
}

fn created_at(row: &Row) -> Option<DateTime<Utc>> {
    row.get("created_at")?.as_str()?.parse().ok()
}

impl TableStore for MemoryStore {
    async fn select(&self, table: Table, filter: &OwnerFilter) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<Row> = tables
            .rows
            .get(&table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
        Ok(rows)
    }

    async fn insert(
        &self,
        table: Table,
        filter: &OwnerFilter,
        mut row: Row,
    ) -> Result<Row, StoreError> {
        let mut tables = self.tables()?;
        let stamp = tables.stamp();
        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        row.insert(OWNER_COLUMN.into(), Value::String(filter.owner().to_string()));
        row.insert("created_at".into(), Value::String(stamp.clone()));
        row.insert("updated_at".into(), Value::String(stamp));
        tables.rows.entry(table).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: Table,
        filter: &OwnerFilter,
        patch: Row,
    ) -> Result<Option<Row>, StoreError> {
        let mut tables = self.tables()?;
        let stamp = tables.stamp();
        let Some(row) = tables
            .rows
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|r| filter.matches(r)))
        else {
            return Ok(None);
        };

        for (key, value) in patch {
            // id, owner and creation time are immutable
            if matches!(key.as_str(), "id" | OWNER_COLUMN | "created_at") {
                continue;
            }
            row.insert(key, value);
        }
        row.insert("updated_at".into(), Value::String(stamp));
        Ok(Some(row.clone()))
    }

    async fn delete(&self, table: Table, filter: &OwnerFilter) -> Result<usize, StoreError> {
        let mut tables = self.tables()?;
        let Some(rows) = tables.rows.get_mut(&table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !filter.matches(r));
        Ok(before - rows.len())
    }
}
