//! # Dashboard — aggregate stats and recent notes
//!
//! [`Dashboard`] answers from the current snapshots of the notes and passwords
//! repositories. Nothing is cached here: every [`Dashboard::summary`] call
//! recomputes from the two snapshots, so the numbers cannot drift from the
//! collections they describe.
//!
//! [`Dashboard::refresh`] re-fetches both repositories concurrently. If either
//! fetch fails the error is returned (it is retryable) and the previous
//! snapshots keep serving `summary`.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::error::StoreError;
use crate::models::Note;
use crate::notes::NotesRepository;
use crate::passwords::PasswordsRepository;
use crate::repository::sort_newest_first;
use crate::table::TableStore;

/// Number of recent notes shown when no configuration says otherwise.
pub const DEFAULT_RECENT_NOTES: usize = 3;

/// Counts derived from the snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub total_notes: usize,
    pub completed_notes: usize,
    pub pending_notes: usize,
    pub saved_passwords: usize,
}

impl AggregateStats {
    pub fn compute(notes: &[Note], saved_passwords: usize) -> Self {
        let total_notes = notes.len();
        let completed_notes = notes.iter().filter(|n| n.completed).count();
        Self {
            total_notes,
            completed_notes,
            pending_notes: total_notes - completed_notes,
            saved_passwords,
        }
    }

    /// Share of completed notes in `[0, 1]`; 0 when there are no notes.
    pub fn completion_rate(&self) -> f64 {
        if self.total_notes == 0 {
            return 0.0;
        }
        self.completed_notes as f64 / self.total_notes as f64
    }
}

/// Stats plus the most recently created notes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub stats: AggregateStats,
    pub recent_notes: Vec<Note>,
}

/// The `limit` most recently created notes, newest first.
pub fn recent_notes(notes: &[Note], limit: usize) -> Vec<Note> {
    let mut sorted = notes.to_vec();
    sort_newest_first(&mut sorted);
    sorted.truncate(limit);
    sorted
}

pub struct Dashboard<S: TableStore> {
    notes: Arc<NotesRepository<S>>,
    passwords: Arc<PasswordsRepository<S>>,
    recent_limit: usize,
}

impl<S: TableStore> Dashboard<S> {
    pub fn new(
        notes: Arc<NotesRepository<S>>,
        passwords: Arc<PasswordsRepository<S>>,
        recent_limit: usize,
    ) -> Self {
        Self {
            notes,
            passwords,
            recent_limit,
        }
    }

    pub fn summary(&self) -> DashboardSummary {
        let saved_passwords = self.passwords.len();
        self.notes.read(|notes| DashboardSummary {
            stats: AggregateStats::compute(notes, saved_passwords),
            recent_notes: recent_notes(notes, self.recent_limit),
        })
    }

    /// Re-fetch both repositories and recompute.
    pub async fn refresh(&self) -> Result<DashboardSummary, StoreError> {
        let (notes, passwords) = tokio::join!(self.notes.list(), self.passwords.list());
        if let Err(e) = notes.and(passwords) {
            warn!(error = %e, "dashboard refresh failed, showing previous data");
            return Err(e);
        }
        Ok(self.summary())
    }
}
