//! Pure projections over repository snapshots.
//!
//! Filtering never mutates its input and never reaches the remote store; the
//! same snapshot and filter always give the same result, in snapshot order.

use crate::models::{Note, PasswordEntry, Priority};

/// Priority selector of the notes list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PriorityFilter {
    #[default]
    All,
    Only(Priority),
}

impl PriorityFilter {
    /// Parse a form value; `"all"` and anything unrecognised select every priority.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Self::Only(Priority::High),
            "medium" => Self::Only(Priority::Medium),
            "low" => Self::Only(Priority::Low),
            _ => Self::All,
        }
    }

    fn accepts(&self, priority: Priority) -> bool {
        match self {
            Self::All => true,
            Self::Only(p) => *p == priority,
        }
    }
}

/// Search term plus priority selector for notes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub search: String,
    pub priority: PriorityFilter,
}

impl NoteFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: term.into(),
            ..Self::default()
        }
    }

    pub fn priority(priority: Priority) -> Self {
        Self {
            priority: PriorityFilter::Only(priority),
            ..Self::default()
        }
    }

    pub fn apply(&self, notes: &[Note]) -> Vec<Note> {
        let needle = self.search.trim().to_lowercase();
        notes
            .iter()
            .filter(|n| self.priority.accepts(n.priority))
            .filter(|n| needle.is_empty() || n.matches_lowercase(&needle))
            .cloned()
            .collect()
    }
}

/// Search term for credentials, matched against site, username and category.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PasswordFilter {
    pub search: String,
}

impl PasswordFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: term.into(),
        }
    }

    pub fn apply(&self, entries: &[PasswordEntry]) -> Vec<PasswordEntry> {
        let needle = self.search.trim().to_lowercase();
        entries
            .iter()
            .filter(|e| needle.is_empty() || e.matches_lowercase(&needle))
            .cloned()
            .collect()
    }
}
