//! The per-session bundle of repositories.
//!
//! A [`Workspace`] is opened from a [`Session`] and lives exactly as long as
//! it: [`Workspace::close`] ends the session, which stops every repository from
//! issuing calls or applying late results.

use std::sync::Arc;

use tracing::info;

use crate::config::VaultConfig;
use crate::dashboard::{Dashboard, DashboardSummary};
use crate::error::StoreError;
use crate::notes::NotesRepository;
use crate::passwords::PasswordsRepository;
use crate::session::Session;
use crate::table::TableStore;

pub struct Workspace<S: TableStore> {
    session: Session,
    notes: Arc<NotesRepository<S>>,
    passwords: Arc<PasswordsRepository<S>>,
    dashboard: Dashboard<S>,
    categories: Vec<String>,
}

impl<S: TableStore + Clone> Workspace<S> {
    pub fn open(session: Session, store: S, config: &VaultConfig) -> Self {
        info!(owner = %session.owner(), "opening workspace");
        let notes = Arc::new(NotesRepository::new(store.clone(), session.clone()));
        let passwords = Arc::new(PasswordsRepository::new(store, session.clone()));
        let dashboard = Dashboard::new(
            notes.clone(),
            passwords.clone(),
            config.dashboard.recent_notes,
        );
        Self {
            session,
            notes,
            passwords,
            dashboard,
            categories: config.passwords.suggested_categories.clone(),
        }
    }
}

impl<S: TableStore> Workspace<S> {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn notes(&self) -> &NotesRepository<S> {
        &self.notes
    }

    pub fn passwords(&self) -> &PasswordsRepository<S> {
        &self.passwords
    }

    pub fn dashboard(&self) -> &Dashboard<S> {
        &self.dashboard
    }

    /// Categories offered when saving a password. Entries may use others.
    pub fn suggested_categories(&self) -> &[String] {
        &self.categories
    }

    /// Initial fetch of both repositories.
    pub async fn load(&self) -> Result<DashboardSummary, StoreError> {
        self.dashboard.refresh().await
    }

    /// End the session and drop the repositories.
    pub fn close(self) {
        info!(owner = %self.session.owner(), "closing workspace");
        self.session.end();
    }
}
