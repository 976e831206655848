pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod models;
pub mod notes;
pub mod passwords;
pub mod repository;
pub mod session;
pub mod table;
pub mod workspace;

mod memory;
pub use memory::MemoryStore;

pub use config::VaultConfig;
pub use dashboard::{AggregateStats, Dashboard, DashboardSummary};
pub use error::{AuthError, StoreError};
pub use filter::{NoteFilter, PasswordFilter, PriorityFilter};
pub use models::{
    DueLabel, Note, NoteDraft, NotePatch, OwnerId, PasswordDraft, PasswordEntry, PasswordPatch,
    Priority, SUGGESTED_CATEGORIES,
};
pub use notes::NotesRepository;
pub use passwords::PasswordsRepository;
pub use session::{IdentityProvider, Session, UserInfo};
pub use table::{OwnerFilter, Row, Table, TableStore};
pub use workspace::Workspace;
