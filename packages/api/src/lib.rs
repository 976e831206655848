//! # API crate — hosted backends for the vault data layer
//!
//! The `store` crate defines repositories against two seams, [`store::TableStore`]
//! and [`store::IdentityProvider`]. This crate implements both against a hosted
//! Supabase project and wires them together from layered settings.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | GoTrue sign-in/sign-up/sign-out, an in-process provider for offline use, Argon2 password hashing |
//! | [`rest`] | PostgREST-backed [`store::TableStore`] with owner filtering on every request |
//! | [`settings`] | `config`-crate layering of defaults, `vault.toml` and `VAULT__*` variables |
//!
//! ## Typical flow
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use api::{open_workspace, GoTrueIdentity, Settings};
//! use store::IdentityProvider;
//!
//! let settings = Settings::new()?;
//! let identity = GoTrueIdentity::new(&settings)?;
//! let session = identity.authenticate("alice@example.com", "secret").await?;
//! let workspace = open_workspace(&settings, session)?;
//! let summary = workspace.load().await?;
//! println!("{} notes", summary.stats.total_notes);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod rest;
pub mod settings;

pub use auth::{hash_password, verify_password, GoTrueIdentity, LocalIdentity};
pub use rest::RestStore;
pub use settings::Settings;

use store::{Session, StoreError, Workspace};

/// Open a workspace for `session` backed by the hosted REST store.
pub fn open_workspace(
    settings: &Settings,
    session: Session,
) -> Result<Workspace<RestStore>, StoreError> {
    let store = RestStore::new(settings, &session)?;
    Ok(Workspace::open(session, store, &settings.vault))
}
